//! Integration tests for the idvault-agent crate.
//!
//! End-to-end flows through a [`Session`]: key derivation, configuration
//! restore, typed store CRUD, credential filtering and concurrent imports.

use std::sync::Arc;

use async_trait::async_trait;
use idvault_agent::{
    AgentError, AgentOptions, CredentialFilter, CredentialQuery, CredentialStore,
    CredentialVerifier, DidFilter, DidStore, Identifier, KeyImport, KeyStore, KeyType, Session,
    VerifiableCredential, Verification, clear_storage, config_present,
};
use idvault_store::{DeriveKeyOpts, FileStorage, KeyLength, MemoryStorage, StorageMedium};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn password(pw: &str) -> DeriveKeyOpts {
    DeriveKeyOpts::new(pw, KeyLength::Aes256).with_iterations(2_000)
}

fn options() -> AgentOptions {
    AgentOptions::new()
        .with_project_id("0123456789abcdef")
        .with_network("goerli")
}

fn public_key(kid: &str) -> KeyImport {
    KeyImport {
        kid: Some(kid.to_string()),
        kms: Some("local".into()),
        key_type: Some(KeyType::Secp256k1),
        public_key_hex: Some("04a1b2c3".into()),
        private_key_hex: None,
        meta: Some(serde_json::json!({ "algorithms": ["ES256K"] })),
    }
}

struct AcceptAll;

#[async_trait]
impl CredentialVerifier for AcceptAll {
    async fn verify(&self, _credential: &VerifiableCredential) -> idvault_agent::Result<Verification> {
        Ok(Verification::ok())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Password-derived session lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn key_store_lifecycle_with_password() {
    init_tracing();
    let medium = Arc::new(MemoryStorage::new());
    let session = Session::open(password("pw1"), medium.clone(), options())
        .await
        .unwrap();

    let key = session.keys().import_key(public_key("k1")).await.unwrap();
    assert_eq!(session.keys().get_key("k1").await.unwrap(), key);

    let mut with_private = public_key("k2");
    with_private.private_key_hex = Some("deadbeef".into());
    let err = session.keys().import_key(with_private).await.unwrap_err();
    assert!(matches!(err, AgentError::Validation { .. }));
    assert_eq!(session.keys().list_keys().await.unwrap().len(), 1);

    assert!(session.keys().delete_key("k1").await.unwrap());
    assert!(!session.keys().delete_key("k1").await.unwrap());
}

#[tokio::test]
async fn reopen_with_same_and_different_password() {
    init_tracing();
    let medium = Arc::new(MemoryStorage::new());
    {
        let session = Session::open(password("pw1"), medium.clone(), options())
            .await
            .unwrap();
        session
            .dids()
            .import_did(Identifier::new("did:ethr:goerli:0x1", "did:ethr:goerli").with_alias("me"))
            .await
            .unwrap();
    }

    // Configuration comes from the store; no options needed.
    let reopened = Session::open(password("pw1"), medium.clone(), AgentOptions::new())
        .await
        .unwrap();
    assert_eq!(reopened.network(), "goerli");
    let dids = reopened
        .dids()
        .list_dids(DidFilter::new().with_alias("me"))
        .await
        .unwrap();
    assert_eq!(dids.len(), 1);

    let err = Session::open(password("pw2"), medium.clone(), options())
        .await
        .unwrap_err();
    assert!(err.is_bad_decrypt());
    assert!(config_present(&*medium).unwrap());

    let reset = Session::open(
        password("pw2"),
        medium.clone(),
        options().with_force_overwrite(true),
    )
    .await
    .unwrap();
    assert!(
        reset
            .dids()
            .list_dids(DidFilter::new())
            .await
            .unwrap()
            .is_empty()
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Credentials
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn credential_filters_across_issuers_and_subjects() {
    init_tracing();
    let session = Session::open(password("pw1"), Arc::new(MemoryStorage::new()), options())
        .await
        .unwrap();
    let manager = session.credential_manager(Arc::new(AcceptAll));

    for (issuer, subject) in [("did:A", "did:X"), ("did:B", "did:Y"), ("did:A", "did:X")] {
        manager
            .import_credential(VerifiableCredential::new(issuer, Some(subject)), None)
            .await
            .unwrap();
    }

    let count = |filter: CredentialFilter| {
        let manager = manager.clone();
        async move {
            manager
                .list_credentials(CredentialQuery::Filter(filter))
                .await
                .unwrap()
                .len()
        }
    };

    assert_eq!(count(CredentialFilter::new()).await, 3);
    assert_eq!(count(CredentialFilter::new().with_issuers(["did:A"])).await, 2);
    assert_eq!(count(CredentialFilter::new().with_subjects(["did:Y"])).await, 1);
    assert_eq!(
        count(
            CredentialFilter::new()
                .with_issuers(["did:A"])
                .with_subjects(["did:X"])
        )
        .await,
        2
    );
    assert_eq!(
        count(
            CredentialFilter::new()
                .with_issuers(["did:A"])
                .with_subjects(["did:Y"])
        )
        .await,
        0
    );

    let expected = CredentialFilter::new().with_issuers(["did:B"]);
    let err = manager
        .verify_credential(VerifiableCredential::new("did:A", Some("did:X")), Some(&expected))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::IssuerNotExpected { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_imports_are_not_lost() {
    init_tracing();
    let session = Session::open(password("pw1"), Arc::new(MemoryStorage::new()), options())
        .await
        .unwrap();

    let imports = (0..32).map(|i| {
        let store = session.credentials().clone();
        tokio::spawn(async move {
            let subject = format!("did:S{i}");
            store
                .import_vc(VerifiableCredential::new("did:A", Some(subject.as_str())))
                .await
        })
    });
    for handle in futures::future::join_all(imports).await {
        handle.unwrap().unwrap();
    }

    let all = session
        .credentials()
        .list_vcs(&CredentialFilter::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 32);
}

// ═══════════════════════════════════════════════════════════════════════
//  Clearing and file media
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn file_backed_session_survives_restart_and_clears() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    {
        let medium = Arc::new(FileStorage::open(dir.path()).unwrap());
        let session = Session::open(password("pw1"), medium, options())
            .await
            .unwrap();
        session.keys().import_key(public_key("k1")).await.unwrap();
    }

    let medium = Arc::new(FileStorage::open(dir.path()).unwrap());
    let session = Session::open(password("pw1"), medium.clone(), AgentOptions::new())
        .await
        .unwrap();
    assert_eq!(session.keys().list_keys().await.unwrap().len(), 1);

    session.clear().await.unwrap();
    assert!(!config_present(&*medium).unwrap());
    assert!(medium.get("key-store").unwrap().is_none());
}

#[test]
fn clear_storage_wipes_unreadable_stores() {
    let medium = MemoryStorage::new();
    for name in ["did-store", "key-store", "veramo-config-store"] {
        medium.set(name, "not an envelope").unwrap();
    }

    clear_storage(&medium).unwrap();
    assert!(medium.is_empty());
}
