//! Integration tests for the idvault-store crate.
//!
//! These tests exercise the full store lifecycle (open, read, write,
//! atomic operations, force reset, delete) against both storage media.

use std::collections::BTreeMap;
use std::sync::Arc;

use idvault_store::{
    DeriveKeyOpts, EncryptedStore, FileStorage, KeyHandle, KeyLength, MemoryStorage,
    StorageMedium, StoreError, StoreOptions,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn medium() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

fn random_key() -> KeyHandle {
    KeyHandle::generate(KeyLength::Aes256).unwrap()
}

async fn increment(store: &EncryptedStore<u64>) -> Result<u64, StoreError> {
    store
        .atomic_operation(|tx| {
            Box::pin(async move {
                let next = tx.get()?.unwrap_or(0) + 1;
                tokio::task::yield_now().await;
                tx.set(&next)?;
                Ok::<_, StoreError>(next)
            })
        })
        .await
}

// ═══════════════════════════════════════════════════════════════════════
//  Round trip and key handling
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn json_values_roundtrip() {
    let store: EncryptedStore<serde_json::Value> =
        EncryptedStore::open("values", random_key(), medium(), StoreOptions::default())
            .await
            .unwrap();

    let samples = [
        serde_json::json!(null),
        serde_json::json!(42),
        serde_json::json!("unicode ✓ text"),
        serde_json::json!([1, "two", { "three": 3.5 }]),
        serde_json::json!({ "did:ethr:0xabc": { "keys": [], "services": [] } }),
    ];

    for value in samples {
        store.set(&value).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(value));
    }
}

#[tokio::test]
async fn password_derived_key_reopens_existing_data() {
    init_tracing();
    let medium = medium();
    let opts = || DeriveKeyOpts::new("pw1", KeyLength::Aes256).with_iterations(2_000);

    let first: EncryptedStore<Vec<String>> =
        EncryptedStore::open("pw-store", opts(), medium.clone(), StoreOptions::default())
            .await
            .unwrap();
    first.set(&vec!["kept".to_string()]).await.unwrap();

    let second: EncryptedStore<Vec<String>> =
        EncryptedStore::open("pw-store", opts(), medium.clone(), StoreOptions::default())
            .await
            .unwrap();
    assert_eq!(second.get().await.unwrap(), Some(vec!["kept".to_string()]));

    let wrong = EncryptedStore::<Vec<String>>::open(
        "pw-store",
        DeriveKeyOpts::new("pw2", KeyLength::Aes256).with_iterations(2_000),
        medium,
        StoreOptions::default(),
    )
    .await;
    assert!(matches!(wrong, Err(StoreError::BadDecrypt { .. })));
}

#[tokio::test]
async fn raw_key_bytes_and_jwk_open_the_same_store() {
    let medium = medium();
    let key = random_key();

    let by_handle: EncryptedStore<String> =
        EncryptedStore::open("shared", key.clone(), medium.clone(), StoreOptions::default())
            .await
            .unwrap();
    by_handle.set(&"hello".to_string()).await.unwrap();

    let by_jwk: EncryptedStore<String> =
        EncryptedStore::open("shared", key.to_jwk(), medium, StoreOptions::default())
            .await
            .unwrap();
    assert_eq!(by_jwk.get().await.unwrap().as_deref(), Some("hello"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Force reset
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn force_reset_semantics() {
    init_tracing();
    let medium = medium();
    let first: EncryptedStore<u64> =
        EncryptedStore::open("forced", random_key(), medium.clone(), StoreOptions::default())
            .await
            .unwrap();
    first.set(&5).await.unwrap();

    let refused =
        EncryptedStore::<u64>::open("forced", random_key(), medium.clone(), StoreOptions::default())
            .await;
    assert!(matches!(refused, Err(StoreError::BadDecrypt { .. })));
    assert!(medium.get("forced").unwrap().is_some());

    let forced = EncryptedStore::<u64>::open(
        "forced",
        random_key(),
        medium.clone(),
        StoreOptions::new().with_force(true),
    )
    .await
    .unwrap();
    assert_eq!(forced.get().await.unwrap(), None);

    forced.set(&1).await.unwrap();
    assert_eq!(forced.get().await.unwrap(), Some(1));
}

// ═══════════════════════════════════════════════════════════════════════
//  Mutual exclusion
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_atomic_increments_are_serialized() {
    init_tracing();
    const N: u64 = 64;

    let store: EncryptedStore<u64> =
        EncryptedStore::open("counter", random_key(), medium(), StoreOptions::default())
            .await
            .unwrap();

    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { increment(&store).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.get().await.unwrap(), Some(N));
}

#[tokio::test]
async fn different_store_names_do_not_interfere() {
    let medium = medium();
    let key = random_key();
    let a: EncryptedStore<u64> =
        EncryptedStore::open("counter-a", key.clone(), medium.clone(), StoreOptions::default())
            .await
            .unwrap();
    let b: EncryptedStore<u64> =
        EncryptedStore::open("counter-b", key, medium, StoreOptions::default())
            .await
            .unwrap();

    let runs = (0..20).map(|i| {
        let a = a.clone();
        let b = b.clone();
        async move {
            if i % 2 == 0 {
                increment(&a).await
            } else {
                increment(&b).await
            }
        }
    });
    for result in futures::future::join_all(runs).await {
        result.unwrap();
    }

    assert_eq!(a.get().await.unwrap(), Some(10));
    assert_eq!(b.get().await.unwrap(), Some(10));
}

#[tokio::test]
async fn failed_operation_leaves_no_partial_write() {
    let store: EncryptedStore<BTreeMap<String, u32>> =
        EncryptedStore::open("maps", random_key(), medium(), StoreOptions::default())
            .await
            .unwrap();
    store
        .set(&BTreeMap::from([("a".to_string(), 1)]))
        .await
        .unwrap();

    let result: Result<(), StoreError> = store
        .atomic_operation(|tx| {
            Box::pin(async move {
                let mut map = tx.get()?.unwrap_or_default();
                map.insert("b".to_string(), 2);
                // Fail before writing: nothing reaches the medium.
                Err(StoreError::Internal("validation failed".into()))
            })
        })
        .await;
    assert!(result.is_err());

    let map = store.get().await.unwrap().unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("a"), Some(&1));
}

// ═══════════════════════════════════════════════════════════════════════
//  File medium
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn file_medium_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = random_key();

    {
        let medium = Arc::new(FileStorage::open(dir.path()).unwrap());
        let store: EncryptedStore<Vec<u32>> =
            EncryptedStore::open("vc-store", key.clone(), medium, StoreOptions::default())
                .await
                .unwrap();
        store.set(&vec![1, 2, 3]).await.unwrap();
    }

    let medium = Arc::new(FileStorage::open(dir.path()).unwrap());
    let reopened: EncryptedStore<Vec<u32>> =
        EncryptedStore::open("vc-store", key, medium, StoreOptions::default())
            .await
            .unwrap();
    assert_eq!(reopened.get().await.unwrap(), Some(vec![1, 2, 3]));

    reopened.delete().await.unwrap();
    assert!(!dir.path().join("vc-store").exists());
}
