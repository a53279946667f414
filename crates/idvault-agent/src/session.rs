//! Agent session: the five stores opened over one medium with one key.
//!
//! A [`Session`] is the explicit context an identity agent is built from.
//! Opening one resolves the key once, restores (or seeds) the agent
//! configuration, then opens the identifier, key, private key and credential
//! stores with the same key and overwrite policy.

use std::sync::Arc;

use idvault_store::{KeySource, StorageMedium, StoreResult};

use crate::config::AgentOptions;
use crate::credential_manager::{CredentialManager, CredentialVerifier};
use crate::error::{AgentError, Result};
use crate::stores::{
    ALL_STORES, AgentConfig, CONFIG_STORE, ConfigStore, EncryptedCredentialStore,
    EncryptedDidStore, EncryptedKeyStore, EncryptedPrivateKeyStore,
};

/// Handles to every store an agent uses, sharing one key and medium.
#[derive(Clone)]
pub struct Session {
    project_id: String,
    network: String,
    medium: Arc<dyn StorageMedium>,
    config: ConfigStore,
    dids: EncryptedDidStore,
    keys: EncryptedKeyStore,
    private_keys: EncryptedPrivateKeyStore,
    credentials: EncryptedCredentialStore,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("project_id", &self.project_id)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open every store on `medium`.
    ///
    /// The stored configuration wins over `options`; the option values are
    /// only used (and persisted) when no configuration could be read.
    ///
    /// # Errors
    ///
    /// - Key resolution failures.
    /// - [`AgentError::MissingConfiguration`] when neither the store nor
    ///   `options` provide a project id and network.
    /// - Bad-decrypt errors from any store when `force_overwrite` is off.
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: AgentOptions,
    ) -> Result<Self> {
        let key = key.into().resolve().await?;
        let store_options = options.store_options();

        let config = ConfigStore::open(key.clone(), medium.clone(), store_options.clone()).await?;
        let (project_id, network) = match config.get().await? {
            Some(AgentConfig {
                project_id: Some(project_id),
                network,
            }) => {
                tracing::debug!(%network, "restored agent configuration");
                (project_id, network)
            }
            _ => match (options.project_id, options.network) {
                (Some(project_id), Some(network)) => {
                    config
                        .set(&AgentConfig::new(project_id.clone(), network.clone()))
                        .await?;
                    (project_id, network)
                }
                _ => {
                    return Err(AgentError::MissingConfiguration {
                        reason: "missing infuraProjectId or Ethereum Network".into(),
                    });
                }
            },
        };

        let dids = EncryptedDidStore::open(key.clone(), medium.clone(), store_options.clone());
        let keys = EncryptedKeyStore::open(key.clone(), medium.clone(), store_options.clone());
        let private_keys =
            EncryptedPrivateKeyStore::open(key.clone(), medium.clone(), store_options.clone());
        let credentials = EncryptedCredentialStore::open(key, medium.clone(), store_options);
        let (dids, keys, private_keys, credentials) =
            tokio::try_join!(dids, keys, private_keys, credentials)?;

        tracing::info!(%network, "agent session ready");
        Ok(Self {
            project_id,
            network,
            medium,
            config,
            dids,
            keys,
            private_keys,
            credentials,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Provider used for identifiers created without an explicit one.
    pub fn default_provider(&self) -> String {
        format!("did:ethr:{}", self.network)
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn dids(&self) -> &EncryptedDidStore {
        &self.dids
    }

    pub fn keys(&self) -> &EncryptedKeyStore {
        &self.keys
    }

    pub fn private_keys(&self) -> &EncryptedPrivateKeyStore {
        &self.private_keys
    }

    pub fn credentials(&self) -> &EncryptedCredentialStore {
        &self.credentials
    }

    /// A credential manager over this session's credential store.
    pub fn credential_manager(&self, verifier: Arc<dyn CredentialVerifier>) -> CredentialManager {
        CredentialManager::new(Arc::new(self.credentials.clone()), verifier)
    }

    /// Delete every store this session owns.  The session's stores are
    /// unusable afterwards; open a new session to start over.
    pub async fn clear(&self) -> Result<()> {
        tokio::try_join!(
            self.dids.blob_store().delete(),
            self.keys.blob_store().delete(),
            self.private_keys.blob_store().delete(),
            self.credentials.blob_store().delete(),
            self.config.blob_store().delete(),
        )?;
        tracing::info!("agent storage cleared");
        Ok(())
    }

    pub fn medium(&self) -> &Arc<dyn StorageMedium> {
        &self.medium
    }
}

/// Whether `medium` holds an agent configuration, without decrypting it.
pub fn config_present(medium: &dyn StorageMedium) -> StoreResult<bool> {
    Ok(medium.get(CONFIG_STORE)?.is_some())
}

/// Remove every agent store from `medium`, readable or not.
pub fn clear_storage(medium: &dyn StorageMedium) -> StoreResult<()> {
    for name in ALL_STORES {
        medium.remove(name)?;
    }
    tracing::info!("agent storage removed from medium");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{DidStore, KeyStore};
    use crate::types::Identifier;
    use idvault_store::{KeyHandle, KeyLength, MemoryStorage};

    fn options() -> AgentOptions {
        AgentOptions::new()
            .with_project_id("project-1")
            .with_network("goerli")
    }

    #[tokio::test]
    async fn first_open_persists_options() {
        let medium = Arc::new(MemoryStorage::new());
        let key = KeyHandle::generate(KeyLength::Aes256).unwrap();

        assert!(!config_present(&*medium).unwrap());
        let session = Session::open(key.clone(), medium.clone(), options())
            .await
            .unwrap();
        assert!(config_present(&*medium).unwrap());
        assert_eq!(session.network(), "goerli");
        assert_eq!(session.default_provider(), "did:ethr:goerli");

        // Stored values win over new options.
        let reopened = Session::open(
            key,
            medium,
            AgentOptions::new()
                .with_project_id("other")
                .with_network("mainnet"),
        )
        .await
        .unwrap();
        assert_eq!(reopened.project_id(), "project-1");
        assert_eq!(reopened.network(), "goerli");
    }

    #[tokio::test]
    async fn missing_configuration_is_an_error() {
        let key = KeyHandle::generate(KeyLength::Aes256).unwrap();
        let err = Session::open(
            key,
            Arc::new(MemoryStorage::new()),
            AgentOptions::new().with_network("goerli"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::MissingConfiguration { .. }));
    }

    #[tokio::test]
    async fn wrong_key_needs_force_overwrite() {
        let medium = Arc::new(MemoryStorage::new());
        let session = Session::open(
            KeyHandle::generate(KeyLength::Aes256).unwrap(),
            medium.clone(),
            options(),
        )
        .await
        .unwrap();
        session
            .dids()
            .import_did(Identifier::new("did:ethr:goerli:0x1", session.default_provider()))
            .await
            .unwrap();

        let other_key = KeyHandle::generate(KeyLength::Aes256).unwrap();
        let err = Session::open(other_key.clone(), medium.clone(), options())
            .await
            .unwrap_err();
        assert!(err.is_bad_decrypt());

        let forced = Session::open(other_key, medium, options().with_force_overwrite(true))
            .await
            .unwrap();
        assert!(forced.keys().list_keys().await.unwrap().is_empty());
        assert!(
            forced
                .dids()
                .list_dids(Default::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn clear_removes_every_store() {
        let medium = Arc::new(MemoryStorage::new());
        let key = KeyHandle::generate(KeyLength::Aes256).unwrap();
        let session = Session::open(key, medium.clone(), options()).await.unwrap();
        session
            .dids()
            .import_did(Identifier::new("did:ethr:goerli:0x1", "did:ethr:goerli"))
            .await
            .unwrap();
        assert!(!medium.is_empty());

        session.clear().await.unwrap();
        assert!(medium.is_empty());
        assert!(session.dids().blob_store().is_deleted());
    }

    #[test]
    fn clear_storage_ignores_absent_entries() {
        let medium = MemoryStorage::new();
        medium.set(CONFIG_STORE, "opaque").unwrap();
        medium.set("unrelated", "kept").unwrap();

        clear_storage(&medium).unwrap();
        assert!(!config_present(&medium).unwrap());
        assert_eq!(medium.get("unrelated").unwrap().as_deref(), Some("kept"));
    }
}
