//! Public key store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use idvault_store::{EncryptedStore, KeySource, StorageMedium, StoreOptions};

use super::{KEY_ID_BYTES, KEY_STORE, KeyStore, random_id};
use crate::error::{AgentError, Result};
use crate::types::{Key, KeyImport};

/// Persisted shape: kid -> key.
pub type KeyMap = BTreeMap<String, Key>;

/// [`KeyStore`] backed by an encrypted blob store.
///
/// Rejects records that carry private key material; those belong in the
/// [`EncryptedPrivateKeyStore`](super::EncryptedPrivateKeyStore).
#[derive(Debug, Clone)]
pub struct EncryptedKeyStore {
    store: EncryptedStore<KeyMap>,
}

impl EncryptedKeyStore {
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_named(KEY_STORE, key, medium, options).await
    }

    pub async fn open_named(
        name: impl Into<String>,
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        let store = EncryptedStore::open(name, key, medium, options).await?;
        Ok(Self { store })
    }

    pub fn blob_store(&self) -> &EncryptedStore<KeyMap> {
        &self.store
    }

    async fn load(&self) -> Result<KeyMap> {
        Ok(self.store.get().await?.unwrap_or_default())
    }
}

#[async_trait]
impl KeyStore for EncryptedKeyStore {
    async fn import_key(&self, key: KeyImport) -> Result<Key> {
        let (kid, parts) = key.validate().inspect_err(|e| {
            tracing::warn!(error = %e, "rejected key import");
        })?;
        let kid = match kid {
            Some(kid) => kid,
            None => random_id(KEY_ID_BYTES)?,
        };
        let key = parts.with_kid(kid);

        let stored = key.clone();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let mut keys = tx.get()?.unwrap_or_default();
                    keys.insert(stored.kid.clone(), stored);
                    tx.set(&keys)?;
                    Ok::<_, AgentError>(())
                })
            })
            .await?;

        tracing::info!(kms = %key.kms, key_type = ?key.key_type, "key imported");
        Ok(key)
    }

    async fn get_key(&self, kid: &str) -> Result<Key> {
        self.load()
            .await?
            .remove(kid)
            .ok_or_else(|| AgentError::not_found("key", kid))
    }

    async fn delete_key(&self, kid: &str) -> Result<bool> {
        let kid = kid.to_string();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let Some(mut keys) = tx.get()? else {
                        return Ok(false);
                    };
                    if keys.remove(&kid).is_none() {
                        return Ok(false);
                    }
                    tx.set(&keys)?;
                    Ok::<_, AgentError>(true)
                })
            })
            .await
    }

    async fn list_keys(&self) -> Result<Vec<Key>> {
        Ok(self.load().await?.into_values().collect())
    }
}
