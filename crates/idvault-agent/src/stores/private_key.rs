//! Private key store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use idvault_store::{EncryptedStore, KeySource, StorageMedium, StoreOptions};

use super::{KEY_ID_BYTES, PRIVATE_KEY_STORE, PrivateKeyStore, random_id};
use crate::error::{AgentError, Result};
use crate::types::{ImportablePrivateKey, ManagedPrivateKey};

/// Persisted shape: alias -> private key.
pub type PrivateKeyMap = BTreeMap<String, ManagedPrivateKey>;

/// [`PrivateKeyStore`] backed by an encrypted blob store.
#[derive(Debug, Clone)]
pub struct EncryptedPrivateKeyStore {
    store: EncryptedStore<PrivateKeyMap>,
}

impl EncryptedPrivateKeyStore {
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_named(PRIVATE_KEY_STORE, key, medium, options).await
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

    pub fn blob_store(&self) -> &EncryptedStore<PrivateKeyMap> {
        &self.store
    }

    async fn load(&self) -> Result<PrivateKeyMap> {
        Ok(self.store.get().await?.unwrap_or_default())
    }
}

#[async_trait]
impl PrivateKeyStore for EncryptedPrivateKeyStore {
    async fn import_key(&self, key: ImportablePrivateKey) -> Result<ManagedPrivateKey> {
        let alias = match key.alias {
            Some(alias) => alias,
            None => random_id(KEY_ID_BYTES)?,
        };
        let managed = ManagedPrivateKey {
            alias,
            key_type: key.key_type,
            private_key_hex: key.private_key_hex,
        };

        let stored = managed.clone();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let mut keys = tx.get()?.unwrap_or_default();
                    keys.insert(stored.alias.clone(), stored);
                    tx.set(&keys)?;
                    Ok::<_, AgentError>(())
                })
            })
            .await?;

        tracing::info!(key_type = ?managed.key_type, "private key imported");
        Ok(managed)
    }

    async fn get_key(&self, alias: &str) -> Result<ManagedPrivateKey> {
        self.load()
            .await?
            .remove(alias)
            .ok_or_else(|| AgentError::not_found("private key", alias))
    }

    async fn delete_key(&self, alias: &str) -> Result<bool> {
        let alias = alias.to_string();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let Some(mut keys) = tx.get()? else {
                        return Ok(false);
                    };
                    if keys.remove(&alias).is_none() {
                        return Ok(false);
                    }
                    tx.set(&keys)?;
                    Ok::<_, AgentError>(true)
                })
            })
            .await
    }

    async fn list_keys(&self) -> Result<Vec<ManagedPrivateKey>> {
        Ok(self.load().await?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyType;
    use idvault_store::{KeyHandle, KeyLength, MemoryStorage};

    async fn store() -> EncryptedPrivateKeyStore {
        let key = KeyHandle::generate(KeyLength::Aes128).unwrap();
        EncryptedPrivateKeyStore::open(key, Arc::new(MemoryStorage::new()), StoreOptions::default())
            .await
            .unwrap()
    }

    fn importable(alias: Option<&str>) -> ImportablePrivateKey {
        ImportablePrivateKey {
            alias: alias.map(str::to_string),
            key_type: KeyType::Secp256k1,
            private_key_hex: "a1b2c3".into(),
        }
    }

    #[tokio::test]
    async fn import_with_and_without_alias() {
        let store = store().await;

        let named = store.import_key(importable(Some("main"))).await.unwrap();
        assert_eq!(named.alias, "main");

        let generated = store.import_key(importable(None)).await.unwrap();
        assert!(!generated.alias.is_empty());
        assert_ne!(generated.alias, "main");

        assert_eq!(store.get_key("main").await.unwrap(), named);
        assert_eq!(store.list_keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_and_missing_lookup() {
        let store = store().await;
        store.import_key(importable(Some("main"))).await.unwrap();

        assert!(store.delete_key("main").await.unwrap());
        assert!(!store.delete_key("main").await.unwrap());
        assert!(store.get_key("main").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn key_material_is_not_visible_on_medium() {
        let medium = Arc::new(MemoryStorage::new());
        let key = KeyHandle::generate(KeyLength::Aes256).unwrap();
        let store = EncryptedPrivateKeyStore::open(key, medium.clone(), StoreOptions::default())
            .await
            .unwrap();
        store.import_key(importable(Some("main"))).await.unwrap();

        let raw = medium.get(PRIVATE_KEY_STORE).unwrap().unwrap();
        assert!(!raw.contains("a1b2c3"));
        assert!(!raw.contains("main"));
    }
}
