//! Agent configuration store.
//!
//! Holds the single configuration record a session needs to reconnect to
//! its network: the Ethereum network name and, for deployments that use
//! one, the RPC provider project id.

use std::sync::Arc;

use idvault_store::{EncryptedStore, KeySource, StorageMedium, StoreOptions};
use serde::{Deserialize, Serialize};

use super::CONFIG_STORE;
use crate::error::{AgentError, Result};

/// Persisted agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(
        rename = "infuraProjectId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<String>,
    #[serde(rename = "ethereumNetwork")]
    pub network: String,
}

impl AgentConfig {
    pub fn new(project_id: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            network: network.into(),
        }
    }

    /// A configuration with only a network name.
    pub fn network_only(network: impl Into<String>) -> Self {
        Self {
            project_id: None,
            network: network.into(),
        }
    }
}

/// Encrypted store for the [`AgentConfig`] record.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    store: EncryptedStore<AgentConfig>,
}

impl ConfigStore {
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_named(CONFIG_STORE, key, medium, options).await
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

    pub fn blob_store(&self) -> &EncryptedStore<AgentConfig> {
        &self.store
    }

    /// The stored configuration, or `None` if none was saved.
    pub async fn get(&self) -> Result<Option<AgentConfig>> {
        Ok(self.store.get().await?)
    }

    /// The stored configuration.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidConfiguration`] if nothing is stored.
    pub async fn require(&self) -> Result<AgentConfig> {
        self.get()
            .await?
            .ok_or_else(|| AgentError::InvalidConfiguration {
                reason: "no configuration stored".into(),
            })
    }

    pub async fn set(&self, config: &AgentConfig) -> Result<()> {
        self.store.set(config).await?;
        tracing::info!(network = %config.network, "agent configuration saved");
        Ok(())
    }

    pub async fn network(&self) -> Result<String> {
        Ok(self.require().await?.network)
    }

    pub async fn project_id(&self) -> Result<String> {
        self.require()
            .await?
            .project_id
            .ok_or_else(|| AgentError::InvalidConfiguration {
                reason: "no infuraProjectId stored".into(),
            })
    }

    /// Remove the stored configuration.  The store is unusable afterwards.
    pub async fn delete(&self) -> Result<()> {
        Ok(self.store.delete().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idvault_store::{KeyHandle, KeyLength, MemoryStorage};

    async fn store() -> ConfigStore {
        let key = KeyHandle::generate(KeyLength::Aes256).unwrap();
        ConfigStore::open(key, Arc::new(MemoryStorage::new()), StoreOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_store_is_invalid_configuration() {
        let store = store().await;
        assert_eq!(store.get().await.unwrap(), None);
        assert!(matches!(
            store.network().await,
            Err(AgentError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            store.project_id().await,
            Err(AgentError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn set_then_read_fields() {
        let store = store().await;
        store
            .set(&AgentConfig::new("project-123", "goerli"))
            .await
            .unwrap();
        assert_eq!(store.network().await.unwrap(), "goerli");
        assert_eq!(store.project_id().await.unwrap(), "project-123");
    }

    #[tokio::test]
    async fn network_only_variant() {
        let store = store().await;
        store
            .set(&AgentConfig::network_only("mainnet"))
            .await
            .unwrap();
        assert_eq!(store.network().await.unwrap(), "mainnet");
        assert!(store.project_id().await.is_err());
    }

    #[test]
    fn persisted_field_names() {
        let json = serde_json::to_value(AgentConfig::new("p", "n")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "infuraProjectId": "p", "ethereumNetwork": "n" })
        );
    }
}
