//! Identifier store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use idvault_store::{EncryptedStore, KeySource, StorageMedium, StoreOptions};

use super::{DID_STORE, DidStore};
use crate::error::{AgentError, Result};
use crate::types::Identifier;

/// Persisted shape: DID -> identifier.
pub type DidMap = BTreeMap<String, Identifier>;

/// How to look up a single identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DidQuery {
    /// Exact DID.
    ById(String),
    /// The identifier with this alias under this provider.
    ByAlias { alias: String, provider: String },
}

impl DidQuery {
    fn matches(&self, identifier: &Identifier) -> bool {
        match self {
            Self::ById(did) => identifier.did == *did,
            Self::ByAlias { alias, provider } => {
                identifier.alias.as_deref() == Some(alias.as_str())
                    && identifier.provider == *provider
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::ById(did) => did.clone(),
            Self::ByAlias { alias, provider } => format!("{alias} ({provider})"),
        }
    }
}

/// Optional alias/provider filter for [`DidStore::list_dids`].
///
/// An empty filter matches everything; a single criterion matches on that
/// field alone; both must hold when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DidFilter {
    pub alias: Option<String>,
    pub provider: Option<String>,
}

impl DidFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn matches(&self, identifier: &Identifier) -> bool {
        let alias_ok = self
            .alias
            .as_ref()
            .is_none_or(|alias| identifier.alias.as_ref() == Some(alias));
        let provider_ok = self
            .provider
            .as_ref()
            .is_none_or(|provider| identifier.provider == *provider);
        alias_ok && provider_ok
    }
}

/// [`DidStore`] backed by an encrypted blob store.
#[derive(Debug, Clone)]
pub struct EncryptedDidStore {
    store: EncryptedStore<DidMap>,
}

impl EncryptedDidStore {
    /// Open the store under its default name.
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_named(DID_STORE, key, medium, options).await
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

    /// The underlying blob store.
    pub fn blob_store(&self) -> &EncryptedStore<DidMap> {
        &self.store
    }

    async fn load(&self) -> Result<DidMap> {
        Ok(self.store.get().await?.unwrap_or_default())
    }
}

#[async_trait]
impl DidStore for EncryptedDidStore {
    async fn import_did(&self, identifier: Identifier) -> Result<()> {
        let did = identifier.did.clone();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let mut dids = tx.get()?.unwrap_or_default();
                    dids.insert(identifier.did.clone(), identifier);
                    tx.set(&dids)?;
                    Ok::<_, AgentError>(())
                })
            })
            .await?;

        tracing::info!(did = %did, "identifier imported");
        Ok(())
    }

    async fn get_did(&self, query: DidQuery) -> Result<Identifier> {
        let dids = self.load().await?;
        let found = match &query {
            DidQuery::ById(did) => dids.get(did).cloned(),
            DidQuery::ByAlias { .. } => dids.values().find(|i| query.matches(i)).cloned(),
        };
        found.ok_or_else(|| AgentError::not_found("identifier", query.describe()))
    }

    async fn delete_did(&self, did: &str) -> Result<bool> {
        let did = did.to_string();
        let removed = self
            .store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let Some(mut dids) = tx.get()? else {
                        return Ok(false);
                    };
                    if dids.remove(&did).is_none() {
                        return Ok(false);
                    }
                    tx.set(&dids)?;
                    Ok::<_, AgentError>(true)
                })
            })
            .await?;

        tracing::debug!(removed, "identifier delete");
        Ok(removed)
    }

    async fn list_dids(&self, filter: DidFilter) -> Result<Vec<Identifier>> {
        let dids = self.load().await?;
        Ok(dids.into_values().filter(|i| filter.matches(i)).collect())
    }
}
