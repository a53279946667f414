//! Verifiable credential store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use idvault_store::{EncryptedStore, KeySource, StorageMedium, StoreOptions};
use serde::{Deserialize, Serialize};

use super::{CREDENTIAL_ID_BYTES, CREDENTIAL_STORE, CredentialStore, random_id};
use crate::error::{AgentError, Result};
use crate::types::VerifiableCredential;

/// Persisted shape: credential id -> credential.
pub type CredentialMap = BTreeMap<String, VerifiableCredential>;

/// Issuer/subject filter for credential listings and verification.
///
/// With both lists set a credential must match both.  With one list set
/// only that dimension is checked.  An empty filter matches everything.
/// A credential without a subject id never matches a subject list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<Vec<String>>,
}

impl CredentialFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issuer_ids = Some(issuers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_ids = Some(subjects.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.issuer_ids.is_none() && self.subject_ids.is_none()
    }

    pub fn issuer_matches(&self, credential: &VerifiableCredential) -> bool {
        self.issuer_ids
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == credential.issuer_id()))
    }

    pub fn subject_matches(&self, credential: &VerifiableCredential) -> bool {
        self.subject_ids.as_ref().is_none_or(|ids| {
            credential
                .subject_id()
                .is_some_and(|subject| ids.iter().any(|id| id == subject))
        })
    }

    pub fn matches(&self, credential: &VerifiableCredential) -> bool {
        self.issuer_matches(credential) && self.subject_matches(credential)
    }
}

/// [`CredentialStore`] backed by an encrypted blob store.
#[derive(Debug, Clone)]
pub struct EncryptedCredentialStore {
    store: EncryptedStore<CredentialMap>,
}

impl EncryptedCredentialStore {
    pub async fn open(
        key: impl Into<KeySource>,
        medium: Arc<dyn StorageMedium>,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_named(CREDENTIAL_STORE, key, medium, options).await
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

    pub fn blob_store(&self) -> &EncryptedStore<CredentialMap> {
        &self.store
    }

    async fn load(&self) -> Result<CredentialMap> {
        Ok(self.store.get().await?.unwrap_or_default())
    }
}

#[async_trait]
impl CredentialStore for EncryptedCredentialStore {
    async fn import_vc(&self, mut credential: VerifiableCredential) -> Result<String> {
        let id = match credential.id.take() {
            Some(id) => id,
            None => random_id(CREDENTIAL_ID_BYTES)?,
        };
        credential.id = Some(id.clone());

        let key = id.clone();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let mut credentials = tx.get()?.unwrap_or_default();
                    credentials.insert(key, credential);
                    tx.set(&credentials)?;
                    Ok::<_, AgentError>(())
                })
            })
            .await?;

        tracing::info!(id = %id, "credential imported");
        Ok(id)
    }

    async fn get_vc(&self, id: &str) -> Result<VerifiableCredential> {
        self.load()
            .await?
            .remove(id)
            .ok_or_else(|| AgentError::not_found("credential", id))
    }

    async fn delete_vc(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.store
            .atomic_operation(move |tx| {
                Box::pin(async move {
                    let mut credentials = tx.get()?.unwrap_or_default();
                    if credentials.remove(&id).is_none() {
                        return Err(AgentError::not_found("credential", id));
                    }
                    tx.set(&credentials)?;
                    Ok::<_, AgentError>(())
                })
            })
            .await
    }

    async fn list_vcs(&self, filter: &CredentialFilter) -> Result<Vec<VerifiableCredential>> {
        let credentials = self.load().await?;
        Ok(credentials
            .into_values()
            .filter(|vc| filter.matches(vc))
            .collect())
    }
}
