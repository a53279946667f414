//! Credential verification and management on top of a [`CredentialStore`].
//!
//! Cryptographic verification is delegated to a [`CredentialVerifier`]; the
//! manager adds the issuer/subject expectations and persistence.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::stores::{CredentialFilter, CredentialStore};
use crate::types::VerifiableCredential;

/// Outcome of checking a credential's proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verified: bool,
    pub error: Option<String>,
}

impl Verification {
    pub fn ok() -> Self {
        Self {
            verified: true,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            error: Some(reason.into()),
        }
    }
}

/// Checks the proof on a credential (JWT signature, linked data proof, ...).
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credential: &VerifiableCredential) -> Result<Verification>;
}

/// A credential to verify: stored by id, or supplied directly.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialRef {
    Id(String),
    Credential(Box<VerifiableCredential>),
}

impl From<VerifiableCredential> for CredentialRef {
    fn from(credential: VerifiableCredential) -> Self {
        Self::Credential(Box::new(credential))
    }
}

/// How to select credentials for [`CredentialManager::list_credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialQuery {
    ById(String),
    Filter(CredentialFilter),
}

/// Verifies, imports and lists credentials.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager").finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { store, verifier }
    }

    /// Verify a credential's proof and, when `filter` is given, that its
    /// issuer and subject are among the expected ones.
    ///
    /// # Errors
    ///
    /// - [`AgentError::NotFound`] for an unknown id.
    /// - [`AgentError::VerificationFailed`] if the proof does not check out.
    /// - [`AgentError::IssuerNotExpected`] / [`AgentError::SubjectNotExpected`]
    ///   if the credential falls outside `filter`.
    pub async fn verify_credential(
        &self,
        credential: impl Into<CredentialRef>,
        filter: Option<&CredentialFilter>,
    ) -> Result<()> {
        let credential = match credential.into() {
            CredentialRef::Id(id) => self.store.get_vc(&id).await?,
            CredentialRef::Credential(vc) => *vc,
        };
        self.check(&credential, filter).await
    }

    async fn check(
        &self,
        credential: &VerifiableCredential,
        filter: Option<&CredentialFilter>,
    ) -> Result<()> {
        let outcome = self
            .verifier
            .verify(credential)
            .await
            .map_err(|e| AgentError::VerificationFailed {
                reason: e.to_string(),
            })?;
        if !outcome.verified {
            let reason = outcome
                .error
                .unwrap_or_else(|| "credential proof rejected".to_string());
            tracing::warn!(issuer = %credential.issuer_id(), %reason, "credential verification failed");
            return Err(AgentError::VerificationFailed { reason });
        }

        let Some(filter) = filter else {
            return Ok(());
        };
        if !filter.issuer_matches(credential) {
            return Err(AgentError::IssuerNotExpected {
                issuer: credential.issuer_id().to_string(),
                expected: filter.issuer_ids.clone().unwrap_or_default(),
            });
        }
        if !filter.subject_matches(credential) {
            return Err(AgentError::SubjectNotExpected {
                subject: credential.subject_id().unwrap_or("<none>").to_string(),
                expected: filter.subject_ids.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Verify, then store, a credential.  Returns its id.
    pub async fn import_credential(
        &self,
        credential: VerifiableCredential,
        filter: Option<&CredentialFilter>,
    ) -> Result<String> {
        self.check(&credential, filter).await?;
        self.store.import_vc(credential).await
    }

    /// Remove a stored credential.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotFound`] if no credential has this id.
    pub async fn delete_credential(&self, id: &str) -> Result<()> {
        self.store.delete_vc(id).await
    }

    pub async fn list_credentials(&self, query: CredentialQuery) -> Result<Vec<VerifiableCredential>> {
        match query {
            CredentialQuery::ById(id) => Ok(vec![self.store.get_vc(&id).await?]),
            CredentialQuery::Filter(filter) => self.store.list_vcs(&filter).await,
        }
    }
}
