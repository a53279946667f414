//! Agent error types.
//!
//! All adapters, the credential manager and the session surface errors
//! through [`AgentError`].  Store-level failures (bad decrypt, medium errors,
//! lock timeouts) pass through unchanged inside [`AgentError::Store`].

use idvault_store::StoreError;

/// Unified error type for the identity wallet stores.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Lookup errors -------------------------------------------------------
    /// The requested identifier, key, alias or credential is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // -- Validation errors ---------------------------------------------------
    /// A record was rejected on import before any mutation took place.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    // -- Configuration errors ------------------------------------------------
    /// A required configuration value is absent from the configuration store.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Neither the configuration store nor the supplied options provide the
    /// values a new session needs.
    #[error("missing configuration: {reason}")]
    MissingConfiguration { reason: String },

    // -- Credential errors ---------------------------------------------------
    /// The verifier rejected the credential or failed to run.
    #[error("verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// The credential's issuer is not one of the expected issuers.
    #[error("issuer not expected: {issuer} is not one of {expected:?}")]
    IssuerNotExpected {
        issuer: String,
        expected: Vec<String>,
    },

    /// The credential's subject is missing or not one of the expected
    /// subjects.
    #[error("subject not expected: {subject} is not one of {expected:?}")]
    SubjectNotExpected {
        subject: String,
        expected: Vec<String>,
    },

    // -- Underlying errors ---------------------------------------------------
    /// Error from the encrypted blob store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (configuration files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AgentError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the underlying store could not decrypt its data.
    pub fn is_bad_decrypt(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_bad_decrypt())
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;
