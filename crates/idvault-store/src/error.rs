//! Store error types.
//!
//! Every public API in this crate returns [`StoreError`] through
//! [`StoreResult`].  The variants keep "no value stored" (an `Ok(None)`, never
//! an error) apart from "value stored but unreadable" ([`StoreError::BadDecrypt`])
//! so callers can tell an empty store from a wrong key.

use std::time::Duration;

/// Unified error type for the encrypted blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // -- Crypto errors ------------------------------------------------------
    /// The persisted envelope could not be decrypted or decoded with the
    /// store's key (wrong key, tampered ciphertext, corrupted storage).
    #[error("bad-decrypt: cannot decrypt '{name}' with provided key: {reason}")]
    BadDecrypt { name: String, reason: String },

    /// An envelope failed authentication or could not be parsed.  The store
    /// reports this as [`StoreError::BadDecrypt`] with its name attached.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// Encryption failed (e.g. ring internal error, RNG failure).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Key derivation failed (e.g. zero iterations).
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    /// Raw or structured key material could not be imported.
    #[error("invalid key material: {reason}")]
    InvalidKey { reason: String },

    // -- Medium errors ------------------------------------------------------
    /// The underlying key-value medium failed to read, write or remove.
    #[error("storage medium error: {reason}")]
    Medium { reason: String },

    /// I/O error from the file-backed medium.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Store errors -------------------------------------------------------
    /// Waiting for the store lock took longer than the configured timeout.
    #[error("timed out after {timeout:?} waiting for lock on '{name}'")]
    LockTimeout { name: String, timeout: Duration },

    /// The store's persisted entry was deleted through this instance; the
    /// instance cannot be reused.
    #[error("store '{name}' has been deleted")]
    Deleted { name: String },

    /// JSON serialization of a value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` for errors meaning "data is present but unreadable with
    /// this key".
    pub fn is_bad_decrypt(&self) -> bool {
        matches!(self, Self::BadDecrypt { .. } | Self::DecryptionFailed { .. })
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Convenience alias used throughout the store crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
