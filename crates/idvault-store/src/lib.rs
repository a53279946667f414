//! Encrypted, atomically consistent local persistence for idvault.
//!
//! Every higher-level store (DIDs, keys, private keys, credentials,
//! configuration) is a typed view over one mechanism provided here: a single
//! named value, encrypted with AES-GCM as a whole, read and written under a
//! FIFO async lock.
//!
//! # Modules
//!
//! - [`lock`] -- fair, non-reentrant async lock.
//! - [`crypto`] -- key resolution (PBKDF2, raw, JWK) and AES-GCM sealing.
//! - [`envelope`] -- the persisted ciphertext format.
//! - [`medium`] -- string-keyed storage media (memory, files).
//! - [`store`] -- the encrypted blob store and its transactions.
//! - [`config`] -- store options.
//! - [`error`] -- unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use idvault_store::{DeriveKeyOpts, EncryptedStore, KeyLength, MemoryStorage, StoreError, StoreOptions};
//!
//! # async fn example() -> idvault_store::StoreResult<()> {
//! let medium = Arc::new(MemoryStorage::new());
//! let key = DeriveKeyOpts::new("pw1", KeyLength::Aes256);
//!
//! let counter: EncryptedStore<u64> =
//!     EncryptedStore::open("counter", key, medium, StoreOptions::default()).await?;
//!
//! counter
//!     .atomic_operation(|tx| Box::pin(async move {
//!         let next = tx.get()?.unwrap_or(0) + 1;
//!         tx.set(&next)?;
//!         Ok::<_, StoreError>(())
//!     }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod lock;
pub mod medium;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use config::StoreOptions;
pub use crypto::{DeriveKeyOpts, Jwk, KeyHandle, KeyLength, KeySource, Pbkdf2Params};
pub use envelope::Envelope;
pub use error::{StoreError, StoreResult};
pub use lock::{AsyncLock, LockGuard};
pub use medium::{FileStorage, MemoryStorage, StorageMedium};
pub use store::{EncryptedStore, Transaction};
