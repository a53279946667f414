//! Identity wallet storage for idvault.
//!
//! Typed, encrypted stores for the records a decentralized-identity agent
//! keeps locally, all built on [`idvault_store::EncryptedStore`]:
//!
//! - [`stores`] -- identifier, public key, private key, credential and
//!   configuration stores, plus the traits an agent consumes them through.
//! - [`credential_manager`] -- verification against issuer/subject
//!   expectations, and credential import/list/delete.
//! - [`session`] -- opens every store with one key and restores the agent
//!   configuration.
//! - [`config`] -- session options from code, TOML or the environment.
//! - [`types`] -- the persisted record types.
//! - [`error`] -- unified error type.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use idvault_agent::{AgentOptions, Identifier, Session};
//! use idvault_agent::stores::DidStore;
//! use idvault_store::{DeriveKeyOpts, FileStorage, KeyLength};
//!
//! # async fn example() -> idvault_agent::Result<()> {
//! let medium = Arc::new(FileStorage::open("/tmp/idvault")?);
//! let session = Session::open(
//!     DeriveKeyOpts::new("correct horse", KeyLength::Aes256),
//!     medium,
//!     AgentOptions::from_env()?,
//! )
//! .await?;
//!
//! let provider = session.default_provider();
//! session
//!     .dids()
//!     .import_did(Identifier::new("did:ethr:goerli:0xabc", provider))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential_manager;
pub mod error;
pub mod session;
pub mod stores;
pub mod types;

pub use config::AgentOptions;
pub use credential_manager::{
    CredentialManager, CredentialQuery, CredentialRef, CredentialVerifier, Verification,
};
pub use error::{AgentError, Result};
pub use session::{Session, clear_storage, config_present};
pub use stores::{
    AgentConfig, ConfigStore, CredentialFilter, CredentialStore, DidFilter, DidQuery, DidStore,
    EncryptedCredentialStore, EncryptedDidStore, EncryptedKeyStore, EncryptedPrivateKeyStore,
    KeyStore, PrivateKeyStore,
};
pub use types::{
    CredentialSubject, Identifier, ImportablePrivateKey, Issuer, Key, KeyImport, KeyType,
    ManagedPrivateKey, Service, VerifiableCredential,
};
