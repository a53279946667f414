//! Typed stores over the encrypted blob store.
//!
//! Each adapter persists one map-shaped value (records keyed by their id)
//! under a fixed storage name.  Mutations run inside
//! [`EncryptedStore::atomic_operation`](idvault_store::EncryptedStore::atomic_operation),
//! so concurrent imports and deletes on one store never lose updates.
//!
//! The traits below are the seams an identity agent plugs into; the
//! `Encrypted*` types are the implementations backed by `idvault-store`.

pub mod credential;
pub mod did;
pub mod key;
pub mod private_key;
pub mod settings;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::Result;
use crate::types::{
    Identifier, ImportablePrivateKey, Key, KeyImport, ManagedPrivateKey, VerifiableCredential,
};

pub use credential::{CredentialFilter, EncryptedCredentialStore};
pub use did::{DidFilter, DidQuery, EncryptedDidStore};
pub use key::EncryptedKeyStore;
pub use private_key::EncryptedPrivateKeyStore;
pub use settings::{AgentConfig, ConfigStore};

// ---------------------------------------------------------------------------
// Storage names
// ---------------------------------------------------------------------------

pub const DID_STORE: &str = "did-store";
pub const KEY_STORE: &str = "key-store";
pub const PRIVATE_KEY_STORE: &str = "private-key-store";
pub const CREDENTIAL_STORE: &str = "vc-store";
pub const CONFIG_STORE: &str = "veramo-config-store";

/// Every storage name an agent session owns.
pub const ALL_STORES: [&str; 5] = [
    DID_STORE,
    KEY_STORE,
    PRIVATE_KEY_STORE,
    CREDENTIAL_STORE,
    CONFIG_STORE,
];

/// Random bytes for generated key ids and private key aliases.
pub(crate) const KEY_ID_BYTES: usize = 128;

/// Random bytes for generated credential ids.
pub(crate) const CREDENTIAL_ID_BYTES: usize = 16;

/// A fresh random id: `len` random bytes, base64url without padding.
pub(crate) fn random_id(len: usize) -> Result<String> {
    let bytes = idvault_store::crypto::random_bytes(len)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence for identifiers, keyed by DID.
#[async_trait]
pub trait DidStore: Send + Sync {
    /// Insert or replace the identifier with the same DID.
    async fn import_did(&self, identifier: Identifier) -> Result<()>;

    /// Look up one identifier.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotFound`](crate::AgentError::NotFound) when nothing
    /// matches.
    async fn get_did(&self, query: DidQuery) -> Result<Identifier>;

    /// Remove an identifier.  Returns `false` if it was not stored.
    async fn delete_did(&self, did: &str) -> Result<bool>;

    async fn list_dids(&self, filter: DidFilter) -> Result<Vec<Identifier>>;
}

/// Persistence for public key records, keyed by kid.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Validate and store a key, generating a kid when none is given.
    /// Returns the stored record.
    async fn import_key(&self, key: KeyImport) -> Result<Key>;

    async fn get_key(&self, kid: &str) -> Result<Key>;

    /// Remove a key.  Returns `false` if it was not stored.
    async fn delete_key(&self, kid: &str) -> Result<bool>;

    async fn list_keys(&self) -> Result<Vec<Key>>;
}

/// Persistence for private key material, keyed by alias.
#[async_trait]
pub trait PrivateKeyStore: Send + Sync {
    /// Store a private key, generating an alias when none is given.
    async fn import_key(&self, key: ImportablePrivateKey) -> Result<ManagedPrivateKey>;

    async fn get_key(&self, alias: &str) -> Result<ManagedPrivateKey>;

    /// Remove a private key.  Returns `false` if it was not stored.
    async fn delete_key(&self, alias: &str) -> Result<bool>;

    async fn list_keys(&self) -> Result<Vec<ManagedPrivateKey>>;
}

/// Persistence for verifiable credentials, keyed by credential id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store a credential, assigning an id when it has none.  Returns the id.
    async fn import_vc(&self, credential: VerifiableCredential) -> Result<String>;

    async fn get_vc(&self, id: &str) -> Result<VerifiableCredential>;

    /// Remove a credential.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotFound`](crate::AgentError::NotFound) if it was not
    /// stored.
    async fn delete_vc(&self, id: &str) -> Result<()>;

    async fn list_vcs(&self, filter: &CredentialFilter) -> Result<Vec<VerifiableCredential>>;
}
