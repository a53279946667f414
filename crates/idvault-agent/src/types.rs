//! Record types persisted by the typed stores.
//!
//! Field names serialize in camelCase so the persisted JSON matches the
//! shapes identity-agent tooling already uses (`did`, `controllerKeyId`,
//! `publicKeyHex`, `credentialSubject`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Key algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
    Secp256r1,
    X25519,
    Bls12381G1,
    Bls12381G2,
}

/// Public key record managed by a key management system.
///
/// Never carries private key material once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub kid: String,
    /// Key management system that holds the private half (e.g. `local`).
    pub kms: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub public_key_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A key as offered for import.  Every field is optional so validation can
/// report exactly what is missing or forbidden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyImport {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub kms: Option<String>,
    #[serde(default, rename = "type")]
    pub key_type: Option<KeyType>,
    #[serde(default)]
    pub public_key_hex: Option<String>,
    #[serde(default)]
    pub private_key_hex: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
}

impl KeyImport {
    /// Check required fields and reject private key material.
    ///
    /// Returns the validated key, with `kid` left as supplied (possibly
    /// `None`) for the caller to fill in.
    pub fn validate(self) -> Result<(Option<String>, KeyParts)> {
        let kms = self
            .kms
            .ok_or_else(|| AgentError::validation("kms", "no kms"))?;
        let meta = self
            .meta
            .ok_or_else(|| AgentError::validation("meta", "no meta"))?;
        if self.private_key_hex.is_some() {
            return Err(AgentError::validation(
                "privateKeyHex",
                "private key material must not be stored with a public key record",
            ));
        }
        let public_key_hex = self
            .public_key_hex
            .ok_or_else(|| AgentError::validation("publicKeyHex", "no publicKeyHex"))?;
        let key_type = self
            .key_type
            .ok_or_else(|| AgentError::validation("type", "no type"))?;

        Ok((
            self.kid,
            KeyParts {
                kms,
                key_type,
                public_key_hex,
                meta,
            },
        ))
    }
}

/// The validated parts of a [`KeyImport`], waiting for a kid.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyParts {
    pub kms: String,
    pub key_type: KeyType,
    pub public_key_hex: String,
    pub meta: Value,
}

impl KeyParts {
    pub fn with_kid(self, kid: String) -> Key {
        Key {
            kid,
            kms: self.kms,
            key_type: self.key_type,
            public_key_hex: self.public_key_hex,
            meta: Some(self.meta),
        }
    }
}

impl From<Key> for KeyImport {
    fn from(key: Key) -> Self {
        Self {
            kid: Some(key.kid),
            kms: Some(key.kms),
            key_type: Some(key.key_type),
            public_key_hex: Some(key.public_key_hex),
            private_key_hex: None,
            meta: key.meta,
        }
    }
}

/// Private key material held by the local key management system.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedPrivateKey {
    pub alias: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub private_key_hex: String,
}

impl std::fmt::Debug for ManagedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedPrivateKey")
            .field("alias", &self.alias)
            .field("key_type", &self.key_type)
            .field("private_key_hex", &"<redacted>")
            .finish()
    }
}

/// Private key offered for import; a missing alias is generated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportablePrivateKey {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub private_key_hex: String,
}

impl std::fmt::Debug for ImportablePrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportablePrivateKey")
            .field("alias", &self.alias)
            .field("key_type", &self.key_type)
            .field("private_key_hex", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A service endpoint advertised by an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A DID together with its keys and services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_key_id: Option<String>,
    #[serde(default)]
    pub keys: Vec<Key>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Identifier {
    pub fn new(did: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            alias: None,
            provider: provider.into(),
            controller_key_id: None,
            keys: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credential issuer: either a bare id or an object with an `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    Id(String),
    Object {
        id: String,
        #[serde(flatten)]
        other: Map<String, Value>,
    },
}

impl Issuer {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object { id, .. } => id,
        }
    }
}

impl From<&str> for Issuer {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

/// The subject of a credential and its claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// A W3C verifiable credential.  Only the fields the stores index on are
/// typed; everything else (`@context`, `type`, `proof`, dates) is kept
/// verbatim in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub issuer: Issuer,
    pub credential_subject: CredentialSubject,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl VerifiableCredential {
    pub fn new(issuer: impl Into<Issuer>, subject_id: Option<&str>) -> Self {
        Self {
            id: None,
            issuer: issuer.into(),
            credential_subject: CredentialSubject {
                id: subject_id.map(str::to_string),
                claims: Map::new(),
            },
            other: Map::new(),
        }
    }

    pub fn issuer_id(&self) -> &str {
        self.issuer.id()
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.id.as_deref()
    }
}
