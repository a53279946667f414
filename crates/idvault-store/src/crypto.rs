//! Symmetric key resolution and AES-GCM sealing using the `ring` crate.
//!
//! This module provides the cryptographic primitives every blob store uses:
//!
//! - **Key resolution**: a [`KeySource`] (password, raw bytes, JWK or an
//!   existing handle) is resolved once into an opaque [`KeyHandle`].
//! - **Encryption/decryption**: AES-GCM authenticated encryption with a
//!   randomly generated 96-bit nonce per call, producing an [`Envelope`].
//! - **Key derivation**: PBKDF2-HMAC-SHA256.
//!
//! # Security Notes
//!
//! - When no salt is supplied, password derivation uses a fixed all-zero
//!   16-byte salt.  Two installations using the same password therefore end
//!   up with the same key.  Existing persisted data depends on these exact
//!   key bytes, so the default is kept and a warning is logged whenever it is
//!   used.  Pass an explicit salt in [`Pbkdf2Params`] for new deployments.
//! - Nonces are random per encryption; with 96-bit nonces a collision is
//!   negligible for up to ~2^32 encryptions under one key.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{StoreError, StoreResult};

/// Length of the AES-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the salt used when none is supplied.
pub const DEFAULT_SALT_LEN: usize = 16;

/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// AES-GCM authentication tag length in bits.
pub const TAG_LEN_BITS: u32 = 128;

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

// ---------------------------------------------------------------------------
// Key length
// ---------------------------------------------------------------------------

/// Supported AES-GCM key sizes.
///
/// 192-bit keys are not offered by `ring` and are rejected on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyLength {
    /// AES-128-GCM (16-byte key).
    #[serde(rename = "AES-128-GCM")]
    Aes128,
    /// AES-256-GCM (32-byte key).
    #[serde(rename = "AES-256-GCM")]
    Aes256,
}

impl KeyLength {
    /// Key size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Key size in bits.
    pub fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }

    /// Map a bit length (128 or 256) to a key length.
    pub fn from_bits(bits: u32) -> StoreResult<Self> {
        match bits {
            128 => Ok(Self::Aes128),
            256 => Ok(Self::Aes256),
            192 => Err(StoreError::InvalidKey {
                reason: "192-bit AES keys are not supported".into(),
            }),
            other => Err(StoreError::InvalidKey {
                reason: format!("unsupported key length: {other} bits"),
            }),
        }
    }

    fn from_byte_len(len: usize) -> StoreResult<Self> {
        match len {
            16 => Ok(Self::Aes128),
            32 => Ok(Self::Aes256),
            other => Self::from_bits((other * 8) as u32),
        }
    }

    /// The JWK `alg` name for this length.
    pub fn jwk_alg(self) -> &'static str {
        match self {
            Self::Aes128 => "A128GCM",
            Self::Aes256 => "A256GCM",
        }
    }

    fn aead(self) -> &'static aead::Algorithm {
        match self {
            Self::Aes128 => &aead::AES_128_GCM,
            Self::Aes256 => &aead::AES_256_GCM,
        }
    }
}

impl fmt::Display for KeyLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes128 => f.write_str("AES-128-GCM"),
            Self::Aes256 => f.write_str("AES-256-GCM"),
        }
    }
}

// ---------------------------------------------------------------------------
// Key sources
// ---------------------------------------------------------------------------

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbkdf2Params {
    /// Salt bytes.  `None` means the fixed all-zero 16-byte salt.
    pub salt: Option<Vec<u8>>,
    /// Iteration count.  Must be non-zero.
    pub iterations: u32,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            salt: None,
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

/// Options for deriving a key from a password.
#[derive(Clone)]
pub struct DeriveKeyOpts {
    pub password: String,
    pub key_length: KeyLength,
    pub params: Pbkdf2Params,
}

impl DeriveKeyOpts {
    /// Derive with default PBKDF2 parameters (zero salt, default iterations).
    pub fn new(password: impl Into<String>, key_length: KeyLength) -> Self {
        Self {
            password: password.into(),
            key_length,
            params: Pbkdf2Params::default(),
        }
    }

    /// Use an explicit salt.
    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.params.salt = Some(salt.into());
        self
    }

    /// Override the iteration count.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.params.iterations = iterations;
        self
    }
}

impl fmt::Debug for DeriveKeyOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeriveKeyOpts")
            .field("password", &"<redacted>")
            .field("key_length", &self.key_length)
            .field("params", &self.params)
            .finish()
    }
}

/// A symmetric JSON Web Key (`kty = "oct"`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    /// Base64url (unpadded) key bytes.
    pub k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("k", &"<redacted>")
            .field("alg", &self.alg)
            .finish()
    }
}

/// Everything a store can be keyed with.  Resolved once, at open time, into
/// a [`KeyHandle`]; nothing downstream sees the variants.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// An already resolved key.
    Handle(KeyHandle),
    /// Raw AES key bytes (16 or 32).
    Raw(Vec<u8>),
    /// Structured key material.
    Jwk(Jwk),
    /// Derive from a password.
    Password(DeriveKeyOpts),
}

impl KeySource {
    /// Resolve this source into a key handle.
    ///
    /// Password derivation is CPU bound and runs on the blocking pool.
    pub async fn resolve(self) -> StoreResult<KeyHandle> {
        match self {
            Self::Handle(handle) => Ok(handle),
            Self::Raw(bytes) => KeyHandle::from_bytes(&bytes),
            Self::Jwk(jwk) => KeyHandle::from_jwk(&jwk),
            Self::Password(opts) => {
                tokio::task::spawn_blocking(move || KeyHandle::derive(&opts)).await?
            }
        }
    }
}

impl From<KeyHandle> for KeySource {
    fn from(handle: KeyHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<DeriveKeyOpts> for KeySource {
    fn from(opts: DeriveKeyOpts) -> Self {
        Self::Password(opts)
    }
}

impl From<Jwk> for KeySource {
    fn from(jwk: Jwk) -> Self {
        Self::Jwk(jwk)
    }
}

impl From<Vec<u8>> for KeySource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

// ---------------------------------------------------------------------------
// Key handle
// ---------------------------------------------------------------------------

/// An immutable AES-GCM key.  Cheap to clone; never persisted by the store.
#[derive(Clone)]
pub struct KeyHandle {
    length: KeyLength,
    bytes: Arc<[u8]>,
}

impl KeyHandle {
    /// Import raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] unless `bytes` is 16 or 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        let length = KeyLength::from_byte_len(bytes.len())?;
        Ok(Self {
            length,
            bytes: Arc::from(bytes),
        })
    }

    /// Import a symmetric JWK.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if `kty` is not `oct`, `k` is not
    /// valid base64url, or `alg` disagrees with the decoded length.
    pub fn from_jwk(jwk: &Jwk) -> StoreResult<Self> {
        if jwk.kty != "oct" {
            return Err(StoreError::InvalidKey {
                reason: format!("expected kty \"oct\", got \"{}\"", jwk.kty),
            });
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(jwk.k.trim_end_matches('='))
            .map_err(|e| StoreError::InvalidKey {
                reason: format!("bad base64url in jwk.k: {e}"),
            })?;
        let handle = Self::from_bytes(&bytes)?;

        if let Some(alg) = jwk.alg.as_deref() {
            if alg != handle.length.jwk_alg() {
                return Err(StoreError::InvalidKey {
                    reason: format!(
                        "jwk alg {alg} does not match a {}-bit key",
                        handle.length.bits()
                    ),
                });
            }
        }

        Ok(handle)
    }

    /// Derive a key from a password with PBKDF2-HMAC-SHA256.
    ///
    /// Deterministic: the same password, salt, iterations and length always
    /// give the same key.  Blocks for the duration of the derivation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyDerivationFailed`] if `iterations` is zero.
    pub fn derive(opts: &DeriveKeyOpts) -> StoreResult<Self> {
        let iterations =
            NonZeroU32::new(opts.params.iterations).ok_or_else(|| StoreError::KeyDerivationFailed {
                reason: "PBKDF2 iterations must be non-zero".into(),
            })?;

        let zero_salt = [0u8; DEFAULT_SALT_LEN];
        let salt: &[u8] = match opts.params.salt.as_deref() {
            Some(salt) => salt,
            None => {
                tracing::warn!("deriving key with the fixed all-zero salt");
                &zero_salt
            }
        };

        let mut out = vec![0u8; opts.key_length.bytes()];
        pbkdf2::derive(PBKDF2_ALG, iterations, salt, opts.password.as_bytes(), &mut out);

        tracing::debug!(
            key_length = %opts.key_length,
            iterations = opts.params.iterations,
            "derived key from password via PBKDF2"
        );

        Self::from_bytes(&out)
    }

    /// Generate a fresh random key.
    pub fn generate(length: KeyLength) -> StoreResult<Self> {
        let bytes = random_bytes(length.bytes())?;
        Self::from_bytes(&bytes)
    }

    /// The key's length.
    pub fn length(&self) -> KeyLength {
        self.length
    }

    /// Export as a symmetric JWK.
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "oct".into(),
            k: URL_SAFE_NO_PAD.encode(&self.bytes),
            alg: Some(self.length.jwk_alg().into()),
        }
    }

    fn unbound(&self) -> Option<UnboundKey> {
        UnboundKey::new(self.length.aead(), &self.bytes).ok()
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("length", &self.length)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors, so each
/// sealing key is used for a single message.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// Returns [`StoreError::EncryptionFailed`] if nonce generation or sealing
/// fails.
pub fn encrypt(plaintext: &[u8], key: &KeyHandle) -> StoreResult<Envelope> {
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| StoreError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = key.unbound().ok_or_else(|| StoreError::EncryptionFailed {
        reason: format!("failed to create {} key", key.length),
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce)));

    // `ring` encrypts in place and appends the tag.
    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| StoreError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "encrypted data"
    );

    Ok(Envelope {
        alg: key.length,
        iv: nonce.to_vec(),
        data: in_out,
        tag_length: TAG_LEN_BITS,
    })
}

/// Decrypt and authenticate `envelope` under `key`.
///
/// # Errors
///
/// Returns [`StoreError::DecryptionFailed`] if the key is wrong, the envelope
/// was produced for another key size, or any byte was tampered with.
pub fn decrypt(envelope: &Envelope, key: &KeyHandle) -> StoreResult<Vec<u8>> {
    if envelope.alg != key.length {
        return Err(StoreError::DecryptionFailed {
            reason: format!("envelope is {}, key is {}", envelope.alg, key.length),
        });
    }
    if envelope.tag_length != TAG_LEN_BITS {
        return Err(StoreError::DecryptionFailed {
            reason: format!("unsupported tag length {}", envelope.tag_length),
        });
    }

    let nonce: [u8; NONCE_LEN_BYTES] =
        envelope
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::DecryptionFailed {
                reason: format!(
                    "iv is {} bytes, expected {}",
                    envelope.iv.len(),
                    NONCE_LEN_BYTES
                ),
            })?;

    let unbound = key.unbound().ok_or_else(|| StoreError::DecryptionFailed {
        reason: format!("failed to create {} key", key.length),
    })?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(nonce)));

    let mut in_out = envelope.data.clone();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| StoreError::DecryptionFailed {
            reason: "authentication failed, wrong key or corrupted data".into(),
        })?;

    let result = plaintext.to_vec();

    tracing::trace!(
        ciphertext_len = envelope.data.len(),
        plaintext_len = result.len(),
        "decrypted data"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`StoreError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> StoreResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| StoreError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
