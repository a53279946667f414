//! Storage-safe ciphertext envelope.
//!
//! One envelope holds the entire encrypted value of one named store.  It is
//! persisted as a JSON string:
//!
//! ```text
//! { "alg": "AES-256-GCM", "iv": "<base64>", "data": "<base64 ciphertext||tag>", "tagLength": 128 }
//! ```

use serde::{Deserialize, Serialize};

use crate::crypto::KeyLength;
use crate::error::{StoreError, StoreResult};

/// Serialized authenticated ciphertext (nonce + ciphertext + tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub alg: KeyLength,
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    /// Ciphertext with the authentication tag appended.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub tag_length: u32,
}

impl Envelope {
    /// Serialize to the string form written to the storage medium.
    pub fn to_json_string(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the string form read back from the storage medium.
    ///
    /// # Errors
    ///
    /// A malformed envelope is reported as [`StoreError::DecryptionFailed`]:
    /// to the caller it is indistinguishable from a tampered one.
    pub fn from_json_str(s: &str) -> StoreResult<Self> {
        serde_json::from_str(s).map_err(|e| StoreError::DecryptionFailed {
            reason: format!("malformed envelope: {e}"),
        })
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
