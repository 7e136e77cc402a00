//! Keyset data model, wrapping under a master key, and on-disk framing.
//!
//! # Lifecycle
//!
//! 1. The minter generates a [`Keyset`] from a [`KeyTemplate`], wraps it with
//!    [`EncryptedKeyset::seal`] and writes it in one of the [`KeysetFormat`]s.
//! 2. The encrypter reads the artifact with [`EncryptedKeyset::from_bytes`],
//!    unwraps it with [`EncryptedKeyset::open`] and builds a local primitive
//!    from [`Keyset::primary`].
//!
//! # Security invariants
//!
//! - The cleartext keyset only exists in memory; [`Keyset`] never prints key bytes.
//! - Buffers holding cleartext key material (the unwrapped JSON, the base64
//!   text in [`KeyData`], decoded bytes) are zeroed when dropped.
//! - Wrapping uses empty associated data.

pub mod framing;
pub mod template;

pub use framing::KeysetFormat;
pub use template::KeyTemplate;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::kms::{KmsError, MasterKey};

/// Errors produced while framing, wrapping, or validating a keyset.
#[derive(Debug, Error)]
pub enum KeysetError {
    /// The bytes match neither the JSON nor the binary framing.
    #[error("unrecognised keyset framing")]
    UnknownFraming,

    /// The framing was recognised but its structure is broken.
    #[error("corrupt keyset framing: {0}")]
    Framing(String),

    /// JSON (de)serialisation failed.
    #[error("invalid keyset JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The keyset decoded but its content is unusable.
    #[error("invalid keyset content: {0}")]
    Content(String),

    /// The master key refused or failed to (un)wrap the keyset.
    #[error(transparent)]
    Kms(#[from] KmsError),
}

/// Algorithm of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// AES-256-GCM-SIV with a random nonce per call.
    #[serde(rename = "AES256_GCM_SIV")]
    Aes256GcmSiv,
    /// AES-256-GCM-SIV with an HMAC-SHA256 synthetic nonce.
    #[serde(rename = "AES256_SIV_DETERMINISTIC")]
    Aes256SivDeterministic,
}

/// Which call contract a key satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Aead,
    DeterministicAead,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::Aead => "aead",
            PrimitiveKind::DeterministicAead => "deterministic_aead",
        }
    }
}

impl KeyType {
    /// Required length of the raw key material in bytes.
    pub fn key_len(self) -> usize {
        match self {
            KeyType::Aes256GcmSiv => 32,
            // 32-byte MAC key followed by a 32-byte encryption key.
            KeyType::Aes256SivDeterministic => 64,
        }
    }

    pub fn primitive(self) -> PrimitiveKind {
        match self {
            KeyType::Aes256GcmSiv => PrimitiveKind::Aead,
            KeyType::Aes256SivDeterministic => PrimitiveKind::DeterministicAead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Enabled,
    Disabled,
    Destroyed,
}

/// Bytes prepended to every ciphertext produced with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputPrefix {
    /// `0x01` followed by the big-endian key id.
    Tink,
    /// No prefix.
    Raw,
}

impl OutputPrefix {
    pub fn bytes(self, key_id: u32) -> Vec<u8> {
        match self {
            OutputPrefix::Tink => {
                let mut out = Vec::with_capacity(5);
                out.push(0x01);
                out.extend_from_slice(&key_id.to_be_bytes());
                out
            }
            OutputPrefix::Raw => Vec::new(),
        }
    }
}

/// Key algorithm plus base64-encoded raw material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    #[zeroize(skip)]
    pub key_type: KeyType,
    pub value: String,
}

impl KeyData {
    /// Decode the raw key bytes, checking the length required by the key type.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Content`] on bad base64 or a wrong length. The
    /// message never includes key bytes.
    pub fn material(&self) -> Result<Zeroizing<Vec<u8>>, KeysetError> {
        let bytes = STANDARD
            .decode(&self.value)
            .map(Zeroizing::new)
            .map_err(|_| KeysetError::Content("key material is not valid base64".into()))?;
        if bytes.len() != self.key_type.key_len() {
            return Err(KeysetError::Content(format!(
                "key material for {:?} must be {} bytes, got {}",
                self.key_type,
                self.key_type.key_len(),
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyData")
            .field("key_type", &self.key_type)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub key_data: KeyData,
    pub status: KeyStatus,
    pub key_id: u32,
    pub output_prefix_type: OutputPrefix,
}

/// Cleartext keyset. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyset {
    pub primary_key_id: u32,
    pub key: Vec<Key>,
}

/// Non-secret description of one key, stored next to the wrapped keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub key_type: KeyType,
    pub status: KeyStatus,
    pub key_id: u32,
    pub output_prefix_type: OutputPrefix,
}

/// Non-secret description of a wrapped keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetInfo {
    pub primary_key_id: u32,
    pub key_info: Vec<KeyInfo>,
}

impl Keyset {
    /// Return the primary key.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Content`] if the primary id is absent or the key
    /// is not enabled.
    pub fn primary(&self) -> Result<&Key, KeysetError> {
        let key = self
            .key
            .iter()
            .find(|k| k.key_id == self.primary_key_id)
            .ok_or_else(|| {
                KeysetError::Content(format!("primary key {} not found", self.primary_key_id))
            })?;
        if key.status != KeyStatus::Enabled {
            return Err(KeysetError::Content(format!(
                "primary key {} is {:?}",
                key.key_id, key.status
            )));
        }
        Ok(key)
    }

    /// Check that the keyset can back exactly one primitive kind.
    pub fn validate(&self) -> Result<(), KeysetError> {
        let primary = self.primary()?;
        let kind = primary.key_data.key_type.primitive();
        for key in self.key.iter().filter(|k| k.status == KeyStatus::Enabled) {
            if key.key_data.key_type.primitive() != kind {
                return Err(KeysetError::Content(format!(
                    "key {} is {:?} but primary key is {:?}",
                    key.key_id, key.key_data.key_type, primary.key_data.key_type
                )));
            }
            key.key_data.material()?;
        }
        Ok(())
    }

    pub fn info(&self) -> KeysetInfo {
        KeysetInfo {
            primary_key_id: self.primary_key_id,
            key_info: self
                .key
                .iter()
                .map(|k| KeyInfo {
                    key_type: k.key_data.key_type,
                    status: k.status,
                    key_id: k.key_id,
                    output_prefix_type: k.output_prefix_type,
                })
                .collect(),
        }
    }
}

/// A keyset encrypted under a master key, plus its public metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKeyset {
    pub encrypted_keyset: Vec<u8>,
    pub keyset_info: KeysetInfo,
}

impl EncryptedKeyset {
    /// Wrap `keyset` under `master`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Kms`] if the master key cannot encrypt.
    pub async fn seal(keyset: &Keyset, master: &dyn MasterKey) -> Result<Self, KeysetError> {
        keyset.validate()?;
        let cleartext = Zeroizing::new(serde_json::to_vec(keyset)?);
        let encrypted_keyset = master.encrypt(&cleartext).await?;
        Ok(Self {
            encrypted_keyset,
            keyset_info: keyset.info(),
        })
    }

    /// Unwrap with `master` and validate the cleartext keyset.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Kms`] if the master key refuses, and
    /// [`KeysetError::Json`] / [`KeysetError::Content`] if the cleartext is not
    /// a usable keyset.
    pub async fn open(&self, master: &dyn MasterKey) -> Result<Keyset, KeysetError> {
        let cleartext = Zeroizing::new(master.decrypt(&self.encrypted_keyset).await?);
        let keyset: Keyset = serde_json::from_slice(&cleartext)?;
        keyset.validate()?;
        Ok(keyset)
    }
}
