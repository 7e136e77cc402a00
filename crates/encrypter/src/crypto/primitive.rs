//! The run's encryption primitive, built from the primary key of an unwrapped
//! keyset and exposed through the [`FieldEncryptor`] contract.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::keyset::{KeyType, Keyset, KeysetError, PrimitiveKind};

use super::cipher::{self, CipherError, MAC_KEY_LEN};
use super::key::KeyBytes;

/// Uniform "encrypt one field value" capability.
///
/// Implementations always use empty associated data and return standard
/// base64 text, safe to embed in CSV cells and JSON strings.
#[cfg_attr(test, mockall::automock)]
pub trait FieldEncryptor: Send + Sync {
    /// Encrypt `value` and return the base64-encoded ciphertext.
    fn encrypt_field(&self, value: &str) -> Result<String, CipherError>;
}

/// Local primitive backed by the keyset's primary key.
#[derive(Debug)]
pub struct KeysetPrimitive {
    key_id: u32,
    key_type: KeyType,
    prefix: Vec<u8>,
    key: KeyBytes,
}

impl KeysetPrimitive {
    /// Build the primitive from the primary key of `keyset`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Content`] if the primary key is missing, not
    /// enabled, or carries key material of the wrong length.
    pub fn from_keyset(keyset: &Keyset) -> Result<Self, KeysetError> {
        let primary = keyset.primary()?;
        let key = KeyBytes::new(primary.key_data.material()?);
        Ok(Self {
            key_id: primary.key_id,
            key_type: primary.key_data.key_type,
            prefix: primary.output_prefix_type.bytes(primary.key_id),
            key,
        })
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.key_type.primitive()
    }

    /// Encrypt raw bytes: `prefix || nonce || ciphertext+tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] on any AEAD-level failure.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let sealed = match self.key_type {
            KeyType::Aes256GcmSiv => cipher::seal_random(self.key.as_slice(), plaintext, aad)?,
            KeyType::Aes256SivDeterministic => {
                let (mac_key, enc_key) = self.key.as_slice().split_at(MAC_KEY_LEN);
                cipher::seal_synthetic(mac_key, enc_key, plaintext, aad)?
            }
        };
        let mut out = Vec::with_capacity(self.prefix.len() + sealed.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Inverse of [`KeysetPrimitive::encrypt`], used as a test oracle.
    #[cfg(test)]
    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let sealed = ciphertext
            .strip_prefix(self.prefix.as_slice())
            .ok_or(CipherError::InvalidFormat)?;
        match self.key_type {
            KeyType::Aes256GcmSiv => cipher::open(self.key.as_slice(), sealed, aad),
            KeyType::Aes256SivDeterministic => {
                let (mac_key, enc_key) = self.key.as_slice().split_at(MAC_KEY_LEN);
                cipher::open_synthetic(mac_key, enc_key, sealed, aad)
            }
        }
    }

    /// Decode a base64 field produced by [`FieldEncryptor::encrypt_field`].
    #[cfg(test)]
    pub fn decrypt_field(&self, encoded: &str) -> Result<String, CipherError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| CipherError::InvalidFormat)?;
        let plaintext = self.decrypt(&raw, b"")?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidFormat)
    }
}

impl FieldEncryptor for KeysetPrimitive {
    fn encrypt_field(&self, value: &str) -> Result<String, CipherError> {
        let ciphertext = self.encrypt(value.as_bytes(), b"")?;
        Ok(STANDARD.encode(ciphertext))
    }
}
