//! Shared fixtures for unit tests: fixed keysets and an in-process KMS.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::keyset::{
    EncryptedKeyset, Key, KeyData, KeyStatus, KeyType, Keyset, KeysetFormat, OutputPrefix,
};
use common::kms::{KmsClient, KmsError, MasterKey, MasterKeyUri};

use crate::crypto::cipher;
use crate::crypto::KeysetPrimitive;

pub const TEST_MASTER_KEY_URI: &str = "test-kms://unit/master";

const MASTER_KEY: [u8; cipher::KEY_LEN] = [0x11; cipher::KEY_LEN];

pub fn fixed_keyset(key_type: KeyType) -> Keyset {
    let material: Vec<u8> = (0..key_type.key_len()).map(|i| i as u8).collect();
    Keyset {
        primary_key_id: 0x0A0B_0C0D,
        key: vec![Key {
            key_data: KeyData {
                key_type,
                value: STANDARD.encode(material),
            },
            status: KeyStatus::Enabled,
            key_id: 0x0A0B_0C0D,
            output_prefix_type: OutputPrefix::Tink,
        }],
    }
}

/// Randomised AEAD primitive over a fixed key, so separate calls can decrypt
/// each other's output.
pub fn fixed_primitive() -> KeysetPrimitive {
    KeysetPrimitive::from_keyset(&fixed_keyset(KeyType::Aes256GcmSiv)).unwrap()
}

pub fn fixed_deterministic_primitive() -> KeysetPrimitive {
    KeysetPrimitive::from_keyset(&fixed_keyset(KeyType::Aes256SivDeterministic)).unwrap()
}

/// Master key that seals locally with a constant AES key.
pub struct LocalMasterKey;

#[async_trait]
impl MasterKey for LocalMasterKey {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        cipher::seal_random(&MASTER_KEY, plaintext, b"")
            .map_err(|e| KmsError::Unreachable(e.to_string()))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        cipher::open(&MASTER_KEY, ciphertext, b"")
            .map_err(|_| {
                KmsError::InvalidCiphertext("ciphertext not sealed by this master key".into())
            })
    }
}

/// How [`StubKms`] answers `master_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehaviour {
    Allow,
    Deny,
    Unreachable,
}

pub struct StubKms(pub StubBehaviour);

#[async_trait]
impl KmsClient for StubKms {
    async fn master_key(&self, uri: &MasterKeyUri) -> Result<Box<dyn MasterKey>, KmsError> {
        if uri.scheme() != "test-kms" {
            return Err(KmsError::UnsupportedUri(uri.to_string()));
        }
        match self.0 {
            StubBehaviour::Allow => Ok(Box::new(LocalMasterKey)),
            StubBehaviour::Deny => Err(KmsError::AuthorizationDenied(
                "AccessDeniedException: not authorized to use key".into(),
            )),
            StubBehaviour::Unreachable => Err(KmsError::Unreachable("dispatch failure".into())),
        }
    }
}

/// Seal `keyset` under [`LocalMasterKey`] and write it to `dir/keyset.<ext>`.
pub async fn write_wrapped_keyset(dir: &Path, keyset: &Keyset, format: KeysetFormat) -> PathBuf {
    let sealed = EncryptedKeyset::seal(keyset, &LocalMasterKey).await.unwrap();
    let path = match format {
        KeysetFormat::Json => dir.join("keyset.json"),
        KeysetFormat::Binary => dir.join("keyset.bin"),
    };
    std::fs::write(&path, sealed.to_bytes(format).unwrap()).unwrap();
    path
}

/// [`write_wrapped_keyset`] for the AES-GCM-SIV fixture keyset.
pub async fn write_fixed_keyset(dir: &Path, format: KeysetFormat) -> PathBuf {
    write_wrapped_keyset(dir, &fixed_keyset(KeyType::Aes256GcmSiv), format).await
}
