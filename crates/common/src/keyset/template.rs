//! Key templates and fresh keyset generation.

use std::fmt;
use std::str::FromStr;

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use super::{Key, KeyData, KeyStatus, KeyType, Keyset, OutputPrefix};

/// Supported templates for minting a new keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTemplate {
    /// Standard AEAD: fresh randomness per encryption.
    Aes256GcmSiv,
    /// Deterministic AEAD: equal plaintexts give equal ciphertexts.
    Aes256SivDeterministic,
}

impl KeyTemplate {
    pub const ALL: [KeyTemplate; 2] =
        [KeyTemplate::Aes256GcmSiv, KeyTemplate::Aes256SivDeterministic];

    pub fn name(self) -> &'static str {
        match self {
            KeyTemplate::Aes256GcmSiv => "AES256_GCM_SIV",
            KeyTemplate::Aes256SivDeterministic => "AES256_SIV_DETERMINISTIC",
        }
    }

    pub fn key_type(self) -> KeyType {
        match self {
            KeyTemplate::Aes256GcmSiv => KeyType::Aes256GcmSiv,
            KeyTemplate::Aes256SivDeterministic => KeyType::Aes256SivDeterministic,
        }
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyTemplate::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = KeyTemplate::ALL.iter().map(|t| t.name()).collect();
                format!("invalid key template {s:?}; expected one of {}", names.join(", "))
            })
    }
}

impl Keyset {
    /// Generate a keyset holding one enabled, TINK-prefixed key for `template`.
    pub fn generate(template: KeyTemplate) -> Self {
        let key_type = template.key_type();
        let mut material = Zeroizing::new(vec![0u8; key_type.key_len()]);
        OsRng.fill_bytes(material.as_mut_slice());
        let value = STANDARD.encode(material.as_slice());

        let key_id = loop {
            let id = OsRng.next_u32();
            if id != 0 {
                break id;
            }
        };

        Keyset {
            primary_key_id: key_id,
            key: vec![Key {
                key_data: KeyData { key_type, value },
                status: KeyStatus::Enabled,
                key_id,
                output_prefix_type: OutputPrefix::Tink,
            }],
        }
    }
}
