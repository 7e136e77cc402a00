//! JSON and binary framings of an [`EncryptedKeyset`].
//!
//! # JSON
//!
//! ```text
//! {"encryptedKeyset": "<base64>", "keysetInfo": {"primaryKeyId": 1, "keyInfo": [...]}}
//! ```
//!
//! # Binary
//!
//! ```text
//! "FCKS" | version u8 | u32 BE len | wrapped bytes | u32 BE len | keyset-info JSON
//! ```

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::{EncryptedKeyset, KeysetError, KeysetInfo};

/// Leading bytes of the binary framing.
pub const BINARY_MAGIC: &[u8; 4] = b"FCKS";

/// Current binary framing version.
pub const BINARY_VERSION: u8 = 1;

/// On-disk framing of a wrapped keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeysetFormat {
    #[default]
    Json,
    Binary,
}

impl FromStr for KeysetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" => Ok(KeysetFormat::Json),
            "BINARY" => Ok(KeysetFormat::Binary),
            other => Err(format!("invalid keyset format {other:?}; expected json or binary")),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonEnvelope {
    encrypted_keyset: String,
    keyset_info: KeysetInfo,
}

impl EncryptedKeyset {
    /// Parse either framing, detected from the leading bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::UnknownFraming`] if neither framing matches, or
    /// [`KeysetError::Framing`] / [`KeysetError::Json`] if the recognised
    /// framing is corrupt.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, KeysetFormat), KeysetError> {
        if bytes.starts_with(BINARY_MAGIC) {
            return Ok((Self::from_binary(&bytes[BINARY_MAGIC.len()..])?, KeysetFormat::Binary));
        }
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Ok((Self::from_json(bytes)?, KeysetFormat::Json)),
            _ => Err(KeysetError::UnknownFraming),
        }
    }

    /// Serialise in the requested framing.
    pub fn to_bytes(&self, format: KeysetFormat) -> Result<Vec<u8>, KeysetError> {
        match format {
            KeysetFormat::Json => {
                let envelope = JsonEnvelope {
                    encrypted_keyset: STANDARD.encode(&self.encrypted_keyset),
                    keyset_info: self.keyset_info.clone(),
                };
                let mut out = serde_json::to_vec_pretty(&envelope)?;
                out.push(b'\n');
                Ok(out)
            }
            KeysetFormat::Binary => {
                let info = serde_json::to_vec(&self.keyset_info)?;
                let mut out = Vec::with_capacity(
                    BINARY_MAGIC.len() + 1 + 8 + self.encrypted_keyset.len() + info.len(),
                );
                out.extend_from_slice(BINARY_MAGIC);
                out.push(BINARY_VERSION);
                put_chunk(&mut out, &self.encrypted_keyset)?;
                put_chunk(&mut out, &info)?;
                Ok(out)
            }
        }
    }

    fn from_json(bytes: &[u8]) -> Result<Self, KeysetError> {
        let envelope: JsonEnvelope = serde_json::from_slice(bytes)?;
        let encrypted_keyset = STANDARD
            .decode(envelope.encrypted_keyset.as_bytes())
            .map_err(|e| KeysetError::Framing(format!("encryptedKeyset is not base64: {e}")))?;
        if encrypted_keyset.is_empty() {
            return Err(KeysetError::Framing("encryptedKeyset is empty".into()));
        }
        Ok(Self {
            encrypted_keyset,
            keyset_info: envelope.keyset_info,
        })
    }

    fn from_binary(body: &[u8]) -> Result<Self, KeysetError> {
        let (&version, mut rest) = body
            .split_first()
            .ok_or_else(|| KeysetError::Framing("missing version byte".into()))?;
        if version != BINARY_VERSION {
            return Err(KeysetError::Framing(format!("unsupported version {version}")));
        }
        let encrypted_keyset = take_chunk(&mut rest, "wrapped keyset")?.to_vec();
        let info = take_chunk(&mut rest, "keyset info")?;
        if !rest.is_empty() {
            return Err(KeysetError::Framing(format!("{} trailing bytes", rest.len())));
        }
        if encrypted_keyset.is_empty() {
            return Err(KeysetError::Framing("wrapped keyset is empty".into()));
        }
        Ok(Self {
            encrypted_keyset,
            keyset_info: serde_json::from_slice(info)?,
        })
    }
}

fn put_chunk(out: &mut Vec<u8>, chunk: &[u8]) -> Result<(), KeysetError> {
    let len = u32::try_from(chunk.len())
        .map_err(|_| KeysetError::Framing("chunk exceeds u32 length".into()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(chunk);
    Ok(())
}

fn take_chunk<'a>(rest: &mut &'a [u8], what: &str) -> Result<&'a [u8], KeysetError> {
    if rest.len() < 4 {
        return Err(KeysetError::Framing(format!("truncated length of {what}")));
    }
    let (len_bytes, tail) = rest.split_at(4);
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if tail.len() < len {
        return Err(KeysetError::Framing(format!(
            "{what} declares {len} bytes but only {} remain",
            tail.len()
        )));
    }
    let (chunk, tail) = tail.split_at(len);
    *rest = tail;
    Ok(chunk)
}
