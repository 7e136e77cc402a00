//! Local field encryption primitives.
//!
//! This module is intentionally free of KMS and record-format dependencies.
//! It turns the unwrapped keyset into a [`FieldEncryptor`].
//!
//! # Ciphertext format
//!
//! ```text
//! base64( prefix || nonce || ciphertext+tag )
//! ```
//!
//! `prefix` is `0x01 || key_id (u32 BE)` for TINK-prefixed keys and empty for
//! RAW keys. Associated data is always empty, so a ciphertext is not bound to
//! its row, column, or file.

pub mod cipher;
pub mod key;
pub mod primitive;

pub use primitive::{FieldEncryptor, KeysetPrimitive};
