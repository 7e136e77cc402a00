//! AES-256-GCM-SIV sealing of individual field values.
//!
//! Two nonce strategies share one ciphertext layout, `nonce || ciphertext+tag`:
//!
//! - **Random** ([`seal_random`]): a fresh 96-bit nonce from the OS CSPRNG per
//!   call. Equal plaintexts give different ciphertexts.
//! - **Synthetic** ([`seal_synthetic`]): the nonce is the first 96 bits of
//!   HMAC-SHA256 over the associated data and plaintext. Equal plaintexts give
//!   equal ciphertexts, which keeps equality joins possible downstream.
//!
//! AES-GCM-SIV is nonce-misuse-resistant, so a repeated synthetic nonce only
//! ever reveals plaintext equality.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the HMAC key used for synthetic nonces.
pub const MAC_KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// A key is the wrong length.
    #[error("invalid key length: expected {expected} bytes")]
    InvalidKeyLength { expected: usize },

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The ciphertext is too short or carries the wrong prefix.
    #[cfg(test)]
    #[error("invalid ciphertext format")]
    InvalidFormat,
}

/// Seal `plaintext` under `key` with a random nonce.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error.
pub fn seal_random(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    seal_with_nonce(key, &nonce, plaintext, aad)
}

/// Seal `plaintext` under `enc_key` with a nonce derived from `mac_key`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if either key has the wrong length.
pub fn seal_synthetic(
    mac_key: &[u8],
    enc_key: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let nonce = synthetic_nonce(mac_key, plaintext, aad)?;
    seal_with_nonce(enc_key, &nonce, plaintext, aad)
}

/// Open a `nonce || ciphertext+tag` blob.
#[cfg(test)]
pub fn open(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < NONCE_LEN {
        return Err(CipherError::InvalidFormat);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    build_cipher(key)?
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CipherError::AeadFailure)
}

/// Open a synthetic-nonce blob and check the nonce matches the plaintext.
#[cfg(test)]
pub fn open_synthetic(
    mac_key: &[u8],
    enc_key: &[u8],
    sealed: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let plaintext = open(enc_key, sealed, aad)?;
    if synthetic_nonce(mac_key, &plaintext, aad)?[..] != sealed[..NONCE_LEN] {
        return Err(CipherError::AeadFailure);
    }
    Ok(plaintext)
}

fn seal_with_nonce(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CipherError::AeadFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn synthetic_nonce(
    mac_key: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<[u8; NONCE_LEN], CipherError> {
    if mac_key.len() != MAC_KEY_LEN {
        return Err(CipherError::InvalidKeyLength {
            expected: MAC_KEY_LEN,
        });
    }
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| CipherError::InvalidKeyLength { expected: MAC_KEY_LEN })?;
    // Length-prefix the associated data so (ad, pt) splits are unambiguous.
    mac.update(&(aad.len() as u64).to_be_bytes());
    mac.update(aad);
    mac.update(plaintext);
    let tag = mac.finalize().into_bytes();

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&tag[..NONCE_LEN]);
    Ok(nonce)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength { expected: KEY_LEN });
    }
    Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| CipherError::InvalidKeyLength { expected: KEY_LEN })
}
