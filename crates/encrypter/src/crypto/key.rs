//! [`KeyBytes`]: owned key material that is wiped when dropped.

use zeroize::Zeroizing;

/// Raw key material for the run's primitive.
///
/// The bytes are overwritten with zeroes on drop. Copies made upstream (the
/// unwrapped keyset JSON and its base64 text) are wiped by their owners in
/// `common::keyset`; transient buffers inside the JSON parser are not.
pub struct KeyBytes(Zeroizing<Vec<u8>>);

impl KeyBytes {
    pub fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("KeyBytes([REDACTED])")
    }
}
