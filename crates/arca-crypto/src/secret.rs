//! The 32-byte root secret and the key material derived from it

use rand::RngCore;
use zeroize::Zeroize;

use crate::digest::{self, Hash};
use crate::error::{CryptoError, CryptoResult};
use crate::SECRET_SIZE;

/// Extra SHA-256 rounds applied to a decoded secret before it is used as a
/// decryption or derivation key.
pub const STRETCH_ROUNDS: u32 = 33;

/// The root secret. Zeroized on drop; call [`Secret::clear`] to scrub it
/// earlier.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    bytes: [u8; SECRET_SIZE],
}

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_SIZE]) -> Self {
        Self { bytes }
    }

    /// A fresh secret from the OS-seeded thread RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SECRET_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parse 64 hex characters (either case).
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let mut bytes = [0u8; SECRET_SIZE];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| CryptoError::Format(format!("secret hex: {e}")))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.bytes
    }

    /// Lowercase hex. The caller owns scrubbing the returned string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// SHA-256 applied [`STRETCH_ROUNDS`] times.
    pub fn stretched(&self) -> Secret {
        let mut hash = self.bytes;
        for _ in 0..STRETCH_ROUNDS {
            hash = digest::sha256(&hash);
        }
        Secret { bytes: hash }
    }

    /// `SHA-256(secret ‖ extra)`, the "full key" shown to operators.
    pub fn full_key(&self, extra: &[u8]) -> Hash {
        digest::sha256_concat(&[&self.bytes, extra])
    }

    /// `secret ‖ extra`, the input to password and port derivation.
    pub fn with_extra(&self, extra: &[u8]) -> KeyMaterial {
        let mut bytes = Vec::with_capacity(SECRET_SIZE + extra.len());
        bytes.extend_from_slice(&self.bytes);
        bytes.extend_from_slice(extra);
        KeyMaterial { bytes }
    }

    /// Overwrite the secret with zeros now.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }

    pub fn is_cleared(&self) -> bool {
        self.bytes == [0u8; SECRET_SIZE]
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Variable-length secret bytes (a secret with appended extra text).
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }
}

impl From<&Secret> for KeyMaterial {
    fn from(secret: &Secret) -> Self {
        secret.with_extra(&[])
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
