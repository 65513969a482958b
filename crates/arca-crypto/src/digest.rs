//! SHA-256 helpers used by every other module
//!
//! `Sha256Stream` wraps the incremental hasher so a running digest is
//! finalized exactly once: `finish` takes `self`.

use sha2::{Digest, Sha256};
use std::io;

/// A SHA-256 digest (32 bytes)
pub type Hash = [u8; 32];

pub const HASH_SIZE: usize = 32;

/// Hash a byte slice in memory.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash the concatenation of several slices without allocating it.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Apply SHA-256 `rounds` times, starting from `seed`.
///
/// One round is plain `sha256(seed)`.
pub fn iterate(seed: &[u8], rounds: u32) -> Hash {
    debug_assert!(rounds >= 1, "iterate needs at least one round");
    let mut hash = sha256(seed);
    for _ in 1..rounds {
        hash = sha256(&hash);
    }
    hash
}

/// Incremental SHA-256 over data that arrives in pieces.
#[derive(Clone, Default)]
pub struct Sha256Stream {
    hasher: Sha256,
    len: u64,
}

impl Sha256Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Bytes fed so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(self) -> Hash {
        self.hasher.finalize().into()
    }
}

impl io::Write for Sha256Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lowercase hex form of a digest or id
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
