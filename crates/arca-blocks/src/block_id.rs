//! Block identifiers
//!
//! ```text
//! base     = SHA-256(storage_id ‖ data_hash)
//! block_id = SHA-256(base ‖ u64_be(block_idx))[..20]
//! ```
//!
//! Ids are never stored, only recomputed. The remote store shards them as
//! `<first 2 hex>/<remaining 38 hex>`.

use std::fmt;
use std::str::FromStr;

use arca_crypto::digest::{self, Hash};

use crate::error::{BlockError, BlockResult};

pub const BLOCK_ID_SIZE: usize = 20;

/// Hex characters of the shard directory name
pub const SHARD_HEX: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId([u8; BLOCK_ID_SIZE]);

impl BlockId {
    pub fn derive(storage_id: &Hash, data_hash: &Hash, block_idx: u64) -> Self {
        let base = digest::sha256_concat(&[storage_id, data_hash]);
        let hash = digest::sha256_concat(&[&base, &block_idx.to_be_bytes()]);
        let mut id = [0u8; BLOCK_ID_SIZE];
        id.copy_from_slice(&hash[..BLOCK_ID_SIZE]);
        Self(id)
    }

    /// Every block id of a data blob with `count` blocks, in order.
    pub fn sequence(storage_id: &Hash, data_hash: &Hash, count: usize) -> Vec<Self> {
        (0..count as u64)
            .map(|idx| Self::derive(storage_id, data_hash, idx))
            .collect()
    }

    pub fn from_bytes(bytes: [u8; BLOCK_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_SIZE] {
        &self.0
    }

    /// 40 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `("ab", "cdef...")`: shard directory and file name.
    pub fn shard(&self) -> (String, String) {
        let mut name = self.to_hex();
        let rest = name.split_off(SHARD_HEX);
        (name, rest)
    }

    /// Remote store path: `/data/<2 hex>/<38 hex>`
    pub fn remote_path(&self) -> String {
        let (shard, rest) = self.shard();
        format!("/data/{shard}/{rest}")
    }
}

impl FromStr for BlockId {
    type Err = BlockError;

    fn from_str(s: &str) -> BlockResult<Self> {
        let mut id = [0u8; BLOCK_ID_SIZE];
        hex::decode_to_slice(s, &mut id)
            .map_err(|e| BlockError::Format(format!("block id {s:?}: {e}")))?;
        Ok(Self(id))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.to_hex())
    }
}
