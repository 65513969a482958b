//! Block reassembly
//!
//! For a data blob with N blocks, block `idx` must carry `block_idx == idx`
//! and `block_offset == sum(len of blocks 0..idx)`. The concatenation must
//! hash to the data hash. Any mismatch fails the whole blob.

use std::collections::HashMap;
use std::io::Write;

use arca_crypto::digest::{Hash, Sha256Stream};

use crate::block_file::BlockFile;
use crate::block_id::BlockId;
use crate::error::{BlockError, BlockResult};
use crate::meta::Data;

/// Upper bound on the buffer reserved up front from a declared data size.
const PREALLOC_LIMIT: u64 = 64 << 20;

/// Somewhere decrypted blocks can be looked up by id.
pub trait BlockSource {
    fn contains(&self, id: &BlockId) -> bool;

    fn read_block(&self, id: &BlockId) -> BlockResult<BlockFile>;
}

/// Blocks held in memory, e.g. fetched over the network.
#[derive(Debug, Default)]
pub struct MemorySource {
    blocks: HashMap<BlockId, BlockFile>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: BlockId, block: BlockFile) {
        self.blocks.insert(id, block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockSource for MemorySource {
    fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    fn read_block(&self, id: &BlockId) -> BlockResult<BlockFile> {
        self.blocks
            .get(id)
            .cloned()
            .ok_or_else(|| BlockError::Format(format!("block {id} not present")))
    }
}

/// Ids of every block of `data`, or `PartialData` if any is missing.
pub fn check_available<S>(storage_id: &Hash, data: &Data, source: &S) -> BlockResult<Vec<BlockId>>
where
    S: BlockSource + ?Sized,
{
    let ids = data.block_ids(storage_id);
    let available = ids.iter().filter(|id| source.contains(id)).count();
    if available < ids.len() {
        return Err(BlockError::PartialData {
            data: data.hash_hex(),
            available,
            required: ids.len(),
        });
    }
    Ok(ids)
}

/// Stream the blocks of `data` into `out`, verifying as it goes.
///
/// Returns the number of bytes written. On error `out` holds a partial
/// prefix which the caller must discard.
pub fn reassemble<S, W>(storage_id: &Hash, data: &Data, source: &S, out: &mut W) -> BlockResult<u64>
where
    S: BlockSource + ?Sized,
    W: Write + ?Sized,
{
    let ids = check_available(storage_id, data, source)?;
    let mut digest = Sha256Stream::new();
    let mut offset = 0u64;

    for (idx, id) in ids.iter().enumerate() {
        let block = source.read_block(id)?;
        if block.storage_id != *storage_id {
            return Err(BlockError::Integrity(format!(
                "block {id} belongs to storage {}",
                hex::encode(block.storage_id)
            )));
        }
        if block.block_idx as usize != idx {
            return Err(BlockError::Integrity(format!(
                "block {id}: index {} where {idx} expected",
                block.block_idx
            )));
        }
        if block.block_offset != offset {
            return Err(BlockError::Integrity(format!(
                "block {id}: offset {} where {offset} expected",
                block.block_offset
            )));
        }

        digest.update(&block.data);
        out.write_all(&block.data)?;
        offset += block.data.len() as u64;
    }

    let actual = digest.finish();
    if actual != data.hash {
        return Err(BlockError::Integrity(format!(
            "data hash mismatch: expected {} was {}",
            data.hash_hex(),
            hex::encode(actual)
        )));
    }

    tracing::debug!(data = %data.hash_hex(), blocks = ids.len(), bytes = offset, "reassembled");
    Ok(offset)
}

/// Reassemble into memory; nothing is returned unless every check passes.
pub fn reassemble_to_vec<S>(storage_id: &Hash, data: &Data, source: &S) -> BlockResult<Vec<u8>>
where
    S: BlockSource + ?Sized,
{
    // The declared size is unauthenticated; reserve at most PREALLOC_LIMIT.
    let reserve = usize::try_from(data.size.min(PREALLOC_LIMIT)).unwrap_or(0);
    let mut out = Vec::with_capacity(reserve);
    reassemble(storage_id, data, source, &mut out)?;
    Ok(out)
}
