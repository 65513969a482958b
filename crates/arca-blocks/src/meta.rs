//! Metadata snapshots
//!
//! Binary layout (big-endian):
//! ```text
//! [4: 0xB5624A23][32: storage_id][8: timestamp][8: prev_timestamp][4: count]
//! count × [1: tag][...]
//!
//! tag 0  Data        [8: size][32: hash][4: n] n × BlockInfo
//! tag 1  hashed path [string][4: type 0=FILE 1=ARCHIVE][32: hash][8: time, 0 = none]
//! tag 2  bare path   [string][4: type 0=DELETED 1=DIRECTORY]
//!
//! BlockInfo          [8: inner_size][32: inner_hash][8: outer_size][32: outer_hash]
//! ```
//!
//! An unknown tag or type means a newer format and is always fatal.

use std::fmt;

use arca_crypto::codec::{ByteReader, ByteWriter};
use arca_crypto::digest::Hash;

use crate::block_id::BlockId;
use crate::error::{BlockError, BlockResult};

pub const META_SIGNATURE: u32 = 0xB562_4A23;

const TAG_DATA: u8 = 0;
const TAG_HASHED_PATH: u8 = 1;
const TAG_BARE_PATH: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub inner_size: u64,
    pub inner_hash: Hash,
    pub outer_size: u64,
    pub outer_hash: Hash,
}

/// One unique content blob and its ordered blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub size: u64,
    pub hash: Hash,
    pub blocks: Vec<BlockInfo>,
}

impl Data {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn block_ids(&self, storage_id: &Hash) -> Vec<BlockId> {
        BlockId::sequence(storage_id, &self.hash, self.blocks.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    File,
    Archive,
    Directory,
    Deleted,
}

impl PathType {
    /// File and archive entries reference a data hash.
    pub fn has_hash(self) -> bool {
        matches!(self, PathType::File | PathType::Archive)
    }

    fn from_hashed(v: i32) -> BlockResult<Self> {
        match v {
            0 => Ok(PathType::File),
            1 => Ok(PathType::Archive),
            other => Err(BlockError::Format(format!("unknown hashed path type {other}"))),
        }
    }

    fn from_bare(v: i32) -> BlockResult<Self> {
        match v {
            0 => Ok(PathType::Deleted),
            1 => Ok(PathType::Directory),
            other => Err(BlockError::Format(format!("unknown bare path type {other}"))),
        }
    }

    fn code(self) -> i32 {
        match self {
            PathType::File | PathType::Deleted => 0,
            PathType::Archive | PathType::Directory => 1,
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathType::File => "FILE",
            PathType::Archive => "ARCHIVE",
            PathType::Directory => "DIRECTORY",
            PathType::Deleted => "DELETED",
        })
    }
}

/// A filesystem path entry. `hash` is set exactly for FILE and ARCHIVE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: String,
    pub kind: PathType,
    pub hash: Option<Hash>,
    pub time: Option<i64>,
}

impl PathEntry {
    pub fn hashed(path: impl Into<String>, kind: PathType, hash: Hash, time: Option<i64>) -> Self {
        debug_assert!(kind.has_hash());
        Self {
            path: path.into(),
            kind,
            hash: Some(hash),
            time,
        }
    }

    pub fn bare(path: impl Into<String>, kind: PathType) -> Self {
        debug_assert!(!kind.has_hash());
        Self {
            path: path.into(),
            kind,
            hash: None,
            time: None,
        }
    }
}

/// One backup transaction's view of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub storage_id: Hash,
    pub timestamp: i64,
    pub prev_timestamp: i64,
    pub datas: Vec<Data>,
    pub paths: Vec<PathEntry>,
}

impl Meta {
    /// The previous snapshot's timestamp, if this is not the first.
    pub fn previous(&self) -> Option<i64> {
        (self.prev_timestamp != 0).then_some(self.prev_timestamp)
    }

    /// Decode `signature ‖ payload` as produced by the envelope layer.
    pub fn decode(record: &[u8]) -> BlockResult<Self> {
        let mut r = ByteReader::new(record);
        r.expect_signature(META_SIGNATURE, "meta")?;
        let storage_id: Hash = r.read_array()?;
        let timestamp = r.read_i64()?;
        let prev_timestamp = r.read_i64()?;
        let count = r.read_len()?;

        let mut datas = Vec::new();
        let mut paths = Vec::new();
        for _ in 0..count {
            match r.read_u8()? {
                TAG_DATA => datas.push(read_data(&mut r)?),
                TAG_HASHED_PATH => {
                    let path = r.read_string()?;
                    let kind = PathType::from_hashed(r.read_i32()?)?;
                    let hash: Hash = r.read_array()?;
                    let time = match r.read_i64()? {
                        0 => None,
                        t => Some(t),
                    };
                    paths.push(PathEntry::hashed(path, kind, hash, time));
                }
                TAG_BARE_PATH => {
                    let path = r.read_string()?;
                    let kind = PathType::from_bare(r.read_i32()?)?;
                    paths.push(PathEntry::bare(path, kind));
                }
                tag => return Err(BlockError::Format(format!("unknown meta record tag {tag}"))),
            }
        }

        if !r.is_empty() {
            tracing::debug!(trailing = r.remaining(), "ignoring bytes after meta records");
        }

        Ok(Self {
            storage_id,
            timestamp,
            prev_timestamp,
            datas,
            paths,
        })
    }

    /// Encode as `signature ‖ payload`; datas are written before paths.
    ///
    /// A path entry whose hash does not fit its type is a format error.
    pub fn encode(&self) -> BlockResult<Vec<u8>> {
        let mut w = ByteWriter::new();
        w.put_u32(META_SIGNATURE)
            .put_bytes(&self.storage_id)
            .put_i64(self.timestamp)
            .put_i64(self.prev_timestamp)
            .put_len(self.datas.len() + self.paths.len());

        for data in &self.datas {
            w.put_u8(TAG_DATA)
                .put_u64(data.size)
                .put_bytes(&data.hash)
                .put_len(data.blocks.len());
            for block in &data.blocks {
                w.put_u64(block.inner_size)
                    .put_bytes(&block.inner_hash)
                    .put_u64(block.outer_size)
                    .put_bytes(&block.outer_hash);
            }
        }

        for entry in &self.paths {
            match (entry.hash, entry.kind.has_hash()) {
                (Some(hash), true) => {
                    w.put_u8(TAG_HASHED_PATH)
                        .put_string(&entry.path)
                        .put_i32(entry.kind.code())
                        .put_bytes(&hash)
                        .put_i64(entry.time.unwrap_or(0));
                }
                (None, false) => {
                    w.put_u8(TAG_BARE_PATH)
                        .put_string(&entry.path)
                        .put_i32(entry.kind.code());
                }
                (hash, _) => {
                    return Err(BlockError::Format(format!(
                        "path {:?}: {:?} entry {} a content hash",
                        entry.path,
                        entry.kind,
                        if hash.is_some() { "must not carry" } else { "requires" }
                    )));
                }
            }
        }
        Ok(w.into_inner())
    }
}

fn read_data(r: &mut ByteReader<'_>) -> BlockResult<Data> {
    let size = r.read_u64()?;
    let hash: Hash = r.read_array()?;
    let n = r.read_len()?;
    // each BlockInfo is 80 bytes; don't trust n for the allocation
    let mut blocks = Vec::with_capacity(n.min(r.remaining() / 80));
    for _ in 0..n {
        blocks.push(BlockInfo {
            inner_size: r.read_u64()?,
            inner_hash: r.read_array()?,
            outer_size: r.read_u64()?,
            outer_hash: r.read_array()?,
        });
    }
    Ok(Data { size, hash, blocks })
}
