//! Decrypted block files
//!
//! ```text
//! [4: 0xF8D57165][32: storage_id][8: transaction][4: block_idx][8: block_offset][4: len][len: data]
//! ```

use arca_crypto::codec::{ByteReader, ByteWriter};
use arca_crypto::digest::Hash;

use crate::error::{BlockError, BlockResult};

pub const BLOCK_FILE_SIGNATURE: u32 = 0xF8D5_7165;

/// Fixed header bytes before the payload, signature included
pub const HEADER_SIZE: usize = 4 + 32 + 8 + 4 + 8 + 4;

#[derive(Clone, PartialEq, Eq)]
pub struct BlockFile {
    pub storage_id: Hash,
    pub transaction: u64,
    pub block_idx: u32,
    pub block_offset: u64,
    pub data: Vec<u8>,
}

impl BlockFile {
    /// Decode `signature ‖ payload` as produced by the envelope layer.
    pub fn decode(record: &[u8]) -> BlockResult<Self> {
        let mut r = ByteReader::new(record);
        r.expect_signature(BLOCK_FILE_SIGNATURE, "block file")?;
        let storage_id: Hash = r.read_array()?;
        let transaction = r.read_u64()?;
        let block_idx = r.read_i32()?;
        let block_idx = u32::try_from(block_idx)
            .map_err(|_| BlockError::Format(format!("negative block index {block_idx}")))?;
        let block_offset = r.read_u64()?;
        let len = r.read_len()?;
        let data = r.take(len)?.to_vec();

        Ok(Self {
            storage_id,
            transaction,
            block_idx,
            block_offset,
            data,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(HEADER_SIZE + self.data.len());
        w.put_u32(BLOCK_FILE_SIGNATURE)
            .put_bytes(&self.storage_id)
            .put_u64(self.transaction)
            .put_u32(self.block_idx)
            .put_u64(self.block_offset)
            .put_len(self.data.len())
            .put_bytes(&self.data);
        w.into_inner()
    }
}

impl std::fmt::Debug for BlockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFile")
            .field("transaction", &self.transaction)
            .field("block_idx", &self.block_idx)
            .field("block_offset", &self.block_offset)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlockFile {
        BlockFile {
            storage_id: [7; 32],
            transaction: 12,
            block_idx: 3,
            block_offset: 4096,
            data: b"block payload".to_vec(),
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), HEADER_SIZE + 13);
        assert_eq!(&bytes[..4], &BLOCK_FILE_SIGNATURE.to_be_bytes());
        assert_eq!(&bytes[36..44], &12u64.to_be_bytes());
        assert_eq!(&bytes[44..48], &3u32.to_be_bytes());
        assert_eq!(&bytes[48..56], &4096u64.to_be_bytes());
        assert_eq!(&bytes[56..60], &13u32.to_be_bytes());
        assert_eq!(BlockFile::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_negative_index_rejected() {
        let mut bytes = sample().encode();
        bytes[44] = 0x80;
        assert!(matches!(BlockFile::decode(&bytes), Err(BlockError::Format(_))));
    }

    #[test]
    fn test_length_past_end_rejected() {
        let mut bytes = sample().encode();
        bytes[59] = 14;
        assert!(BlockFile::decode(&bytes).is_err());
    }

    #[test]
    fn test_meta_signature_rejected() {
        let mut bytes = sample().encode();
        bytes[..4].copy_from_slice(&crate::meta::META_SIGNATURE.to_be_bytes());
        assert!(BlockFile::decode(&bytes).is_err());
    }

    #[test]
    fn test_debug_omits_payload() {
        let dbg = format!("{:?}", sample());
        assert!(dbg.contains("len: 13"));
        assert!(!dbg.contains("data:"));
    }
}
