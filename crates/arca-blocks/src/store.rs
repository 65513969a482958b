//! Local on-disk stores of meta and block files
//!
//! ```text
//! meta_dir/<transaction>          decimal names, read in ascending order
//! block_dir/<2 hex>/<38 hex>      sharded layout (mirror of the remote store)
//! block_dir/<38 hex>              flat layout, shard prefix dropped
//! ```
//!
//! Each file is either an encrypted envelope or a decrypted file starting
//! with the decrypted marker. Readers accept both; the encrypted form needs
//! a key.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use arca_core::config::StoreConfig;
use arca_crypto::{envelope, KeyMaterial};

use crate::block_file::BlockFile;
use crate::block_id::{BlockId, BLOCK_ID_SIZE, SHARD_HEX};
use crate::error::{BlockError, BlockResult};
use crate::meta::Meta;
use crate::reassemble::BlockSource;

const TAIL_HEX: usize = BLOCK_ID_SIZE * 2 - SHARD_HEX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    Sharded,
    Flat,
}

#[derive(Debug)]
pub struct LocalStore {
    meta_dir: PathBuf,
    block_dir: PathBuf,
    layout: BlockLayout,
    temp_name: String,
    key: Option<KeyMaterial>,
}

impl LocalStore {
    pub fn new(meta_dir: impl Into<PathBuf>, block_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
            block_dir: block_dir.into(),
            layout: BlockLayout::Sharded,
            temp_name: crate::DEFAULT_TEMP_NAME.to_string(),
            key: None,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        let layout = if config.sharded {
            BlockLayout::Sharded
        } else {
            BlockLayout::Flat
        };
        Self::new(&config.meta_dir, &config.block_dir)
            .with_layout(layout)
            .with_temp_name(&config.temp_name)
    }

    pub fn with_layout(mut self, layout: BlockLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_temp_name(mut self, name: &str) -> Self {
        self.temp_name = name.to_string();
        self
    }

    /// Key material for files that are still encrypted.
    pub fn with_key(mut self, key: KeyMaterial) -> Self {
        self.key = Some(key);
        self
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn block_dir(&self) -> &Path {
        &self.block_dir
    }

    pub fn temp_name(&self) -> &str {
        &self.temp_name
    }

    /// Meta files by transaction number, ascending.
    ///
    /// Every entry must be a regular file with a decimal name; two names
    /// for the same number (`7` and `007`) are rejected.
    pub fn meta_files(&self) -> BlockResult<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.meta_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                return Err(BlockError::Format(format!(
                    "not a meta file: {}",
                    path.display()
                )));
            }
            let name = entry.file_name();
            let tx = name
                .to_str()
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    BlockError::Format(format!("meta file name is not a number: {}", path.display()))
                })?;
            files.push((tx, path));
        }

        files.sort_by_key(|(tx, _)| *tx);
        if let Some(w) = files.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(BlockError::Format(format!(
                "duplicate meta transaction {}",
                w[0].0
            )));
        }
        Ok(files)
    }

    /// `signature ‖ payload` of a stored file, decrypting if needed.
    pub fn open_record(&self, bytes: &[u8]) -> BlockResult<Vec<u8>> {
        if let Some(record) = envelope::strip_marker(bytes) {
            return Ok(record.to_vec());
        }
        match &self.key {
            Some(key) => Ok(envelope::open_payload(key.as_bytes(), bytes)?),
            None => Err(BlockError::Format(
                "file is encrypted and no key was supplied".into(),
            )),
        }
    }

    pub fn read_meta(&self, path: &Path) -> BlockResult<Meta> {
        let bytes = fs::read(path)?;
        self.open_record(&bytes)
            .and_then(|record| Meta::decode(&record))
            .map_err(|e| BlockError::at(path, e))
    }

    /// Every snapshot in transaction order.
    pub fn metas(&self) -> BlockResult<Vec<(u64, Meta)>> {
        self.meta_files()?
            .into_iter()
            .map(|(tx, path)| self.read_meta(&path).map(|meta| (tx, meta)))
            .collect()
    }

    pub fn block_path(&self, id: &BlockId) -> PathBuf {
        let (shard, tail) = id.shard();
        match self.layout {
            BlockLayout::Sharded => self.block_dir.join(shard).join(tail),
            BlockLayout::Flat => self.block_dir.join(tail),
        }
    }

    /// The 38-hex name tails of every block file present.
    ///
    /// Names are validated; anything else in the block directory is an
    /// error rather than silently ignored.
    pub fn block_tails(&self) -> BlockResult<HashSet<String>> {
        let mut tails = HashSet::new();
        if !self.block_dir.exists() {
            return Ok(tails);
        }
        match self.layout {
            BlockLayout::Flat => scan_tails(&self.block_dir, &self.temp_name, &mut tails)?,
            BlockLayout::Sharded => {
                for entry in fs::read_dir(&self.block_dir)? {
                    let entry = entry?;
                    let name = entry.file_name();
                    let valid = name.to_str().is_some_and(|s| is_lower_hex(s, SHARD_HEX));
                    if !valid || !entry.file_type()?.is_dir() {
                        return Err(BlockError::Format(format!(
                            "not a block shard directory: {}",
                            entry.path().display()
                        )));
                    }
                    scan_tails(&entry.path(), &self.temp_name, &mut tails)?;
                }
            }
        }
        Ok(tails)
    }
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn scan_tails(dir: &Path, temp_name: &str, tails: &mut HashSet<String>) -> BlockResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == temp_name {
            continue;
        }
        match name.to_str() {
            Some(s) if is_lower_hex(s, TAIL_HEX) && entry.file_type()?.is_file() => {
                tails.insert(s.to_string());
            }
            _ => {
                return Err(BlockError::Format(format!(
                    "not a block file: {}",
                    entry.path().display()
                )))
            }
        }
    }
    Ok(())
}

impl BlockSource for LocalStore {
    fn contains(&self, id: &BlockId) -> bool {
        self.block_path(id).is_file()
    }

    fn read_block(&self, id: &BlockId) -> BlockResult<BlockFile> {
        let path = self.block_path(id);
        let bytes = fs::read(&path)?;
        self.open_record(&bytes)
            .and_then(|record| BlockFile::decode(&record))
            .map_err(|e| BlockError::at(path, e))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::meta::tests::sample_meta;
    use crate::reassemble::tests::{split, STORAGE};
    use crate::reassemble::reassemble_to_vec;
    use arca_crypto::{seal_payload, Secret, DECRYPTED_MARKER};

    pub(crate) fn marked(record: &[u8]) -> Vec<u8> {
        let mut out = DECRYPTED_MARKER.to_be_bytes().to_vec();
        out.extend_from_slice(record);
        out
    }

    pub(crate) fn key() -> KeyMaterial {
        KeyMaterial::from(&Secret::from_bytes([3u8; 32]))
    }

    fn store(root: &Path) -> LocalStore {
        let store = LocalStore::new(root.join("meta"), root.join("data"));
        fs::create_dir_all(store.meta_dir()).unwrap();
        fs::create_dir_all(store.block_dir()).unwrap();
        store
    }

    #[test]
    fn test_meta_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for name in ["10", "9", "100"] {
            fs::write(store.meta_dir().join(name), b"").unwrap();
        }
        let txs: Vec<u64> = store.meta_files().unwrap().into_iter().map(|(tx, _)| tx).collect();
        assert_eq!(txs, vec![9, 10, 100]);
    }

    #[test]
    fn test_meta_files_reject_duplicates_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.meta_dir().join("7"), b"").unwrap();
        fs::write(store.meta_dir().join("007"), b"").unwrap();
        assert!(store.meta_files().unwrap_err().to_string().contains("duplicate"));

        fs::remove_file(store.meta_dir().join("007")).unwrap();
        fs::write(store.meta_dir().join("notes.txt"), b"").unwrap();
        assert!(store.meta_files().is_err());
    }

    #[test]
    fn test_read_meta_plain_and_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let meta = sample_meta();
        let record = meta.encode().unwrap();

        let store = store(dir.path()).with_key(key());
        fs::write(store.meta_dir().join("1"), marked(&record)).unwrap();
        let sealed = seal_payload(key().as_bytes(), crate::meta::META_SIGNATURE, &record[4..]).unwrap();
        fs::write(store.meta_dir().join("2"), sealed).unwrap();

        let metas = store.metas().unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].1, meta);
        assert_eq!(metas[1].1, meta);
    }

    #[test]
    fn test_encrypted_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let sealed = seal_payload(b"k", crate::meta::META_SIGNATURE, b"x").unwrap();
        fs::write(store.meta_dir().join("1"), sealed).unwrap();
        let err = store.metas().unwrap_err();
        assert!(err.to_string().contains("no key"));
    }

    #[test]
    fn test_block_paths() {
        let store = LocalStore::new("m", "d");
        let id = BlockId::from_bytes([0x0F; 20]);
        let tail = "0f".repeat(19);
        assert_eq!(store.block_path(&id), Path::new("d").join("0f").join(&tail));
        let flat = store.with_layout(BlockLayout::Flat);
        assert_eq!(flat.block_path(&id), Path::new("d").join(&tail));
    }

    #[test]
    fn test_blocks_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).with_key(key());
        let content = vec![0xC3u8; 700];
        let (data, blocks) = split(&content, 256);

        for (i, (id, block)) in blocks.iter().enumerate() {
            let path = store.block_path(id);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let record = block.encode();
            // mix decrypted and encrypted block files
            let bytes = if i % 2 == 0 {
                marked(&record)
            } else {
                seal_payload(key().as_bytes(), crate::block_file::BLOCK_FILE_SIGNATURE, &record[4..])
                    .unwrap()
            };
            fs::write(path, bytes).unwrap();
        }

        assert_eq!(store.block_tails().unwrap().len(), 3);
        assert_eq!(reassemble_to_vec(&STORAGE, &data, &store).unwrap(), content);
    }

    #[test]
    fn test_block_tails_reject_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).with_layout(BlockLayout::Flat);
        fs::write(store.block_dir().join("a".repeat(38)), b"").unwrap();
        fs::write(store.block_dir().join(".tempfile"), b"").unwrap();
        assert_eq!(store.block_tails().unwrap().len(), 1);

        fs::write(store.block_dir().join("README"), b"").unwrap();
        assert!(store.block_tails().is_err());
    }
}
