//! Directory-level batch operations
//!
//! Both operations write to a temp file next to the destination and rename
//! it into place only after every check has passed. The first fatal item
//! stops the batch; earlier results stay in place.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arca_crypto::digest::Hash;
use arca_crypto::envelope::{self, FileOutcome};
use tracing::{debug, info, warn};

use crate::error::{BlockError, BlockResult};
use crate::meta::Data;
use crate::reassemble::{check_available, reassemble};
use crate::store::LocalStore;
use crate::ProgressFn;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecryptReport {
    pub decrypted: usize,
    pub already_decrypted: usize,
}

/// Decrypt every regular file directly inside `dir` in place.
///
/// Files that already carry the decrypted marker are left untouched, so the
/// batch can be re-run after a failure.
pub fn decrypt_dir(
    dir: &Path,
    material: &[u8],
    temp_name: &str,
    progress: Option<&ProgressFn>,
) -> BlockResult<DecryptReport> {
    let files = target_files(dir, temp_name)?;
    let temp = dir.join(temp_name);
    let total = files.len() as u64;
    let mut report = DecryptReport::default();

    info!(dir = %dir.display(), files = files.len(), "decrypting directory");

    for (i, path) in files.iter().enumerate() {
        match decrypt_one(path, &temp, material) {
            Ok(true) => report.decrypted += 1,
            Ok(false) => report.already_decrypted += 1,
            Err(e) => {
                if temp.exists() {
                    if let Err(rm) = fs::remove_file(&temp) {
                        warn!(path = %temp.display(), "failed to remove temp file: {rm}");
                    }
                }
                return Err(BlockError::at(path, e));
            }
        }
        if let Some(cb) = progress {
            cb((i + 1) as u64, total, &path.display().to_string());
        }
    }

    info!(
        decrypted = report.decrypted,
        skipped = report.already_decrypted,
        "directory done"
    );
    Ok(report)
}

fn target_files(dir: &Path, temp_name: &str) -> BlockResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == temp_name {
            continue;
        }
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        } else {
            debug!(path = %entry.path().display(), "skipping non-file");
        }
    }
    files.sort();
    Ok(files)
}

/// Returns whether the file was decrypted (false: already was).
fn decrypt_one(path: &Path, temp: &Path, material: &[u8]) -> BlockResult<bool> {
    let bytes = fs::read(path)?;
    match envelope::open_file(material, &bytes)? {
        FileOutcome::AlreadyDecrypted => {
            warn!(path = %path.display(), "already decrypted");
            Ok(false)
        }
        FileOutcome::Decrypted(plain) => {
            fs::write(temp, &plain)?;
            fs::rename(temp, path)?;
            debug!(path = %path.display(), bytes = plain.len(), "decrypted");
            Ok(true)
        }
    }
}

/// A data blob skipped because some of its blocks are not present yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incomplete {
    pub data: String,
    pub available: usize,
    pub required: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GetDataReport {
    pub written: usize,
    pub bytes: u64,
    pub existing: usize,
    pub incomplete: Vec<Incomplete>,
}

/// Reassemble every data blob with blocks present into `dst_dir/<hash hex>`.
///
/// Each block file must belong to some data blob in the store's metas.
/// Blobs missing blocks are reported in [`GetDataReport::incomplete`] and can
/// be retried once more blocks arrive.
pub fn get_data(
    store: &LocalStore,
    dst_dir: &Path,
    progress: Option<&ProgressFn>,
) -> BlockResult<GetDataReport> {
    let index = DataIndex::load(store)?;

    let mut wanted = Vec::new();
    for tail in store.block_tails()? {
        let hash = index
            .by_tail
            .get(&tail)
            .ok_or_else(|| BlockError::Format(format!("unknown block: {tail}")))?;
        wanted.push(hash.clone());
    }
    wanted.sort();
    wanted.dedup();

    info!(datas = wanted.len(), "found blocks");

    fs::create_dir_all(dst_dir)?;
    let temp = dst_dir.join(store.temp_name());
    let total = wanted.len() as u64;
    let mut report = GetDataReport::default();

    for (i, hash) in wanted.iter().enumerate() {
        let (storage_id, data) = &index.datas[hash];
        match check_available(storage_id, data, store) {
            Err(BlockError::PartialData {
                data,
                available,
                required,
            }) => {
                info!(data = %data, available, required, "incomplete, deferring");
                report.incomplete.push(Incomplete {
                    data,
                    available,
                    required,
                });
            }
            Err(e) => return Err(e),
            Ok(_) => {
                let dst = dst_dir.join(hash);
                if dst.exists() {
                    warn!(data = %hash, "already exists");
                    report.existing += 1;
                } else {
                    let bytes = write_data(store, storage_id, data, &temp, &dst)
                        .map_err(|e| BlockError::at(&dst, e))?;
                    info!(data = %hash, blocks = data.blocks.len(), bytes, "done");
                    report.written += 1;
                    report.bytes += bytes;
                }
            }
        }
        if let Some(cb) = progress {
            cb((i + 1) as u64, total, hash);
        }
    }

    Ok(report)
}

fn write_data(
    store: &LocalStore,
    storage_id: &Hash,
    data: &Data,
    temp: &Path,
    dst: &Path,
) -> BlockResult<u64> {
    let result = File::create(temp)
        .map_err(BlockError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            let bytes = reassemble(storage_id, data, store, &mut out)?;
            out.flush()?;
            Ok(bytes)
        });

    match result {
        Ok(bytes) => {
            fs::rename(temp, dst)?;
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(temp) {
                warn!(path = %temp.display(), "failed to remove temp file: {rm}");
            }
            Err(e)
        }
    }
}

/// Every data blob named by the store's metas, keyed by lowercase hex hash.
struct DataIndex {
    datas: BTreeMap<String, (Hash, Data)>,
    by_tail: HashMap<String, String>,
}

impl DataIndex {
    fn load(store: &LocalStore) -> BlockResult<Self> {
        let mut datas = BTreeMap::new();
        let mut by_tail = HashMap::new();

        for (_, meta) in store.metas()? {
            for data in meta.datas {
                let hash = data.hash_hex();
                for id in data.block_ids(&meta.storage_id) {
                    let (_, tail) = id.shard();
                    if let Some(prev) = by_tail.insert(tail, hash.clone()) {
                        if prev != hash {
                            return Err(BlockError::Format(format!(
                                "block {id} claimed by data {prev} and {hash}"
                            )));
                        }
                    }
                }
                datas.insert(hash, (meta.storage_id, data));
            }
        }
        Ok(Self { datas, by_tail })
    }
}
