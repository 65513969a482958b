//! arca-blocks: the content-addressed block model
//!
//! # Overview
//! - `meta`: metadata snapshots (datas, block infos, path entries)
//! - `block_file`: decrypted per-block records
//! - `block_id`: block identifier derivation and store paths
//! - `reassemble`: ordered, verified reconstruction of a data blob
//! - `store`: local meta/block directories, encrypted or decrypted
//! - `batch`: in-place directory decryption and bulk data extraction
//! - `listing`: text listings of paths and datas

pub mod batch;
pub mod block_file;
pub mod block_id;
pub mod error;
pub mod listing;
pub mod meta;
pub mod reassemble;
pub mod store;

pub use batch::{decrypt_dir, get_data, DecryptReport, GetDataReport, Incomplete};
pub use block_file::BlockFile;
pub use block_id::BlockId;
pub use error::{BlockError, BlockResult};
pub use listing::{list_datas, list_files};
pub use meta::{BlockInfo, Data, Meta, PathEntry, PathType};
pub use reassemble::{reassemble, reassemble_to_vec, BlockSource, MemorySource};
pub use store::{BlockLayout, LocalStore};

/// Progress callback: (done, total, current item)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Temp file name used for write-then-rename
pub const DEFAULT_TEMP_NAME: &str = ".tempfile";
