//! Plain-text listings of a store's snapshots
//!
//! ```text
//! META: <transaction>
//!   <TYPE> <path> <data hash hex | ->
//!
//! META: <transaction>
//!   <data hash hex> <size> <block count>
//!     <block id hex> <outer size>
//! ```

use std::io::Write;

use crate::error::BlockResult;
use crate::meta::Meta;
use crate::store::LocalStore;

/// Every path entry of every snapshot.
pub fn list_files<W: Write + ?Sized>(store: &LocalStore, out: &mut W) -> BlockResult<()> {
    for (tx, meta) in store.metas()? {
        write_files(tx, &meta, out)?;
    }
    Ok(())
}

/// Every data blob of every snapshot with its block ids.
pub fn list_datas<W: Write + ?Sized>(store: &LocalStore, out: &mut W) -> BlockResult<()> {
    for (tx, meta) in store.metas()? {
        write_datas(tx, &meta, out)?;
    }
    Ok(())
}

pub fn write_files<W: Write + ?Sized>(tx: u64, meta: &Meta, out: &mut W) -> BlockResult<()> {
    writeln!(out, "META: {tx}")?;
    for entry in &meta.paths {
        let hash = entry.hash.map(hex::encode).unwrap_or_else(|| "-".into());
        writeln!(out, "  {} {} {}", entry.kind, entry.path, hash)?;
    }
    Ok(())
}

pub fn write_datas<W: Write + ?Sized>(tx: u64, meta: &Meta, out: &mut W) -> BlockResult<()> {
    writeln!(out, "META: {tx}")?;
    for data in &meta.datas {
        writeln!(
            out,
            "  {} {} {}",
            data.hash_hex(),
            data.size,
            data.blocks.len()
        )?;
        for (block, id) in data.blocks.iter().zip(data.block_ids(&meta.storage_id)) {
            writeln!(out, "    {} {}", id, block.outer_size)?;
        }
    }
    Ok(())
}
