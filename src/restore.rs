//! Undelete engine (C10): recovers the most recent journal-backed copy of
//! recently deleted inodes and writes their extent-resolved content to disk.

use crate::error::Result;
use crate::fs::FileSystem;
use crate::handle::trim_trailing_zeros;
use crate::inode::{self, Inode};
use chrono::{Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

/// One successfully recovered file.
#[derive(Debug)]
pub struct Recovered {
    /// Inode number of the deleted candidate this was recovered from.
    pub inode_no: u32,
    /// Path written under the output directory.
    pub path: PathBuf,
    /// Bytes written (trailing zero padding already trimmed).
    pub size: usize,
}

/// `true` when an inode looks like a deleted candidate: marked deleted
/// (`dtime != 0` or `links_count == 0`) and still carrying a non-zero `block`
/// field (it once pointed at data worth trying to recover).
fn is_candidate(inode: &Inode) -> bool {
    inode.is_deleted() && inode.had_data()
}

/// Scans every inode, recovers what it can, and writes results under
/// `output_dir` (created if missing). Per-inode and per-predecessor failures
/// are logged and skipped; the sweep never aborts on them.
///
/// Reserved inodes below the superblock's `first_ino` (the journal inode,
/// `lost+found`, and other fixed system entries) are skipped unless
/// `include_reserved` is set — mkfs leaves some of these with a stale non-zero
/// `block` field and `links_count == 0`, which would otherwise look like an
/// ordinary deleted candidate.
pub fn restore_deleted_files(
    fs: &FileSystem,
    output_dir: &Path,
    include_reserved: bool,
) -> Result<Vec<Recovered>> {
    log::info!("mapping filesystem blocks to journal copies");
    let journal = fs.journal()?;
    let journal_map = journal.build_map()?;

    fs::create_dir_all(output_dir)?;

    let mut recovered = Vec::new();
    let mut file_index = 0usize;

    for inode_no in 1..=fs.sb.inodes_count {
        if !include_reserved && inode_no < fs.sb.first_ino {
            continue;
        }
        let inode = match fs.open_inode(inode_no) {
            Ok(inode) => inode,
            Err(e) => {
                log::warn!("skipping inode {inode_no}: {e}");
                continue;
            }
        };
        if !is_candidate(&inode) {
            continue;
        }

        let group = inode::group_of(&fs.sb, inode_no);
        let gd = match fs.open_group_desc(group) {
            Ok(gd) => gd,
            Err(e) => {
                log::warn!("skipping inode {inode_no}: {e}");
                continue;
            }
        };
        let addr = match inode::locate(&fs.sb, &gd, inode_no) {
            Ok(addr) => addr,
            Err(e) => {
                log::warn!("skipping inode {inode_no}: {e}");
                continue;
            }
        };
        let block_no = addr / fs.sb.block_size as u64;
        let offset_in_block = (addr % fs.sb.block_size as u64) as usize;

        log::info!("found deleted inode {inode_no} at {addr:#x}");

        let Some(journal_blocks) = journal_map.get(&block_no) else {
            continue;
        };

        for &journal_block_no in journal_blocks {
            let raw = match journal.read_block(journal_block_no) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("skipping journal block {journal_block_no}: {e}");
                    continue;
                }
            };
            if offset_in_block + crate::consts::INODE_SIZE > raw.len() {
                continue;
            }
            let slice = &raw[offset_in_block..offset_in_block + crate::consts::INODE_SIZE];
            let predecessor = match Inode::decode(slice) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("skipping unreadable predecessor inode: {e}");
                    continue;
                }
            };
            if !(predecessor.dtime == 0 && predecessor.ctime > 0) {
                continue;
            }

            log::info!("found predecessor in journal for inode {inode_no}");
            let mut data = match fs.extract_file_bytes(&predecessor) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("failed to extract predecessor data: {e}");
                    continue;
                }
            };
            trim_trailing_zeros(&mut data);
            if data.is_empty() {
                log::warn!("cannot restore data: inode is empty");
                continue;
            }

            let filename = format!("{} - {}", format_dtime(inode.dtime), file_index);
            let path = output_dir.join(&filename);
            fs::write(&path, &data)?;
            log::info!("restored data to {}", path.display());
            recovered.push(Recovered { inode_no, path, size: data.len() });
            file_index += 1;
        }
    }

    Ok(recovered)
}

fn format_dtime(dtime: u32) -> String {
    Local
        .timestamp_opt(dtime as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| dtime.to_string())
}
