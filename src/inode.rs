//! Inode decoder and locator (C2/C3).

use crate::consts::{InodeFlags, Mode, INODE_SIZE, S_IFMT};
use crate::error::{Error, Result};
use crate::group_desc::GroupDescriptor;
use crate::superblock::Superblock;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// A decoded inode, windowed to the first 156 bytes regardless of `inode_size`.
#[derive(Debug, Clone)]
pub struct Inode {
    pub mode: Mode,
    pub uid: u32,
    pub size: u64,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u32,
    pub links_count: u16,
    pub blocks: u64,
    pub flags: InodeFlags,
    /// Opaque 60-byte field: extent tree root, inline data, or symlink target
    /// depending on mode/flags.
    pub block: [u8; 60],
    pub generation: u32,
    pub file_acl: u64,
    pub crtime: u32,
}

impl Inode {
    /// Decodes an inode from a slice, zero-padded up to [`INODE_SIZE`] if shorter.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut padded = [0u8; INODE_SIZE];
        let n = data.len().min(INODE_SIZE);
        padded[..n].copy_from_slice(&data[..n]);

        let mut c = Cursor::new(&padded[..]);
        let mode = c.read_u16::<LittleEndian>()?;
        let uid_lo = c.read_u16::<LittleEndian>()?;
        let size_lo = c.read_u32::<LittleEndian>()?;
        let atime = c.read_u32::<LittleEndian>()?;
        let ctime = c.read_u32::<LittleEndian>()?;
        let mtime = c.read_u32::<LittleEndian>()?;
        let dtime = c.read_u32::<LittleEndian>()?;
        let gid_lo = c.read_u16::<LittleEndian>()?;
        let links_count = c.read_u16::<LittleEndian>()?;
        let blocks_lo = c.read_u32::<LittleEndian>()?;
        let flags = c.read_u32::<LittleEndian>()?;
        let _version_lo = c.read_u32::<LittleEndian>()?;
        let mut block = [0u8; 60];
        c.read_exact(&mut block)?;
        let generation = c.read_u32::<LittleEndian>()?;
        let file_acl_lo = c.read_u32::<LittleEndian>()?;
        let size_hi = c.read_u32::<LittleEndian>()?;
        let _obso_faddr = c.read_u32::<LittleEndian>()?;
        let blocks_hi = c.read_u16::<LittleEndian>()?;
        let file_acl_hi = c.read_u16::<LittleEndian>()?;
        let uid_hi = c.read_u16::<LittleEndian>()?;
        let gid_hi = c.read_u16::<LittleEndian>()?;
        let _checksum_lo = c.read_u16::<LittleEndian>()?;
        let _reserved = c.read_u16::<LittleEndian>()?;
        let _extra_isize = c.read_u16::<LittleEndian>()?;
        let _checksum_hi = c.read_u16::<LittleEndian>()?;
        let _ctime_extra = c.read_u32::<LittleEndian>()?;
        let _mtime_extra = c.read_u32::<LittleEndian>()?;
        let _atime_extra = c.read_u32::<LittleEndian>()?;
        let crtime = c.read_u32::<LittleEndian>()?;

        Ok(Inode {
            mode: Mode::from_bits_retain(mode),
            uid: lo_hi16(uid_lo, uid_hi),
            size: lo_hi(size_lo, size_hi),
            atime,
            ctime,
            mtime,
            dtime,
            gid: lo_hi16(gid_lo, gid_hi),
            links_count,
            blocks: lo_hi(blocks_lo, blocks_hi as u32),
            flags: InodeFlags::from_bits_retain(flags),
            block,
            generation,
            file_acl: lo_hi(file_acl_lo, file_acl_hi as u32),
            crtime,
        })
    }

    /// `true` when this is logically deleted: `dtime != 0` or `links_count == 0`.
    pub fn is_deleted(&self) -> bool {
        self.dtime != 0 || self.links_count == 0
    }

    /// `true` when the opaque `block` field holds any non-zero byte.
    pub fn had_data(&self) -> bool {
        self.block.iter().any(|&b| b != 0)
    }

    /// File-type bits of the mode word (`mode & 0xF000`).
    pub fn file_type_bits(&self) -> u16 {
        self.mode.bits() & S_IFMT
    }

    pub fn is_dir(&self) -> bool {
        self.file_type_bits() == Mode::S_IFDIR.bits()
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type_bits() == Mode::S_IFLNK.bits()
    }

    /// Number of blocks spanned by the file, rounded up.
    pub fn size_in_blocks(&self, block_size: u32) -> u64 {
        (self.size + block_size as u64 - 1) / block_size as u64
    }
}

fn lo_hi(lo: u32, hi: u32) -> u64 {
    lo as u64 | ((hi as u64) << 32)
}

fn lo_hi16(lo: u16, hi: u16) -> u32 {
    lo as u32 | ((hi as u32) << 16)
}

/// Byte address of inode `index` (1-based) within the image (C3).
///
/// `group = (index - 1) / inodes_per_group`
/// `offset_in_group = (index - 1) mod inodes_per_group`
pub fn locate(sb: &Superblock, group_desc: &GroupDescriptor, index: u32) -> Result<u64> {
    if index == 0 {
        return Err(Error::Format("inode numbers are 1-based".into()));
    }
    let offset_in_group = (index - 1) % sb.inodes_per_group;
    let table_offset = group_desc.inode_table * sb.block_size as u64;
    Ok(table_offset + offset_in_group as u64 * sb.inode_size as u64)
}

/// Which block group inode `index` (1-based) belongs to.
pub fn group_of(sb: &Superblock, index: u32) -> u32 {
    (index - 1) / sb.inodes_per_group
}
