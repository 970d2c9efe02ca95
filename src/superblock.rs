//! Superblock decoder (part of C2).

use crate::consts::{
    CompatFeatures, IncompatFeatures, RoCompatFeatures, GROUP_0_PADDING, RO_COMPAT_BIGALLOC_BIT,
    SUPERBLOCK_MAGIC, SUPERBLOCK_SIZE,
};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// The decoded ext4 superblock (1024 bytes at byte offset 1024).
#[derive(Debug, Clone)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u64,
    pub r_blocks_count: u64,
    pub free_blocks_count: u64,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub log_cluster_size: u32,
    pub blocks_per_group: u32,
    pub clusters_per_group: u32,
    pub inodes_per_group: u32,
    pub mtime: u32,
    pub wtime: u32,
    pub mnt_count: u16,
    pub max_mnt_count: u16,
    pub magic: u16,
    pub state: u16,
    pub errors: u16,
    pub minor_rev_level: u16,
    pub lastcheck: u32,
    pub checkinterval: u32,
    pub creator_os: u32,
    pub rev_level: u32,
    pub def_resuid: u16,
    pub def_resgid: u16,
    pub first_ino: u32,
    pub inode_size: u16,
    pub block_group_nr: u16,
    pub feature_compat: CompatFeatures,
    pub feature_incompat: IncompatFeatures,
    pub feature_ro_compat: RoCompatFeatures,
    pub uuid: [u8; 16],
    pub volume_name: [u8; 16],
    pub last_mounted: [u8; 64],
    pub algorithm_usage_bitmap: u32,
    pub journal_uuid: [u8; 16],
    pub journal_inum: u32,
    pub journal_dev: u32,
    pub last_orphan: u32,
    pub hash_seed: [u32; 4],
    pub def_hash_version: u8,
    pub desc_size: u16,
    pub kbytes_written: u64,
    pub error_count: u32,

    /// `block_size = 1024 << log_block_size`.
    pub block_size: u32,
}

impl Superblock {
    /// Decodes a superblock from a 1024-byte slice.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != SUPERBLOCK_SIZE {
            return Err(Error::Format(format!(
                "superblock must be {SUPERBLOCK_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let mut c = Cursor::new(data);

        let inodes_count = c.read_u32::<LittleEndian>()?;
        let blocks_count_lo = c.read_u32::<LittleEndian>()?;
        let r_blocks_count_lo = c.read_u32::<LittleEndian>()?;
        let free_blocks_count_lo = c.read_u32::<LittleEndian>()?;
        let free_inodes_count = c.read_u32::<LittleEndian>()?;
        let first_data_block = c.read_u32::<LittleEndian>()?;
        let log_block_size = c.read_u32::<LittleEndian>()?;
        let log_cluster_size = c.read_u32::<LittleEndian>()?;
        let blocks_per_group = c.read_u32::<LittleEndian>()?;
        let clusters_per_group = c.read_u32::<LittleEndian>()?;
        let inodes_per_group = c.read_u32::<LittleEndian>()?;
        let mtime = c.read_u32::<LittleEndian>()?;
        let wtime = c.read_u32::<LittleEndian>()?;
        let mnt_count = c.read_u16::<LittleEndian>()?;
        let max_mnt_count = c.read_u16::<LittleEndian>()?;
        let magic = c.read_u16::<LittleEndian>()?;
        if magic != SUPERBLOCK_MAGIC {
            return Err(Error::Format(format!(
                "bad superblock magic: {magic:#x}, expected {SUPERBLOCK_MAGIC:#x}"
            )));
        }
        let state = c.read_u16::<LittleEndian>()?;
        let errors = c.read_u16::<LittleEndian>()?;
        let minor_rev_level = c.read_u16::<LittleEndian>()?;
        let lastcheck = c.read_u32::<LittleEndian>()?;
        let checkinterval = c.read_u32::<LittleEndian>()?;
        let creator_os = c.read_u32::<LittleEndian>()?;
        let rev_level = c.read_u32::<LittleEndian>()?;
        let def_resuid = c.read_u16::<LittleEndian>()?;
        let def_resgid = c.read_u16::<LittleEndian>()?;
        let first_ino = c.read_u32::<LittleEndian>()?;
        let inode_size = c.read_u16::<LittleEndian>()?;
        let block_group_nr = c.read_u16::<LittleEndian>()?;
        let feature_compat = CompatFeatures::from_bits_retain(c.read_u32::<LittleEndian>()?);
        let feature_incompat = IncompatFeatures::from_bits_retain(c.read_u32::<LittleEndian>()?);
        let feature_ro_compat = RoCompatFeatures::from_bits_retain(c.read_u32::<LittleEndian>()?);
        let mut uuid = [0u8; 16];
        c.read_exact(&mut uuid)?;
        let mut volume_name = [0u8; 16];
        c.read_exact(&mut volume_name)?;
        let mut last_mounted = [0u8; 64];
        c.read_exact(&mut last_mounted)?;
        let algorithm_usage_bitmap = c.read_u32::<LittleEndian>()?;
        let _prealloc_blocks = c.read_u8()?;
        let _prealloc_dir_blocks = c.read_u8()?;
        let reserved_gdt_blocks = c.read_u16::<LittleEndian>()?;
        let _ = reserved_gdt_blocks;
        let mut journal_uuid = [0u8; 16];
        c.read_exact(&mut journal_uuid)?;
        let journal_inum = c.read_u32::<LittleEndian>()?;
        let journal_dev = c.read_u32::<LittleEndian>()?;
        let last_orphan = c.read_u32::<LittleEndian>()?;
        let mut hash_seed = [0u32; 4];
        for h in hash_seed.iter_mut() {
            *h = c.read_u32::<LittleEndian>()?;
        }
        let def_hash_version = c.read_u8()?;
        let _jnl_backup_type = c.read_u8()?;
        let desc_size_field = c.read_u16::<LittleEndian>()?;
        let _default_mount_opts = c.read_u32::<LittleEndian>()?;
        let _first_meta_bg = c.read_u32::<LittleEndian>()?;
        let _mkfs_time = c.read_u32::<LittleEndian>()?;
        for _ in 0..17 {
            c.read_u32::<LittleEndian>()?;
        }
        let blocks_count_hi = c.read_u32::<LittleEndian>()?;
        let r_blocks_count_hi = c.read_u32::<LittleEndian>()?;
        let free_blocks_count_hi = c.read_u32::<LittleEndian>()?;
        let _min_extra_isize = c.read_u16::<LittleEndian>()?;
        let _want_extra_isize = c.read_u16::<LittleEndian>()?;
        let _flags = c.read_u32::<LittleEndian>()?;
        let _raid_stride = c.read_u16::<LittleEndian>()?;
        let _mmp_interval = c.read_u16::<LittleEndian>()?;
        let _mmp_block = c.read_u64::<LittleEndian>()?;
        let _raid_stripe_width = c.read_u32::<LittleEndian>()?;
        let _log_groups_per_flex = c.read_u8()?;
        let _checksum_type = c.read_u8()?;
        let _reserved_pad = c.read_u16::<LittleEndian>()?;
        let kbytes_written = c.read_u64::<LittleEndian>()?;
        let _snapshot_inum = c.read_u32::<LittleEndian>()?;
        let _snapshot_id = c.read_u32::<LittleEndian>()?;
        let _snapshot_r_blocks_count = c.read_u64::<LittleEndian>()?;
        let _snapshot_list = c.read_u32::<LittleEndian>()?;
        let error_count = c.read_u32::<LittleEndian>()?;

        let is64 = feature_incompat.contains(IncompatFeatures::BIT64);
        let desc_size = if is64 { desc_size_field.max(32) } else { 32 };

        let block_size = 1024u32 << log_block_size;

        Ok(Superblock {
            inodes_count,
            blocks_count: lo_hi(blocks_count_lo, blocks_count_hi),
            r_blocks_count: lo_hi(r_blocks_count_lo, r_blocks_count_hi),
            free_blocks_count: lo_hi(free_blocks_count_lo, free_blocks_count_hi),
            free_inodes_count,
            first_data_block,
            log_block_size,
            log_cluster_size,
            blocks_per_group,
            clusters_per_group,
            inodes_per_group,
            mtime,
            wtime,
            mnt_count,
            max_mnt_count,
            magic,
            state,
            errors,
            minor_rev_level,
            lastcheck,
            checkinterval,
            creator_os,
            rev_level,
            def_resuid,
            def_resgid,
            first_ino,
            inode_size,
            block_group_nr,
            feature_compat,
            feature_incompat,
            feature_ro_compat,
            uuid,
            volume_name,
            last_mounted,
            algorithm_usage_bitmap,
            journal_uuid,
            journal_inum,
            journal_dev,
            last_orphan,
            hash_seed,
            def_hash_version,
            desc_size,
            kbytes_written,
            error_count,
            block_size,
        })
    }

    /// Returns `true` if the image declares an incompat feature bit this crate
    /// cannot decode (encryption, meta_bg) or the ro_compat bigalloc bit.
    pub fn check_supported(&self) -> Result<()> {
        let unsupported = self.feature_incompat.unsupported();
        if !unsupported.is_empty() {
            return Err(Error::UnsupportedFeature(unsupported.bits()));
        }
        if self.feature_ro_compat.bits() & RO_COMPAT_BIGALLOC_BIT != 0 {
            return Err(Error::UnsupportedFeature(RO_COMPAT_BIGALLOC_BIT));
        }
        Ok(())
    }

    /// Byte offset of the group descriptor table.
    pub fn gdt_offset(&self) -> u64 {
        (GROUP_0_PADDING + SUPERBLOCK_SIZE as u64).max(self.block_size as u64)
    }

    /// Size in bytes of one group descriptor record (32 or 64).
    pub fn desc_size(&self) -> u16 {
        if self.feature_incompat.contains(IncompatFeatures::BIT64) {
            self.desc_size
        } else {
            32
        }
    }

    /// `last_mounted` with trailing NUL bytes trimmed, lossily decoded as UTF-8.
    pub fn last_mounted_str(&self) -> String {
        trim_cstr(&self.last_mounted)
    }

    /// `volume_name` with trailing NUL bytes trimmed, lossily decoded as UTF-8.
    pub fn volume_name_str(&self) -> String {
        trim_cstr(&self.volume_name)
    }
}

fn lo_hi(lo: u32, hi: u32) -> u64 {
    lo as u64 | ((hi as u64) << 32)
}

fn trim_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_superblock_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(&32u32.to_le_bytes()); // inodes_count
        buf[4..8].copy_from_slice(&10240u32.to_le_bytes()); // blocks_count_lo
        buf[20..24].copy_from_slice(&0u32.to_le_bytes()); // log_block_size -> 1024
        buf[24..28].copy_from_slice(&0u32.to_le_bytes()); // log_cluster_size
        buf[28..32].copy_from_slice(&8192u32.to_le_bytes()); // blocks_per_group
        buf[40..44].copy_from_slice(&8192u32.to_le_bytes()); // inodes_per_group
        buf[56..58].copy_from_slice(&SUPERBLOCK_MAGIC.to_le_bytes());
        buf[84..88].copy_from_slice(&11u32.to_le_bytes()); // first_ino
        buf[88..90].copy_from_slice(&128u16.to_le_bytes()); // inode_size
        buf
    }

    #[test]
    fn decodes_basic_fields() {
        let sb = Superblock::decode(&sample_superblock_bytes()).unwrap();
        assert_eq!(sb.magic, SUPERBLOCK_MAGIC);
        assert_eq!(sb.block_size, 1024);
        assert_eq!(sb.blocks_count, 10240);
        assert_eq!(sb.first_ino, 11);
        assert_eq!(sb.inode_size, 128);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_superblock_bytes();
        bytes[56..58].copy_from_slice(&0u16.to_le_bytes());
        assert!(Superblock::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Superblock::decode(&[0u8; 10]).is_err());
    }
}
