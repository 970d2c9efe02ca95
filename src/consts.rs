//! On-disk magic numbers, struct sizes, and feature/flag bit sets.
//!
//! See the official ext4 layout wiki page for the authoritative field list:
//! <https://ext4.wiki.kernel.org/index.php/Ext4_Disk_Layout>

use bitflags::bitflags;

/// Padding before block group 0's superblock.
pub const GROUP_0_PADDING: u64 = 1024;

/// Superblock magic number.
pub const SUPERBLOCK_MAGIC: u16 = 0xEF53;
/// Extent tree header magic number.
pub const EXTENT_MAGIC: u16 = 0xF30A;
/// JBD2 common block header magic number.
pub const JBD2_MAGIC: u32 = 0xC03B_3998;

/// On-disk size of the superblock.
pub const SUPERBLOCK_SIZE: usize = 1024;
/// On-disk size of a classic (32-bit) group descriptor.
pub const GROUP_DESC_32_SIZE: usize = 32;
/// On-disk size of a 64-bit group descriptor.
pub const GROUP_DESC_64_SIZE: usize = 64;
/// Size of the decoded inode window (fields beyond this are ignored).
pub const INODE_SIZE: usize = 156;
/// Size of an extent tree header.
pub const EXTENT_HEADER_SIZE: usize = 12;
/// Size of one extent tree record (leaf or branch).
pub const EXTENT_ENTRY_SIZE: usize = 12;
/// Size of a directory entry header, not including the name.
pub const DIR_ENTRY_HEADER_SIZE: usize = 8;
/// Size of a directory block's tail (checksum) record.
pub const DIR_ENTRY_TAIL_SIZE: usize = 12;
/// `file_type` value marking a directory block's tail record.
pub const DIR_ENTRY_TAIL_MAGIC: u8 = 0xDE;

/// Length of the leaf-vs-uninitialized boundary for extent leaves: lengths
/// above this are uninitialized extents, biased by this amount.
pub const EXTENT_UNINIT_BIAS: u16 = 32768;

/// The root directory's inode number.
pub const ROOT_INODE: u32 = 2;

/// File type as recorded in a directory entry or derived from inode mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown = 0x0,
    Regular = 0x1,
    Directory = 0x2,
    CharDev = 0x3,
    BlockDev = 0x4,
    Fifo = 0x5,
    Socket = 0x6,
    Symlink = 0x7,
}

impl FileType {
    pub fn from_raw(v: u8) -> Self {
        match v {
            0x1 => FileType::Regular,
            0x2 => FileType::Directory,
            0x3 => FileType::CharDev,
            0x4 => FileType::BlockDev,
            0x5 => FileType::Fifo,
            0x6 => FileType::Socket,
            0x7 => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }
}

bitflags! {
    /// Inode mode: file type bits (upper nibble) and rwx permission bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u16 {
        const S_IXOTH = 0x1;
        const S_IWOTH = 0x2;
        const S_IROTH = 0x4;
        const S_IXGRP = 0x8;
        const S_IWGRP = 0x10;
        const S_IRGRP = 0x20;
        const S_IXUSR = 0x40;
        const S_IWUSR = 0x80;
        const S_IRUSR = 0x100;
        const S_ISVTX = 0x200;
        const S_ISGID = 0x400;
        const S_ISUID = 0x800;

        const S_IFIFO = 0x1000;
        const S_IFCHR = 0x2000;
        const S_IFDIR = 0x4000;
        const S_IFBLK = 0x6000;
        const S_IFREG = 0x8000;
        const S_IFLNK = 0xA000;
        const S_IFSOCK = 0xC000;
    }
}

/// Mask isolating the file-type bits of a mode word.
pub const S_IFMT: u16 = 0xF000;

bitflags! {
    /// Inode flags (`inode.flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeFlags: u32 {
        const SECRM = 0x1;
        const UNRM = 0x2;
        const COMPR = 0x4;
        const SYNC = 0x8;
        const IMMUTABLE = 0x10;
        const APPEND = 0x20;
        const NODUMP = 0x40;
        const NOATIME = 0x80;
        const DIRTY = 0x100;
        const COMPRBLK = 0x200;
        const NOCOMPR = 0x400;
        const ENCRYPT = 0x800;
        const INDEX = 0x1000;
        const IMAGIC = 0x2000;
        const JOURNAL_DATA = 0x4000;
        const NOTAIL = 0x8000;
        const DIRSYNC = 0x10000;
        const TOPDIR = 0x20000;
        const HUGE_FILE = 0x40000;
        const EXTENTS = 0x80000;
        const EA_INODE = 0x200000;
        const EOFBLOCKS = 0x400000;
        const SNAPFILE = 0x0100_0000;
        const SNAPFILE_DELETED = 0x0400_0000;
        const SNAPFILE_SHRUNK = 0x0800_0000;
        const INLINE_DATA = 0x1000_0000;
        const RESERVED = 0x8000_0000;
    }
}

bitflags! {
    /// `feature_compat` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompatFeatures: u32 {
        const DIR_PREALLOC = 0x1;
        const IMAGIC_INODES = 0x2;
        const HAS_JOURNAL = 0x4;
        const EXT_ATTR = 0x8;
        const RESIZE_INODE = 0x10;
        const DIR_INDEX = 0x20;
        const LAZY_BG = 0x40;
        const EXCLUDE_INODE = 0x80;
        const EXCLUDE_BITMAP = 0x100;
        const SPARSE_SUPER2 = 0x200;
    }
}

bitflags! {
    /// `feature_incompat` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IncompatFeatures: u32 {
        const COMPRESSION = 0x1;
        const FILETYPE = 0x2;
        const RECOVER = 0x4;
        const JOURNAL_DEV = 0x8;
        const META_BG = 0x10;
        const EXTENTS = 0x40;
        const BIT64 = 0x80;
        const MMP = 0x100;
        const FLEX_BG = 0x200;
        const EA_INODE = 0x400;
        const DIRDATA = 0x1000;
        const BG_USE_META_CSUM = 0x2000;
        const LARGEDIR = 0x4000;
        const INLINE_DATA = 0x8000;
        const ENCRYPT = 0x10000;
    }
}

impl IncompatFeatures {
    /// Incompat bits this crate cannot safely decode (see §6 External Interfaces):
    /// encryption and meta_bg layouts.
    pub fn unsupported(self) -> Self {
        self & (Self::ENCRYPT | Self::META_BG)
    }
}

bitflags! {
    /// `feature_ro_compat` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RoCompatFeatures: u32 {
        const SPARSE_SUPER = 0x1;
        const LARGE_FILE = 0x2;
        const BTREE_DIR = 0x4;
        const HUGE_FILE = 0x8;
        const GDT_CSUM = 0x10;
        const DIR_NLINK = 0x20;
        const EXTRA_ISIZE = 0x40;
        const HAS_SNAPSHOT = 0x80;
        const QUOTA = 0x100;
        const BIGALLOC = 0x200;
        const METADATA_CSUM = 0x400;
        const REPLICA = 0x800;
        const READONLY = 0x1000;
    }
}

/// Bigalloc requires `RO_COMPAT_BIGALLOC`, not an incompat bit; checked separately
/// by `Superblock::check_supported`.
pub const RO_COMPAT_BIGALLOC_BIT: u32 = RoCompatFeatures::BIGALLOC.bits();

pub mod jbd2 {
    //! JBD2 journal constants (big-endian on disk).

    pub const MAGIC: u32 = super::JBD2_MAGIC;

    pub const HEADER_LEN: usize = 12;
    pub const SB_LEN: usize = 1024;
    pub const DESC_V2_LEN: usize = 8;
    pub const DESC_V3_LEN: usize = 16;
    pub const COMMIT_LEN: usize = 32;

    pub const FEATURE_INCOMPAT_64BIT: u32 = 0x2;
    pub const FEATURE_INCOMPAT_CSUM_V2: u32 = 0x8;
    pub const FEATURE_INCOMPAT_CSUM_V3: u32 = 0x10;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum BlockType {
        Descriptor,
        Commit,
        SuperblockV1,
        SuperblockV2,
        Revocation,
    }

    impl BlockType {
        pub fn from_raw(v: u32) -> Option<Self> {
            match v {
                1 => Some(BlockType::Descriptor),
                2 => Some(BlockType::Commit),
                3 => Some(BlockType::SuperblockV1),
                4 => Some(BlockType::SuperblockV2),
                5 => Some(BlockType::Revocation),
                _ => None,
            }
        }
    }

    pub const DESC_FLAG_ESCAPED: u8 = 0x1;
    pub const DESC_FLAG_UUID_OMITTED: u8 = 0x2;
    pub const DESC_FLAG_DATA_DELETED: u8 = 0x4;
    pub const DESC_FLAG_LAST_TAG: u8 = 0x8;
}
