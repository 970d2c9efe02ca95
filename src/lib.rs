//! Read-only ext4 image browser and JBD2-backed undelete engine.
//!
//! Decodes an ext4 filesystem image's superblock, group descriptors, inodes,
//! extent trees, and directories, exposes a path-based lookup API over them,
//! and can replay the JBD2 journal to recover recently deleted files.

pub mod consts;
pub mod dir;
pub mod error;
pub mod extent;
pub mod fs;
pub mod group_desc;
pub mod handle;
pub mod inode;
pub mod journal;
pub mod path;
pub mod reader;
pub mod restore;
pub mod superblock;

pub use error::{Error, Result};
pub use fs::{Entry, FileSystem};
pub use handle::{DirHandle, FileHandle, Metadata, Owner};
pub use restore::{restore_deleted_files, Recovered};
