//! Byte-window reader (C1): read-only random access over an ext4 image.
//!
//! `mutils`' on-disk tools (`mkfs`, `fdisk`) open the device as a plain `File` and
//! seek+read for every structure. Here the access pattern is read-mostly and
//! random (extent trees, journal replay), so a memory map is the default backing;
//! a `Vec<u8>`-backed window is kept for synthetic images in tests.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A read-only, randomly-addressable byte window over an ext4 image.
///
/// Implementors must be safe to read from multiple threads concurrently, matching
/// the filesystem's single-writer/no-writer read model (see §5 Concurrency).
pub trait ByteWindow: Send + Sync {
    /// Total length of the backing image in bytes.
    fn len(&self) -> u64;

    /// Reads `length` bytes starting at `offset`. Short images yield `Error::Io`.
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(length as u64)
            .ok_or_else(|| Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)))?;
        if end > self.len() {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )));
        }
        Ok(self.read_unchecked(offset, length))
    }

    /// Reads `length` bytes starting at `offset` without bounds checking. Callers
    /// should go through `read` unless the range was already validated.
    fn read_unchecked(&self, offset: u64, length: usize) -> Vec<u8>;
}

impl dyn ByteWindow {
    /// Reads the `block_size`-byte block numbered `block_no`.
    pub fn read_block(&self, block_no: u64, block_size: u32) -> Result<Vec<u8>> {
        self.read(block_no * block_size as u64, block_size as usize)
    }

    /// Reads `count` consecutive blocks starting at `start_block`, one per element.
    pub fn read_blocks(&self, start_block: u64, count: u64, block_size: u32) -> Result<Vec<Vec<u8>>> {
        (0..count)
            .map(|i| self.read_block(start_block + i, block_size))
            .collect()
    }
}

/// Memory-mapped byte window, the default backing for a real on-disk image.
pub struct MmapWindow {
    map: Mmap,
}

impl MmapWindow {
    /// Opens `path` read-only and maps it into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // Safe in the sense `memmap2` defines: the caller must not rely on
        // external modification of the backing file being observed consistently.
        // This crate never writes, and the image is not expected to be mutated by
        // another process during a session.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl ByteWindow for MmapWindow {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_unchecked(&self, offset: u64, length: usize) -> Vec<u8> {
        let start = offset as usize;
        self.map[start..start + length].to_vec()
    }
}

/// In-memory byte window, used by the test suite to exercise the decoders against
/// synthetic images without touching the filesystem.
pub struct BufWindow {
    data: Vec<u8>,
}

impl BufWindow {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteWindow for BufWindow {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_unchecked(&self, offset: u64, length: usize) -> Vec<u8> {
        let start = offset as usize;
        self.data[start..start + length].to_vec()
    }
}
