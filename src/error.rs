//! The crate's unified error type.
//!
//! Generalizes the `io::Result<T>` the teacher tools propagate everywhere into an
//! enum that lets callers branch on failure kind instead of matching on message text.

use thiserror::Error;

/// Errors produced while decoding or traversing an ext4 image.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying byte-window read failed (out-of-range access, short file, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A magic mismatch, truncated record, or otherwise impossible on-disk layout.
    #[error("format error: {0}")]
    Format(String),

    /// A path segment or directory entry could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The image declares an incompat feature bit this crate cannot decode.
    #[error("unsupported feature bit: {0:#x}")]
    UnsupportedFeature(u32),

    /// A journal-resident predecessor inode failed to decode into something usable.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
