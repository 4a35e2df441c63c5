//! Read-only memory image consulted during control-flow recovery.
//!
//! The image is a list of non-overlapping segments with permission flags.
//! It is never mutated after construction and is shared freely between
//! concurrently explored functions.

mod image;

pub use image::*;

use thiserror::Error;

/// Segment permission flags (same bit layout as ELF `p_flags`).
pub const PF_X: u32 = 0x1; // Execute
pub const PF_W: u32 = 0x2; // Write
pub const PF_R: u32 = 0x4; // Read

/// Memory image errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address 0x{0:x} is not mapped")]
    Unmapped(u64),
    #[error("read of {len} bytes at 0x{addr:x} crosses segment end")]
    CrossesSegment { addr: u64, len: usize },
    #[error("unsupported read width: {0} bytes")]
    UnsupportedWidth(usize),
    #[error("segment at 0x{0:x} overlaps an existing segment")]
    OverlappingSegments(u64),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
