//! Memory image with permissioned segments.

use crate::{MemoryError, PF_R, PF_W, PF_X, Result};

/// Byte order of multi-byte memory accesses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Index of a segment inside a [`MemoryImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u32);

/// A memory segment with a fixed base address and data.
///
/// The `data` field contains only the initialized bytes. The total size is
/// `size`; any bytes from `data.len()` to `size` read as zero.
#[derive(Clone, Debug)]
pub struct Segment {
    pub base: u64,
    pub size: u64,
    pub data: Vec<u8>,
    pub flags: u32,
}

impl Segment {
    /// Create a segment whose size equals its data length.
    pub fn new(base: u64, data: Vec<u8>, flags: u32) -> Self {
        Self {
            base,
            size: data.len() as u64,
            data,
            flags,
        }
    }

    /// End address (exclusive).
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Check if address is within this segment.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Check if segment is read-only (no write flag).
    pub const fn is_readonly(&self) -> bool {
        (self.flags & PF_W) == 0
    }

    /// Check if segment is executable.
    pub const fn is_executable(&self) -> bool {
        (self.flags & PF_X) != 0
    }

    /// Check if segment is readable.
    pub const fn is_readable(&self) -> bool {
        (self.flags & PF_R) != 0
    }
}

/// Read-only view of a program's memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryImage {
    endianness: Endianness,
    segments: Vec<Segment>,
}

impl MemoryImage {
    /// Create an empty image with the given byte order.
    pub const fn new(endianness: Endianness) -> Self {
        Self {
            endianness,
            segments: Vec::new(),
        }
    }

    /// Create an image holding a single executable segment (not an actual binary file).
    pub fn from_bytecode(bytecode: Vec<u8>, base: u64, endianness: Endianness) -> Self {
        Self {
            endianness,
            segments: vec![Segment::new(base, bytecode, PF_R | PF_X)],
        }
    }

    /// Add a segment, rejecting overlap with existing segments.
    pub fn add_segment(&mut self, segment: Segment) -> Result<SegmentId> {
        let start = segment.base;
        let end = segment.end();
        for existing in &self.segments {
            if !(end <= existing.base || existing.end() <= start) {
                return Err(MemoryError::OverlappingSegments(start));
            }
        }
        let id = SegmentId(u32::try_from(self.segments.len()).unwrap_or(u32::MAX));
        self.segments.push(segment);
        Ok(id)
    }

    /// Builder form of [`Self::add_segment`].
    pub fn with_segment(mut self, segment: Segment) -> Result<Self> {
        self.add_segment(segment)?;
        Ok(self)
    }

    /// Byte order used by [`Self::read_uint`].
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// All segments in insertion order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Get a segment by id.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0 as usize)
    }

    /// Find the segment containing `addr`.
    pub fn segment_containing(&self, addr: u64) -> Option<(SegmentId, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .find(|(_, seg)| seg.contains(addr))
            .map(|(i, seg)| (SegmentId(u32::try_from(i).unwrap_or(u32::MAX)), seg))
    }

    /// Resolve a segment-relative offset to an absolute address.
    pub fn resolve(&self, id: SegmentId, offset: u64) -> Option<u64> {
        let seg = self.segment(id)?;
        (offset < seg.size).then(|| seg.base + offset)
    }

    /// Check if `addr` lies in an executable segment.
    pub fn is_executable(&self, addr: u64) -> bool {
        self.segment_containing(addr)
            .is_some_and(|(_, seg)| seg.is_executable())
    }

    /// Check if `addr` lies in a read-only segment.
    pub fn is_readonly(&self, addr: u64) -> bool {
        self.segment_containing(addr)
            .is_some_and(|(_, seg)| seg.is_readonly())
    }

    /// Initialized bytes from `addr` to the end of its segment's data.
    pub fn bytes_from(&self, addr: u64) -> Result<&[u8]> {
        let (_, seg) = self
            .segment_containing(addr)
            .ok_or(MemoryError::Unmapped(addr))?;
        let offset = usize::try_from(addr - seg.base).map_err(|_| MemoryError::Unmapped(addr))?;
        Ok(seg.data.get(offset..).unwrap_or(&[]))
    }

    /// Read `len` bytes at `addr`. Bytes past the initialized data read as zero.
    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        let (_, seg) = self
            .segment_containing(addr)
            .ok_or(MemoryError::Unmapped(addr))?;
        if addr.saturating_add(len as u64) > seg.end() {
            return Err(MemoryError::CrossesSegment { addr, len });
        }
        let offset = usize::try_from(addr - seg.base).map_err(|_| MemoryError::Unmapped(addr))?;
        let mut out = vec![0u8; len];
        for (i, byte) in out.iter_mut().enumerate() {
            if let Some(b) = seg.data.get(offset + i) {
                *byte = *b;
            }
        }
        Ok(out)
    }

    /// Read an unsigned integer of 1, 2, 4 or 8 bytes in the image's byte order.
    pub fn read_uint(&self, addr: u64, width: usize) -> Result<u64> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(MemoryError::UnsupportedWidth(width));
        }
        let bytes = self.read(addr, width)?;
        let mut value = 0u64;
        match self.endianness {
            Endianness::Little => {
                for (i, b) in bytes.iter().enumerate() {
                    value |= u64::from(*b) << (i * 8);
                }
            }
            Endianness::Big => {
                for b in &bytes {
                    value = (value << 8) | u64::from(*b);
                }
            }
        }
        Ok(value)
    }

    /// Read a value that cannot change at runtime (read-only segment only).
    pub fn read_readonly(&self, addr: u64, width: usize) -> Option<u64> {
        if !self.is_readonly(addr) {
            return None;
        }
        self.read_uint(addr, width).ok()
    }
}
