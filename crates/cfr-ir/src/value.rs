//! Typed values.

use std::fmt;

use cfr_mem::{MemoryImage, SegmentId};

use crate::arch::Reg;

/// Value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Bool,
    /// Fixed-width bitvector (1..=64 bits).
    Bv(u16),
}

impl Type {
    /// Bitvector width, if this is a bitvector.
    pub const fn width(self) -> Option<u16> {
        match self {
            Self::Bv(w) => Some(w),
            Self::Bool => None,
        }
    }

    pub const fn is_bool(self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Check that a bitvector width lies in 1..=64.
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Bool => true,
            Self::Bv(w) => w >= 1 && w <= 64,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Bv(w) => write!(f, "bv{w}"),
        }
    }
}

/// All-ones mask for a bitvector width.
pub const fn mask(width: u16) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Interpret the low `width` bits of `value` as a signed integer.
pub const fn to_signed(value: u64, width: u16) -> i64 {
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value as i64;
    }
    let shift = 64 - width as u32;
    ((value << shift) as i64) >> shift
}

/// Identifier of an assignment, unique within one discovery unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignId(pub u64);

impl fmt::Display for AssignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Monotonic source of fresh [`AssignId`]s, owned by one discovery unit.
#[derive(Debug, Default)]
pub struct AssignIdSource {
    next: u64,
}

impl AssignIdSource {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next identifier.
    pub const fn fresh(&mut self) -> AssignId {
        let id = AssignId(self.next);
        self.next += 1;
        id
    }

    /// Number of identifiers handed out so far.
    pub const fn issued(&self) -> u64 {
        self.next
    }
}

/// An immutable typed value. Identity is structural.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Boolean literal.
    Bool(bool),
    /// Bitvector literal; `value` is always masked to `width`.
    Bv { width: u16, value: u64 },
    /// Address relative to the start of a memory segment.
    Reloc {
        segment: SegmentId,
        offset: u64,
        width: u16,
    },
    /// Symbolic value of a register at function entry.
    Initial { reg: Reg, ty: Type },
    /// Sentinel return address seeded at function entry.
    ReturnAddr { width: u16 },
    /// Value clobbered by an operation with unknown effect (e.g. a call).
    Undef { ty: Type },
    /// Result of a prior assignment.
    Assign { id: AssignId, ty: Type },
}

impl Value {
    /// Boolean literal.
    pub const fn bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// Bitvector literal, masked to `width`.
    pub const fn bv(width: u16, value: u64) -> Self {
        Self::Bv {
            width,
            value: value & mask(width),
        }
    }

    /// Type of this value.
    pub const fn ty(&self) -> Type {
        match self {
            Self::Bool(_) => Type::Bool,
            Self::Bv { width, .. } | Self::Reloc { width, .. } | Self::ReturnAddr { width } => {
                Type::Bv(*width)
            }
            Self::Initial { ty, .. } | Self::Undef { ty } | Self::Assign { ty, .. } => *ty,
        }
    }

    /// Bitvector literal contents.
    pub const fn as_bv(&self) -> Option<u64> {
        match self {
            Self::Bv { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Boolean literal contents.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Assignment this value refers to.
    pub const fn as_assign(&self) -> Option<AssignId> {
        match self {
            Self::Assign { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Check if value is a literal constant.
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Bv { .. })
    }

    /// Check if value is the bitvector literal zero.
    pub const fn is_zero(&self) -> bool {
        matches!(self, Self::Bv { value: 0, .. })
    }

    /// Check if value is the bitvector literal one.
    pub const fn is_one(&self) -> bool {
        matches!(self, Self::Bv { value: 1, .. })
    }

    /// Check if value is an all-ones bitvector literal.
    pub const fn is_all_ones(&self) -> bool {
        match self {
            Self::Bv { width, value } => *value == mask(*width),
            _ => false,
        }
    }

    /// Concrete address of a literal or segment-relative value.
    pub fn resolve_address(&self, mem: &MemoryImage) -> Option<u64> {
        match self {
            Self::Bv { value, .. } => Some(*value),
            Self::Reloc {
                segment,
                offset,
                width,
            } => {
                let base = mem.segment(*segment)?.base;
                Some(base.wrapping_add(*offset) & mask(*width))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bv { width, value } => write!(f, "0x{value:x}:bv{width}"),
            Self::Reloc {
                segment, offset, ..
            } => write!(f, "seg{}+0x{offset:x}", segment.0),
            Self::Initial { reg, .. } => write!(f, "init{reg}"),
            Self::ReturnAddr { .. } => write!(f, "return_addr"),
            Self::Undef { ty } => write!(f, "undef:{ty}"),
            Self::Assign { id, .. } => write!(f, "{id}"),
        }
    }
}
