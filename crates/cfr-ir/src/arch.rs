//! Architecture descriptor.
//!
//! A runtime value describing address width, byte order and the register
//! file. Everything width- or register-dependent in the IR consults it
//! instead of being parameterized over a marker type.

use std::fmt;

use cfr_mem::Endianness;

use crate::value::{Type, Value};

/// Register index into [`ArchDescriptor::registers`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u16);

impl Reg {
    /// Index as `usize`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Name and type of one register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegInfo {
    pub name: &'static str,
    pub ty: Type,
}

impl RegInfo {
    /// A bitvector register.
    ///
    /// # Panics
    ///
    /// Panics if `width` is outside 1..=64.
    pub const fn bv(name: &'static str, width: u16) -> Self {
        assert!(Type::Bv(width).is_valid(), "register width out of range");
        Self {
            name,
            ty: Type::Bv(width),
        }
    }

    /// A single-bit flag register.
    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            ty: Type::Bool,
        }
    }
}

/// Fixed description of one target architecture configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchDescriptor {
    /// Short architecture name ("x86_64", "arm", ...).
    pub name: &'static str,
    /// Address width in bits.
    pub addr_width: u16,
    /// Byte order of memory accesses.
    pub endianness: Endianness,
    /// Register file.
    pub registers: Vec<RegInfo>,
    /// Instruction pointer.
    pub ip: Reg,
    /// Stack pointer.
    pub sp: Reg,
    /// Register holding the return address on entry, if any.
    pub link_reg: Option<Reg>,
    /// Hard-wired zero register, if any.
    pub zero_reg: Option<Reg>,
    /// Registers preserved across calls.
    pub callee_saved: Vec<Reg>,
    /// Stack pointer adjustment observed by the caller after a call returns.
    pub call_stack_adjust: i64,
}

impl ArchDescriptor {
    /// Type of an address.
    pub const fn addr_type(&self) -> Type {
        Type::Bv(self.addr_width)
    }

    /// Bytes per address.
    pub const fn addr_bytes(&self) -> u8 {
        (self.addr_width / 8) as u8
    }

    /// Number of registers.
    pub fn num_regs(&self) -> usize {
        self.registers.len()
    }

    /// Iterate over all registers.
    pub fn regs(&self) -> impl Iterator<Item = Reg> + '_ {
        (0..self.registers.len()).map(|i| Reg(u16::try_from(i).unwrap_or(u16::MAX)))
    }

    /// Type of a register.
    pub fn reg_type(&self, reg: Reg) -> Option<Type> {
        self.registers.get(reg.index()).map(|info| info.ty)
    }

    /// Name of a register ("?" when out of range).
    pub fn reg_name(&self, reg: Reg) -> &'static str {
        self.registers.get(reg.index()).map_or("?", |info| info.name)
    }

    /// Look up a register by name.
    pub fn reg_by_name(&self, name: &str) -> Option<Reg> {
        self.registers
            .iter()
            .position(|info| info.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(Reg)
    }

    /// Check if register is preserved across calls.
    pub fn is_callee_saved(&self, reg: Reg) -> bool {
        self.callee_saved.contains(&reg)
    }

    /// Literal address value.
    pub const fn addr(&self, addr: u64) -> Value {
        Value::bv(self.addr_width, addr)
    }

    /// The sentinel return address value.
    pub const fn return_addr(&self) -> Value {
        Value::ReturnAddr {
            width: self.addr_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> ArchDescriptor {
        ArchDescriptor {
            name: "toy",
            addr_width: 32,
            endianness: Endianness::Little,
            registers: vec![
                RegInfo::bv("pc", 32),
                RegInfo::bv("sp", 32),
                RegInfo::flag("z"),
            ],
            ip: Reg(0),
            sp: Reg(1),
            link_reg: None,
            zero_reg: None,
            callee_saved: vec![Reg(1)],
            call_stack_adjust: 0,
        }
    }

    #[test]
    fn test_descriptor_lookups() {
        let arch = toy();
        assert_eq!(arch.num_regs(), 3);
        assert_eq!(arch.reg_by_name("sp"), Some(Reg(1)));
        assert_eq!(arch.reg_by_name("lr"), None);
        assert_eq!(arch.reg_type(Reg(2)), Some(Type::Bool));
        assert_eq!(arch.reg_type(Reg(9)), None);
        assert_eq!(arch.reg_name(Reg(9)), "?");
        assert_eq!(arch.addr_bytes(), 4);
        assert!(arch.is_callee_saved(Reg(1)));
    }

    #[test]
    fn test_addr_masks_to_width() {
        let arch = toy();
        assert_eq!(arch.addr(0x1_0000_0004), Value::bv(32, 4));
        assert_eq!(arch.return_addr().ty(), Type::Bv(32));
    }

    #[test]
    #[should_panic(expected = "register width out of range")]
    fn test_wide_register_rejected() {
        let _ = RegInfo::bv("q0", 128);
    }
}
