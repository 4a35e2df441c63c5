//! Register state snapshots.

use crate::Violation;
use crate::arch::{ArchDescriptor, Reg};
use crate::value::{Type, Value};

/// Value of every register at one program point.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegState {
    regs: Vec<Value>,
}

impl RegState {
    /// Every register holds its symbolic entry value; a hard-wired zero
    /// register holds literal zero.
    pub fn symbolic(arch: &ArchDescriptor) -> Self {
        let regs = arch
            .regs()
            .zip(&arch.registers)
            .map(|(reg, info)| match (arch.zero_reg, info.ty) {
                (Some(z), Type::Bv(width)) if z == reg => Value::bv(width, 0),
                _ => Value::Initial { reg, ty: info.ty },
            })
            .collect();
        Self { regs }
    }

    /// Value held by a register.
    pub fn get(&self, reg: Reg) -> Option<&Value> {
        self.regs.get(reg.index())
    }

    /// Replace a register's value; the type must not change.
    pub fn set(&mut self, reg: Reg, value: Value) -> Result<(), Violation> {
        let slot = self
            .regs
            .get_mut(reg.index())
            .ok_or(Violation::UnknownRegister(reg))?;
        if slot.ty() != value.ty() {
            return Err(Violation::RegisterType {
                reg,
                expected: slot.ty(),
                actual: value.ty(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Iterate over `(register, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Reg, &Value)> {
        self.regs
            .iter()
            .enumerate()
            .map(|(i, v)| (Reg(u16::try_from(i).unwrap_or(u16::MAX)), v))
    }
}
