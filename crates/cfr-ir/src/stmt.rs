//! Statement IR.

use std::fmt;

use crate::expr::App;
use crate::value::{AssignId, Type, Value};

/// Architecture-specific value-producing primitive (e.g. a flag computation
/// the generic operator set cannot express).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchPrim {
    pub name: String,
    pub args: Vec<Value>,
    pub ty: Type,
    /// Pure primitives are deduplicated within a block.
    pub pure: bool,
}

impl ArchPrim {
    /// A primitive without side effects.
    pub fn pure(name: &str, args: Vec<Value>, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            args,
            ty,
            pure: true,
        }
    }

    /// A primitive with unknown effects; every use is emitted.
    pub fn effectful(name: &str, args: Vec<Value>, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            args,
            ty,
            pure: false,
        }
    }
}

/// Architecture-specific statement with no result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchStmt {
    pub name: String,
    pub args: Vec<Value>,
}

impl ArchStmt {
    pub fn new(name: &str, args: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// Right-hand side of an assignment. Also the memoization key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssignRhs {
    App(App<Value>),
    ReadMem { addr: Value, bytes: u8 },
    Prim(ArchPrim),
}

impl AssignRhs {
    /// Values read by this right-hand side.
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Self::App(app) => app.operands(),
            Self::ReadMem { addr, .. } => vec![addr],
            Self::Prim(prim) => prim.args.iter().collect(),
        }
    }
}

impl fmt::Display for AssignRhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(app) => write!(f, "{app}"),
            Self::ReadMem { addr, bytes } => write!(f, "mem{}[{addr}]", u32::from(*bytes) * 8),
            Self::Prim(prim) => {
                write!(f, "{}(", prim.name)?;
                write_args(f, &prim.args)?;
                write!(f, ")")
            }
        }
    }
}

/// `id := rhs` with result type `ty`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub id: AssignId,
    pub rhs: AssignRhs,
    pub ty: Type,
}

impl Assignment {
    /// Value referring to this assignment's result.
    pub const fn value(&self) -> Value {
        Value::Assign {
            id: self.id,
            ty: self.ty,
        }
    }
}

/// Statement kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stmt {
    Assign(Assignment),
    WriteMem { addr: Value, value: Value },
    Arch(ArchStmt),
    /// Marks the start of a decoded instruction.
    InstructionStart { addr: u64, size: u8 },
    Comment(String),
}

impl Stmt {
    /// Check if this is an instruction-boundary or comment marker.
    pub const fn is_pseudo(&self) -> bool {
        matches!(self, Self::InstructionStart { .. } | Self::Comment(_))
    }

    /// Assignment defined by this statement.
    pub const fn as_assignment(&self) -> Option<&Assignment> {
        match self {
            Self::Assign(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign(a) => write!(f, "{} := {}", a.id, a.rhs),
            Self::WriteMem { addr, value } => write!(f, "mem[{addr}] := {value}"),
            Self::Arch(stmt) => {
                write!(f, "{}(", stmt.name)?;
                write_args(f, &stmt.args)?;
                write!(f, ")")
            }
            Self::InstructionStart { addr, size } => write!(f, "# 0x{addr:x} ({size} bytes)"),
            Self::Comment(text) => write!(f, "# {text}"),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    #[test]
    fn test_display() {
        let assign = Stmt::Assign(Assignment {
            id: AssignId(4),
            rhs: AssignRhs::App(App::Binary {
                op: BinaryOp::Add,
                left: Value::bv(32, 1),
                right: Value::bv(32, 2),
            }),
            ty: Type::Bv(32),
        });
        assert_eq!(assign.to_string(), "r4 := add(0x1:bv32, 0x2:bv32)");

        let read = AssignRhs::ReadMem {
            addr: Value::bv(32, 0x100),
            bytes: 4,
        };
        assert_eq!(read.to_string(), "mem32[0x100:bv32]");

        let marker = Stmt::InstructionStart {
            addr: 0x1000,
            size: 4,
        };
        assert_eq!(marker.to_string(), "# 0x1000 (4 bytes)");
        assert!(marker.is_pseudo());
    }

    #[test]
    fn test_prim_purity() {
        let p = ArchPrim::pure("parity", vec![Value::bv(8, 3)], Type::Bool);
        let q = ArchPrim::effectful("rdtsc", Vec::new(), Type::Bv(64));
        assert!(p.pure);
        assert!(!q.pure);
        assert_eq!(AssignRhs::Prim(p).operands().len(), 1);
    }
}
