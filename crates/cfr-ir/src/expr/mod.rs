//! Expression IR.
//!
//! [`App`] is an operator applied to operands of type `T`. With `T = Expr`
//! it forms expression trees handed to the generator; with `T = Value` it is
//! the right-hand side of an emitted assignment and the key of the
//! memoization table.

use std::fmt;

use crate::Violation;
use crate::value::{Type, Value};

/// Unary operations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum UnaryOp {
    /// Bitwise complement.
    Not,
    /// Two's complement negation.
    Neg,
    /// Boolean negation.
    BoolNot,
}

/// Binary operations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
    Eq,
    Ne,
    Ult,
    Ule,
    Slt,
    Sle,
    BoolAnd,
    BoolOr,
    BoolXor,
}

impl BinaryOp {
    /// Operators producing a boolean from two operands of equal type.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Ult | Self::Ule | Self::Slt | Self::Sle
        )
    }

    /// Operators over booleans.
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::BoolAnd | Self::BoolOr | Self::BoolXor)
    }
}

/// Width-changing operations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ExtOp {
    Trunc,
    Uext,
    Sext,
}

/// Ternary operations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum TernaryOp {
    /// `first ? second : third`
    Select,
}

/// Operator application.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum App<T> {
    Unary {
        op: UnaryOp,
        arg: T,
    },
    Binary {
        op: BinaryOp,
        left: T,
        right: T,
    },
    Ext {
        op: ExtOp,
        arg: T,
        width: u16,
    },
    Ternary {
        op: TernaryOp,
        first: T,
        second: T,
        third: T,
    },
}

impl<T> App<T> {
    /// Operator name for diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unary { op, .. } => match op {
                UnaryOp::Not => "not",
                UnaryOp::Neg => "neg",
                UnaryOp::BoolNot => "bool_not",
            },
            Self::Binary { op, .. } => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Xor => "xor",
                BinaryOp::Shl => "shl",
                BinaryOp::Lshr => "lshr",
                BinaryOp::Ashr => "ashr",
                BinaryOp::Eq => "eq",
                BinaryOp::Ne => "ne",
                BinaryOp::Ult => "ult",
                BinaryOp::Ule => "ule",
                BinaryOp::Slt => "slt",
                BinaryOp::Sle => "sle",
                BinaryOp::BoolAnd => "bool_and",
                BinaryOp::BoolOr => "bool_or",
                BinaryOp::BoolXor => "bool_xor",
            },
            Self::Ext { op, .. } => match op {
                ExtOp::Trunc => "trunc",
                ExtOp::Uext => "uext",
                ExtOp::Sext => "sext",
            },
            Self::Ternary {
                op: TernaryOp::Select,
                ..
            } => "select",
        }
    }

    /// Operands in order.
    pub fn operands(&self) -> Vec<&T> {
        match self {
            Self::Unary { arg, .. } | Self::Ext { arg, .. } => vec![arg],
            Self::Binary { left, right, .. } => vec![left, right],
            Self::Ternary {
                first,
                second,
                third,
                ..
            } => vec![first, second, third],
        }
    }

    /// Transform every operand, left to right, stopping at the first error.
    pub fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<App<U>, E> {
        Ok(match self {
            Self::Unary { op, arg } => App::Unary { op, arg: f(arg)? },
            Self::Binary { op, left, right } => {
                let left = f(left)?;
                let right = f(right)?;
                App::Binary { op, left, right }
            }
            Self::Ext { op, arg, width } => App::Ext {
                op,
                arg: f(arg)?,
                width,
            },
            Self::Ternary {
                op,
                first,
                second,
                third,
            } => {
                let first = f(first)?;
                let second = f(second)?;
                let third = f(third)?;
                App::Ternary {
                    op,
                    first,
                    second,
                    third,
                }
            }
        })
    }

    /// Check operand types and compute the result type.
    pub fn result_type(&self, type_of: impl Fn(&T) -> Type) -> Result<Type, Violation> {
        let ill = |detail: String| Violation::IllTyped {
            op: self.name(),
            detail,
        };
        let bad = self.operands().into_iter().map(&type_of).find(|t| !t.is_valid());
        if let Some(bad) = bad {
            return Err(ill(format!("operand type {bad} out of range")));
        }
        match self {
            Self::Unary { op, arg } => {
                let ty = type_of(arg);
                match (op, ty) {
                    (UnaryOp::BoolNot, Type::Bool) | (UnaryOp::Not | UnaryOp::Neg, Type::Bv(_)) => {
                        Ok(ty)
                    }
                    _ => Err(ill(format!("operand has type {ty}"))),
                }
            }
            Self::Binary { op, left, right } => {
                let (l, r) = (type_of(left), type_of(right));
                if l != r {
                    return Err(ill(format!("operand types differ: {l} vs {r}")));
                }
                match (op, l) {
                    (BinaryOp::Eq | BinaryOp::Ne, _) => Ok(Type::Bool),
                    (op, Type::Bool) if op.is_boolean() => Ok(Type::Bool),
                    (op, Type::Bv(_)) if op.is_comparison() => Ok(Type::Bool),
                    (op, Type::Bv(_)) if !op.is_boolean() => Ok(l),
                    _ => Err(ill(format!("operands have type {l}"))),
                }
            }
            Self::Ext { op, arg, width } => {
                let ty = type_of(arg);
                let Type::Bv(from) = ty else {
                    return Err(ill(format!("operand has type {ty}")));
                };
                if !Type::Bv(*width).is_valid() {
                    return Err(ill(format!("target width {width} out of range")));
                }
                let ok = match op {
                    ExtOp::Trunc => *width <= from,
                    ExtOp::Uext | ExtOp::Sext => *width >= from,
                };
                if ok {
                    Ok(Type::Bv(*width))
                } else {
                    Err(ill(format!("cannot change bv{from} to bv{width}")))
                }
            }
            Self::Ternary {
                first,
                second,
                third,
                ..
            } => {
                let c = type_of(first);
                if c != Type::Bool {
                    return Err(ill(format!("condition has type {c}")));
                }
                let (t, f) = (type_of(second), type_of(third));
                if t == f {
                    Ok(t)
                } else {
                    Err(ill(format!("arm types differ: {t} vs {f}")))
                }
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for App<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ext { arg, width, .. } => write!(f, "{}({arg}, {width})", self.name()),
            _ => {
                write!(f, "{}(", self.name())?;
                for (i, operand) in self.operands().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Expression tree node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Value(Value),
    App(Box<App<Self>>),
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::App(app) => write!(f, "{app}"),
        }
    }
}

// These are factory methods, not trait implementations
#[allow(clippy::should_implement_trait)]
impl Expr {
    /// Bitvector literal.
    #[must_use]
    pub const fn bv(width: u16, value: u64) -> Self {
        Self::Value(Value::bv(width, value))
    }

    /// Boolean literal.
    #[must_use]
    pub const fn bool(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }

    fn unary(op: UnaryOp, arg: Self) -> Self {
        Self::App(Box::new(App::Unary { op, arg }))
    }

    fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::App(Box::new(App::Binary { op, left, right }))
    }

    fn ext(op: ExtOp, arg: Self, width: u16) -> Self {
        Self::App(Box::new(App::Ext { op, arg, width }))
    }

    pub fn add(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    pub fn xor(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Xor, left, right)
    }

    pub fn shl(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Shl, left, right)
    }

    pub fn lshr(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Lshr, left, right)
    }

    pub fn ashr(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Ashr, left, right)
    }

    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn ne(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Ne, left, right)
    }

    pub fn ult(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Ult, left, right)
    }

    pub fn ule(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Ule, left, right)
    }

    pub fn slt(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Slt, left, right)
    }

    pub fn sle(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Sle, left, right)
    }

    pub fn bool_and(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::BoolAnd, left, right)
    }

    pub fn bool_or(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::BoolOr, left, right)
    }

    pub fn bool_xor(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::BoolXor, left, right)
    }

    pub fn not(val: Self) -> Self {
        Self::unary(UnaryOp::Not, val)
    }

    pub fn neg(val: Self) -> Self {
        Self::unary(UnaryOp::Neg, val)
    }

    pub fn bool_not(val: Self) -> Self {
        Self::unary(UnaryOp::BoolNot, val)
    }

    pub fn trunc(val: Self, width: u16) -> Self {
        Self::ext(ExtOp::Trunc, val, width)
    }

    pub fn uext(val: Self, width: u16) -> Self {
        Self::ext(ExtOp::Uext, val, width)
    }

    pub fn sext(val: Self, width: u16) -> Self {
        Self::ext(ExtOp::Sext, val, width)
    }

    /// Create a ternary select (cond ? then : else).
    pub fn select(cond: Self, then_val: Self, else_val: Self) -> Self {
        Self::App(Box::new(App::Ternary {
            op: TernaryOp::Select,
            first: cond,
            second: then_val,
            third: else_val,
        }))
    }
}
