//! Single-level constant folding.
//!
//! [`fold`] assumes its operands are already folded; the generator folds
//! bottom-up before calling it on the root. Every rule is exact under
//! fixed-width wraparound arithmetic. Anything not covered returns `None`.

use crate::expr::{App, BinaryOp, ExtOp, TernaryOp, UnaryOp};
use crate::value::{Type, Value, mask, to_signed};

/// Simplify an operator applied to already-folded operands.
pub fn fold(app: &App<Value>) -> Option<Value> {
    match app {
        App::Unary { op, arg } => fold_unary(*op, arg),
        App::Binary { op, left, right } => fold_binary(*op, left, right),
        App::Ext { op, arg, width } => fold_ext(*op, arg, *width),
        App::Ternary {
            op: TernaryOp::Select,
            first,
            second,
            third,
        } => {
            if let Some(c) = first.as_bool() {
                Some(if c { second.clone() } else { third.clone() })
            } else if second == third && !matches!(second, Value::Undef { .. }) {
                Some(second.clone())
            } else {
                None
            }
        }
    }
}

fn fold_unary(op: UnaryOp, arg: &Value) -> Option<Value> {
    match (op, arg) {
        (UnaryOp::Not, Value::Bv { width, value }) => Some(Value::bv(*width, !value)),
        (UnaryOp::Neg, Value::Bv { width, value }) => Some(Value::bv(*width, value.wrapping_neg())),
        (UnaryOp::BoolNot, Value::Bool(b)) => Some(Value::Bool(!b)),
        _ => None,
    }
}

fn fold_ext(op: ExtOp, arg: &Value, width: u16) -> Option<Value> {
    if arg.ty() == Type::Bv(width) {
        return Some(arg.clone());
    }
    let Value::Bv {
        width: from,
        value,
    } = arg
    else {
        return None;
    };
    Some(match op {
        ExtOp::Trunc | ExtOp::Uext => Value::bv(width, *value),
        ExtOp::Sext => Value::bv(width, to_signed(*value, *from) as u64),
    })
}

fn fold_binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Bv { width, value: a }, Value::Bv { value: b, .. }) => {
            eval_bv(op, *width, *a, *b)
        }
        (Value::Bool(a), Value::Bool(b)) => eval_bool(op, *a, *b),
        _ => simplify(op, left, right),
    }
}

fn eval_bv(op: BinaryOp, width: u16, a: u64, b: u64) -> Option<Value> {
    if !Type::Bv(width).is_valid() {
        return None;
    }
    let bv = |v: u64| Some(Value::bv(width, v));
    let sa = to_signed(a, width);
    let sb = to_signed(b, width);
    match op {
        BinaryOp::Add => bv(a.wrapping_add(b)),
        BinaryOp::Sub => bv(a.wrapping_sub(b)),
        BinaryOp::Mul => bv(a.wrapping_mul(b)),
        BinaryOp::And => bv(a & b),
        BinaryOp::Or => bv(a | b),
        BinaryOp::Xor => bv(a ^ b),
        BinaryOp::Shl => bv(if b >= u64::from(width) { 0 } else { a << b }),
        BinaryOp::Lshr => bv(if b >= u64::from(width) { 0 } else { a >> b }),
        BinaryOp::Ashr => {
            let shift = b.min(u64::from(width) - 1);
            bv((sa >> shift) as u64)
        }
        BinaryOp::Eq => Some(Value::Bool(a == b)),
        BinaryOp::Ne => Some(Value::Bool(a != b)),
        BinaryOp::Ult => Some(Value::Bool(a < b)),
        BinaryOp::Ule => Some(Value::Bool(a <= b)),
        BinaryOp::Slt => Some(Value::Bool(sa < sb)),
        BinaryOp::Sle => Some(Value::Bool(sa <= sb)),
        BinaryOp::BoolAnd | BinaryOp::BoolOr | BinaryOp::BoolXor => None,
    }
}

const fn eval_bool(op: BinaryOp, a: bool, b: bool) -> Option<Value> {
    match op {
        BinaryOp::BoolAnd => Some(Value::Bool(a && b)),
        BinaryOp::BoolOr => Some(Value::Bool(a || b)),
        BinaryOp::BoolXor | BinaryOp::Ne => Some(Value::Bool(a != b)),
        BinaryOp::Eq => Some(Value::Bool(a == b)),
        _ => None,
    }
}

/// Identities with at most one literal operand.
fn simplify(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    // Two clobbered values need not be equal
    let same = left == right && !matches!(left, Value::Undef { .. });
    let width = left.ty().width().unwrap_or(0);
    let zero = || Value::bv(width, 0);
    match op {
        BinaryOp::And => {
            if same || right.is_all_ones() {
                Some(left.clone())
            } else if left.is_all_ones() {
                Some(right.clone())
            } else if left.is_zero() || right.is_zero() {
                Some(zero())
            } else {
                None
            }
        }
        BinaryOp::Or => {
            if same || right.is_zero() {
                Some(left.clone())
            } else if left.is_zero() {
                Some(right.clone())
            } else if left.is_all_ones() {
                Some(left.clone())
            } else if right.is_all_ones() {
                Some(right.clone())
            } else {
                None
            }
        }
        BinaryOp::Xor => {
            if same {
                Some(zero())
            } else if right.is_zero() {
                Some(left.clone())
            } else if left.is_zero() {
                Some(right.clone())
            } else {
                None
            }
        }
        BinaryOp::Add => {
            if right.is_zero() {
                Some(left.clone())
            } else if left.is_zero() {
                Some(right.clone())
            } else {
                offset_reloc(left, right, false).or_else(|| offset_reloc(right, left, false))
            }
        }
        BinaryOp::Sub => {
            if same {
                Some(zero())
            } else if right.is_zero() {
                Some(left.clone())
            } else {
                offset_reloc(left, right, true)
            }
        }
        BinaryOp::Mul => {
            if right.is_one() {
                Some(left.clone())
            } else if left.is_one() {
                Some(right.clone())
            } else if left.is_zero() || right.is_zero() {
                Some(zero())
            } else {
                None
            }
        }
        BinaryOp::Shl | BinaryOp::Lshr | BinaryOp::Ashr => {
            if right.is_zero() {
                Some(left.clone())
            } else if left.is_zero() {
                Some(zero())
            } else {
                None
            }
        }
        BinaryOp::Eq | BinaryOp::Ule | BinaryOp::Sle if same => Some(Value::Bool(true)),
        BinaryOp::Ne | BinaryOp::Ult | BinaryOp::Slt if same => Some(Value::Bool(false)),
        // Nothing is unsigned-below zero, and zero is unsigned-below-or-equal everything
        BinaryOp::Ult if right.is_zero() => Some(Value::Bool(false)),
        BinaryOp::Ule if left.is_zero() => Some(Value::Bool(true)),
        BinaryOp::BoolAnd => match (left.as_bool(), right.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
            (Some(true), _) => Some(right.clone()),
            (_, Some(true)) => Some(left.clone()),
            _ if same => Some(left.clone()),
            _ => None,
        },
        BinaryOp::BoolOr => match (left.as_bool(), right.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
            (Some(false), _) => Some(right.clone()),
            (_, Some(false)) => Some(left.clone()),
            _ if same => Some(left.clone()),
            _ => None,
        },
        BinaryOp::BoolXor => match (left.as_bool(), right.as_bool()) {
            _ if same => Some(Value::Bool(false)),
            (Some(false), _) => Some(right.clone()),
            (_, Some(false)) => Some(left.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Segment-relative address plus or minus a literal stays segment-relative.
fn offset_reloc(base: &Value, delta: &Value, subtract: bool) -> Option<Value> {
    let Value::Reloc {
        segment,
        offset,
        width,
    } = base
    else {
        return None;
    };
    let d = delta.as_bv()?;
    let offset = if subtract {
        offset.wrapping_sub(d)
    } else {
        offset.wrapping_add(d)
    };
    Some(Value::Reloc {
        segment: *segment,
        offset: offset & mask(*width),
        width: *width,
    })
}
