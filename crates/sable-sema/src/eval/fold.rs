//! Compile-time folding of literal arithmetic.
//!
//! Binary arithmetic folds under one of four numeric representations. A
//! `use` pragma or literal suffix forces the representation; otherwise the
//! operand representations select it ("natural" mode), and natural-mode
//! results that leave the chosen representation's range fall back to double
//! rather than wrapping. Division and modulo by zero never trap: the integer
//! modes produce the IEEE double result (NaN, ±Infinity) instead.

use crate::value::{NumericUsage, Value, to_int32};
use rust_decimal::Decimal;
use sable_ast::{BinaryOp, UnaryOp};

/// Fold a binary operation over two constants. `None` means the operation
/// does not fold at compile time; the caller falls back to static typing.
pub(crate) fn fold_binary(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    usage: NumericUsage,
) -> Option<Value> {
    if op.is_arithmetic() {
        return fold_arithmetic(op, lhs, rhs, usage);
    }
    if op.is_bitwise() {
        return fold_bitwise(op, lhs, rhs);
    }
    if op.is_logical() {
        // logical operators yield an operand, not a boolean
        return Some(match op {
            BinaryOp::And => {
                if lhs.as_bool() {
                    rhs.clone()
                } else {
                    lhs.clone()
                }
            }
            BinaryOp::Or => {
                if lhs.as_bool() {
                    lhs.clone()
                } else {
                    rhs.clone()
                }
            }
            _ => unreachable!("non-logical operator in logical fold"),
        });
    }
    if op.is_equality() || op.is_relational() {
        return fold_comparison(op, lhs, rhs);
    }
    None
}

fn fold_arithmetic(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    usage: NumericUsage,
) -> Option<Value> {
    if !lhs.is_numeric() || !rhs.is_numeric() {
        // string concatenation is the one non-numeric arithmetic fold
        if op == BinaryOp::Add
            && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)))
        {
            let mut s = lhs.to_display_string();
            s.push_str(&rhs.to_display_string());
            return Some(Value::Str(s));
        }
        return None;
    }

    let mut force_type = true;
    let mut usage = usage;
    if usage == NumericUsage::Natural {
        // operand representations pick the result representation; results
        // that escape it fall back to double instead of wrapping
        force_type = false;
        usage = natural_usage(lhs, rhs);
    }

    match usage {
        NumericUsage::Decimal => Some(fold_decimal(op, lhs, rhs)),
        NumericUsage::Double => Some(Value::Double(double_op(
            op,
            lhs.as_double(),
            rhs.as_double(),
        ))),
        NumericUsage::Int => Some(fold_int(op, lhs, rhs, force_type)),
        NumericUsage::Uint => Some(fold_uint(op, lhs, rhs, force_type)),
        NumericUsage::Natural => unreachable!("natural usage already lowered"),
    }
}

/// Natural-mode representation selection: decimal wins, then double; an
/// int/uint mix folds unsigned only when the signed view of the deciding
/// operand is non-negative, otherwise double (the unsigned wrap would lie).
fn natural_usage(lhs: &Value, rhs: &Value) -> NumericUsage {
    if matches!(lhs, Value::Decimal(_)) || matches!(rhs, Value::Decimal(_)) {
        return NumericUsage::Decimal;
    }
    if matches!(lhs, Value::Double(_)) || matches!(rhs, Value::Double(_)) {
        return NumericUsage::Double;
    }
    if matches!(lhs, Value::Int(_)) || matches!(rhs, Value::Uint(_)) {
        return if lhs.as_int() >= 0 {
            NumericUsage::Uint
        } else {
            NumericUsage::Double
        };
    }
    if matches!(lhs, Value::Uint(_)) || matches!(rhs, Value::Int(_)) {
        return if rhs.as_int() >= 0 {
            NumericUsage::Uint
        } else {
            NumericUsage::Double
        };
    }
    NumericUsage::Int
}

fn double_op(op: BinaryOp, ld: f64, rd: f64) -> f64 {
    match op {
        BinaryOp::Add => ld + rd,
        BinaryOp::Sub => ld - rd,
        BinaryOp::Mul => ld * rd,
        BinaryOp::Div => ld / rd,
        BinaryOp::Rem => ld % rd,
        _ => unreachable!("non-arithmetic operator in arithmetic fold"),
    }
}

fn fold_decimal(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let ld = lhs.as_decimal();
    let rd = rhs.as_decimal();
    let d: Option<Decimal> = match op {
        BinaryOp::Add => ld.checked_add(rd),
        BinaryOp::Sub => ld.checked_sub(rd),
        BinaryOp::Mul => ld.checked_mul(rd),
        BinaryOp::Div => ld.checked_div(rd),
        BinaryOp::Rem => ld.checked_rem(rd),
        _ => unreachable!("non-arithmetic operator in arithmetic fold"),
    };
    match d {
        Some(d) => Value::Decimal(d),
        // decimal has no NaN or infinities; overflow and division by zero
        // surface as the double result
        None => Value::Double(double_op(op, lhs.as_double(), rhs.as_double())),
    }
}

fn fold_int(op: BinaryOp, lhs: &Value, rhs: &Value, force_type: bool) -> Value {
    let li = lhs.as_int();
    let ri = rhs.as_int();
    let ld = lhs.as_double();
    let rd = rhs.as_double();
    let (i, d) = match op {
        BinaryOp::Add => (li.wrapping_add(ri), ld + rd),
        BinaryOp::Sub => (li.wrapping_sub(ri), ld - rd),
        BinaryOp::Mul => (li.wrapping_mul(ri), ld * rd),
        BinaryOp::Div => {
            if ri == 0 {
                return Value::Double(ld / rd);
            }
            (li.wrapping_div(ri), ld / rd)
        }
        BinaryOp::Rem => {
            if ri == 0 {
                return Value::Double(f64::NAN);
            }
            (li.wrapping_rem(ri), ld % rd)
        }
        _ => unreachable!("non-arithmetic operator in arithmetic fold"),
    };
    if force_type || to_int32(d) == i {
        Value::Int(i)
    } else {
        Value::Double(d)
    }
}

fn fold_uint(op: BinaryOp, lhs: &Value, rhs: &Value, force_type: bool) -> Value {
    // operands widened to i64 so overflow is observable before truncation
    let ld = lhs.as_uint_long();
    let rd = rhs.as_uint_long();
    let d: i64 = match op {
        BinaryOp::Add => ld.wrapping_add(rd),
        BinaryOp::Sub => ld.wrapping_sub(rd),
        BinaryOp::Mul => ld.wrapping_mul(rd),
        BinaryOp::Div => {
            if rd == 0 {
                return Value::Double(if ld == 0 { f64::NAN } else { f64::INFINITY });
            }
            ld / rd
        }
        BinaryOp::Rem => {
            if rd == 0 {
                return Value::Double(f64::NAN);
            }
            ld % rd
        }
        _ => unreachable!("non-arithmetic operator in arithmetic fold"),
    };
    if force_type || (0..=0xFFFF_FFFF).contains(&d) {
        Value::Uint((d & 0xFFFF_FFFF) as u32)
    } else if op == BinaryOp::Mul {
        // out-of-range multiply may be i64 overflow; redo in double
        Value::Double(lhs.as_double() * rhs.as_double())
    } else {
        Value::Double(d as f64)
    }
}

fn fold_bitwise(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    if !lhs.is_numeric() || !rhs.is_numeric() {
        return None;
    }
    let li = lhs.as_int();
    let ri = rhs.as_int();
    Some(match op {
        BinaryOp::BitAnd => Value::Int(li & ri),
        BinaryOp::BitOr => Value::Int(li | ri),
        BinaryOp::BitXor => Value::Int(li ^ ri),
        BinaryOp::Shl => Value::Int(li << (ri & 31)),
        BinaryOp::Shr => Value::Int(li >> (ri & 31)),
        BinaryOp::UShr => Value::Uint((li as u32) >> (ri & 31)),
        _ => unreachable!("non-bitwise operator in bitwise fold"),
    })
}

fn fold_comparison(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    use std::cmp::Ordering;

    let ord: Option<Ordering> = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => {
            Some(Ordering::Equal)
        }
        (Value::Decimal(_), r) if r.is_numeric() => {
            Some(lhs.as_decimal().cmp(&rhs.as_decimal()))
        }
        (l, Value::Decimal(_)) if l.is_numeric() => {
            Some(lhs.as_decimal().cmp(&rhs.as_decimal()))
        }
        (l, r) if l.is_numeric() && r.is_numeric() => {
            lhs.as_double().partial_cmp(&rhs.as_double())
        }
        _ => return None,
    };

    Some(Value::Bool(match op {
        // NaN: no ordering, so every comparison is false except !=
        BinaryOp::Eq => ord == Some(Ordering::Equal),
        BinaryOp::Ne => ord != Some(Ordering::Equal),
        BinaryOp::Lt => ord == Some(Ordering::Less),
        BinaryOp::Gt => ord == Some(Ordering::Greater),
        BinaryOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        _ => unreachable!("non-comparison operator in comparison fold"),
    }))
}

/// Fold a unary operation over a constant
pub(crate) fn fold_unary(op: UnaryOp, v: &Value, usage: NumericUsage) -> Option<Value> {
    match op {
        UnaryOp::Not => Some(Value::Bool(!v.as_bool())),
        UnaryOp::BitNot => {
            if v.is_numeric() {
                Some(Value::Int(!v.as_int()))
            } else {
                None
            }
        }
        UnaryOp::Pos => {
            if v.is_numeric() {
                Some(v.clone())
            } else {
                None
            }
        }
        UnaryOp::Neg => {
            if !v.is_numeric() {
                return None;
            }
            Some(match (v, usage) {
                (Value::Decimal(d), _) => Value::Decimal(-d),
                (Value::Double(d), _) => Value::Double(-d),
                (Value::Int(i), NumericUsage::Int) => Value::Int(i.wrapping_neg()),
                (Value::Int(i), _) => {
                    if *i == i32::MIN {
                        Value::Double(-(*i as f64))
                    } else {
                        Value::Int(-i)
                    }
                }
                (Value::Uint(u), NumericUsage::Uint) => Value::Uint(u.wrapping_neg()),
                (Value::Uint(u), _) => {
                    if *u <= i32::MAX as u32 {
                        Value::Int(-(*u as i32))
                    } else {
                        Value::Double(-(*u as f64))
                    }
                }
                _ => unreachable!("non-numeric negation operand"),
            })
        }
    }
}
