//! Compile-time constant values.
//!
//! Folded constants carry one of four numeric representations: 32-bit signed,
//! 32-bit unsigned, 64-bit floating, or decimal. Which representation an
//! operation uses is governed by [`NumericUsage`] (a literal suffix, a `use`
//! pragma, or the natural-mode operand rule in `eval::fold`).

use crate::types::TypeId;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

pub use sable_ast::NumericUsage;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Uint(u32),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Str(String),
    Null,
    Undefined,
    /// A class binding's constant value: the type it materializes
    Type(TypeId),
}

impl Value {
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Int(_) => TypeId::INT,
            Value::Uint(_) => TypeId::UINT,
            Value::Double(_) => TypeId::DOUBLE,
            Value::Decimal(_) => TypeId::DECIMAL,
            Value::Bool(_) => TypeId::BOOLEAN,
            Value::Str(_) => TypeId::STRING,
            Value::Null => TypeId::NULL,
            Value::Undefined => TypeId::ANY,
            Value::Type(_) => TypeId::CLASS,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Uint(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    /// Numeric value viewed as a double (NaN for non-numerics)
    pub fn as_double(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Uint(u) => *u as f64,
            Value::Double(d) => *d,
            Value::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        }
    }

    /// Numeric value viewed as a 32-bit signed integer (ToInt32 semantics)
    pub fn as_int(&self) -> i32 {
        match self {
            Value::Int(i) => *i,
            Value::Uint(u) => *u as i32,
            Value::Double(d) => to_int32(*d),
            Value::Decimal(d) => d.to_i64().map(|v| v as i32).unwrap_or(0),
            _ => 0,
        }
    }

    /// Numeric value viewed as an unsigned 32-bit quantity, widened to i64
    /// so uint arithmetic can detect overflow before truncating
    pub fn as_uint_long(&self) -> i64 {
        match self {
            Value::Int(i) => *i as u32 as i64,
            Value::Uint(u) => *u as i64,
            Value::Double(d) => to_int32(*d) as u32 as i64,
            Value::Decimal(d) => d.to_i64().map(|v| v as u32 as i64).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        match self {
            Value::Int(i) => Decimal::from(*i),
            Value::Uint(u) => Decimal::from(*u),
            Value::Double(d) => Decimal::from_f64(*d).unwrap_or(Decimal::ZERO),
            Value::Decimal(d) => *d,
            _ => Decimal::ZERO,
        }
    }

    /// Truthiness as the language defines it, for logical folding
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Uint(u) => *u != 0,
            Value::Double(d) => *d != 0.0 && !d.is_nan(),
            Value::Decimal(d) => !d.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::Null | Value::Undefined => false,
            Value::Type(_) => true,
        }
    }

    /// Render as the language would for string concatenation
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Decimal(d) => d.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Type(_) => "[class]".to_string(),
        }
    }
}

/// ECMAScript ToInt32: modulo 2^32 with wraparound, NaN/Infinity to 0
pub fn to_int32(d: f64) -> i32 {
    if !d.is_finite() {
        return 0;
    }
    let m = d.trunc() as i64;
    m as i32
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if d == d.trunc() && d.abs() < 1e21 {
        format!("{}", d as i64)
    } else {
        format!("{d}")
    }
}

/// Parse a numeric literal's text under the given representation.
///
/// A suffix on the literal wins over the ambient usage; in natural mode an
/// unsuffixed integer literal lands in int when it fits, uint when only the
/// unsigned range fits, and double otherwise.
pub fn parse_number(text: &str, suffix: sable_ast::NumberSuffix, usage: NumericUsage) -> Value {
    use sable_ast::NumberSuffix;

    let effective = match suffix {
        NumberSuffix::Int => NumericUsage::Int,
        NumberSuffix::Uint => NumericUsage::Uint,
        NumberSuffix::Double => NumericUsage::Double,
        NumberSuffix::Decimal => NumericUsage::Decimal,
        NumberSuffix::None => usage,
    };

    match effective {
        NumericUsage::Int => Value::Int(to_int32(parse_double_text(text))),
        NumericUsage::Uint => Value::Uint(to_int32(parse_double_text(text)) as u32),
        NumericUsage::Double => Value::Double(parse_double_text(text)),
        NumericUsage::Decimal => {
            Value::Decimal(Decimal::from_str(text).unwrap_or_else(|_| {
                Decimal::from_f64(parse_double_text(text)).unwrap_or(Decimal::ZERO)
            }))
        }
        NumericUsage::Natural => {
            if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                return match u32::from_str_radix(hex, 16) {
                    Ok(u) if u <= i32::MAX as u32 => Value::Int(u as i32),
                    Ok(u) => Value::Uint(u),
                    Err(_) => Value::Double(f64::NAN),
                };
            }
            if text.contains(['.', 'e', 'E']) {
                return Value::Double(parse_double_text(text));
            }
            match text.parse::<i64>() {
                Ok(v) if v >= i32::MIN as i64 && v <= i32::MAX as i64 => Value::Int(v as i32),
                Ok(v) if v >= 0 && v <= u32::MAX as i64 => Value::Uint(v as u32),
                Ok(v) => Value::Double(v as f64),
                Err(_) => Value::Double(parse_double_text(text)),
            }
        }
    }
}

fn parse_double_text(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}
