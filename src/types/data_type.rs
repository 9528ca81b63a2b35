//! SQL column types with conversion and comparison semantics
//!
//! Comparisons coerce both operands to the receiver before ordering,
//! so cross-type comparisons always follow the left operand's type.

use super::value::Value;
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The closed set of SQL column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Text,
    Bytea,
    Date,
    Timestamp,
    Tuple,
}

impl DataType {
    /// Check if this type is numeric (integer, float or decimal).
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_decimal()
    }

    /// Check if this type is an integer (signed or unsigned).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::I8
                | DataType::I16
                | DataType::I32
                | DataType::I64
                | DataType::U8
                | DataType::U16
                | DataType::U32
                | DataType::U64
        )
    }

    /// Check if this type carries a fractional part. Floats count as
    /// decimal for configuration coercion.
    pub fn is_decimal(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64 | DataType::Decimal)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Text)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Bool)
    }

    /// Compare two values under this type's ordering. Both operands are
    /// converted to this type first; null sorts before any other value.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        match (a.is_null(), b.is_null()) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => return Ok(Ordering::Less),
            (false, true) => return Ok(Ordering::Greater),
            _ => {}
        }

        let left = self.convert(a)?;
        let right = self.convert(b)?;
        Ok(left.natural_cmp(&right))
    }

    /// Convert a value to this type, or fail when no coercion exists.
    /// Null converts to null for every type.
    pub fn convert(&self, v: &Value) -> Result<Value> {
        if v.is_null() {
            return Ok(Value::Null);
        }

        match self {
            DataType::Null => Ok(Value::Null),
            DataType::Bool => match v {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                n if n.is_integer() => Ok(Value::Bool(n.to_i128()? != 0)),
                n if n.is_float() => Ok(Value::Bool(n.to_f64()? != 0.0)),
                Value::Str(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::Str(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                other => Err(convert_error(other, self)),
            },
            DataType::I8 => to_integer(v, self, |i| i8::try_from(i).ok().map(Value::I8)),
            DataType::I16 => to_integer(v, self, |i| i16::try_from(i).ok().map(Value::I16)),
            DataType::I32 => to_integer(v, self, |i| i32::try_from(i).ok().map(Value::I32)),
            DataType::I64 => to_integer(v, self, |i| i64::try_from(i).ok().map(Value::I64)),
            DataType::U8 => to_integer(v, self, |i| u8::try_from(i).ok().map(Value::U8)),
            DataType::U16 => to_integer(v, self, |i| u16::try_from(i).ok().map(Value::U16)),
            DataType::U32 => to_integer(v, self, |i| u32::try_from(i).ok().map(Value::U32)),
            DataType::U64 => to_integer(v, self, |i| u64::try_from(i).ok().map(Value::U64)),
            DataType::F32 => match v {
                Value::Str(s) => s
                    .parse::<f32>()
                    .map(Value::F32)
                    .map_err(|_| convert_error(v, self)),
                other => Ok(Value::F32(other.to_f64()? as f32)),
            },
            DataType::F64 => match v {
                Value::Str(s) => s
                    .parse::<f64>()
                    .map(Value::F64)
                    .map_err(|_| convert_error(v, self)),
                other => Ok(Value::F64(other.to_f64()?)),
            },
            DataType::Decimal => match v {
                Value::Str(s) => Decimal::from_str(s)
                    .map(Value::Decimal)
                    .map_err(|_| convert_error(v, self)),
                other => other.to_decimal().map(Value::Decimal),
            },
            DataType::Text => Ok(Value::Str(v.to_string())),
            DataType::Bytea => match v {
                Value::Bytea(b) => Ok(Value::Bytea(b.clone())),
                Value::Str(s) => Ok(Value::Bytea(s.clone().into_bytes())),
                other => Err(convert_error(other, self)),
            },
            DataType::Date => match v {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::Timestamp(t) => Ok(Value::Date(t.date())),
                Value::Str(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| convert_error(v, self)),
                other => Err(convert_error(other, self)),
            },
            DataType::Timestamp => match v {
                Value::Timestamp(t) => Ok(Value::Timestamp(*t)),
                Value::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(Value::Timestamp)
                    .ok_or_else(|| convert_error(v, self)),
                Value::Str(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map(Value::Timestamp)
                    .map_err(|_| convert_error(v, self)),
                other => Err(convert_error(other, self)),
            },
            DataType::Tuple => match v {
                Value::Tuple(values) => Ok(Value::Tuple(values.clone())),
                other => Err(convert_error(other, self)),
            },
        }
    }
}

fn to_integer(
    v: &Value,
    target: &DataType,
    narrow: impl Fn(i128) -> Option<Value>,
) -> Result<Value> {
    let wide = match v {
        Value::Str(s) => s
            .parse::<i128>()
            .map_err(|_| convert_error(v, target))?,
        n if n.is_float() => n.to_f64()? as i128,
        Value::Decimal(d) => d.trunc().mantissa(),
        other => other.to_i128()?,
    };
    narrow(wide).ok_or_else(|| convert_error(v, target))
}

fn convert_error(v: &Value, target: &DataType) -> Error {
    Error::InvalidValue(format!("cannot convert {v} to {target}"))
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::I8 => write!(f, "TINYINT"),
            DataType::I16 => write!(f, "SMALLINT"),
            DataType::I32 => write!(f, "INT"),
            DataType::I64 => write!(f, "BIGINT"),
            DataType::U8 => write!(f, "TINYINT UNSIGNED"),
            DataType::U16 => write!(f, "SMALLINT UNSIGNED"),
            DataType::U32 => write!(f, "INT UNSIGNED"),
            DataType::U64 => write!(f, "BIGINT UNSIGNED"),
            DataType::F32 => write!(f, "REAL"),
            DataType::F64 => write!(f, "DOUBLE PRECISION"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Text => write!(f, "VARCHAR"),
            DataType::Bytea => write!(f, "BYTEA"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Tuple => write!(f, "TUPLE"),
        }
    }
}
