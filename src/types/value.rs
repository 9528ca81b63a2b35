//! Dynamically typed SQL values
//!
//! A row is an ordered sequence of values. Nulls propagate through
//! arithmetic: any null operand yields a null result.

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A row of values produced by a plan node.
pub type Row = Vec<Value>;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Bytea(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value carries any integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Value::Decimal(_))
    }

    /// Widen any integer value to i128 for arithmetic and comparison.
    pub fn to_i128(&self) -> Result<i128> {
        match self {
            Value::I8(v) => Ok(*v as i128),
            Value::I16(v) => Ok(*v as i128),
            Value::I32(v) => Ok(*v as i128),
            Value::I64(v) => Ok(*v as i128),
            Value::U8(v) => Ok(*v as i128),
            Value::U16(v) => Ok(*v as i128),
            Value::U32(v) => Ok(*v as i128),
            Value::U64(v) => Ok(*v as i128),
            _ => Err(Error::InvalidValue(format!(
                "cannot use {self} as an integer"
            ))),
        }
    }

    /// Convert any numeric value to f64.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Value::F32(v) => Ok(*v as f64),
            Value::F64(v) => Ok(*v),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| Error::InvalidValue(format!("decimal {d} out of f64 range"))),
            other => other.to_i128().map(|i| i as f64),
        }
    }

    /// Convert any numeric value to a decimal.
    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::F32(v) => Decimal::from_f32(*v)
                .ok_or_else(|| Error::InvalidValue(format!("cannot represent {v} as decimal"))),
            Value::F64(v) => Decimal::from_f64(*v)
                .ok_or_else(|| Error::InvalidValue(format!("cannot represent {v} as decimal"))),
            other => Ok(Decimal::from_i128_with_scale(other.to_i128()?, 0)),
        }
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(Error::InvalidValue(format!("{self} is not a boolean"))),
        }
    }

    fn numeric_op(
        &self,
        other: &Value,
        op: &str,
        ints: impl Fn(i128, i128) -> Option<i128>,
        floats: impl Fn(f64, f64) -> Option<f64>,
        decimals: impl Fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if !self.is_numeric() || !other.is_numeric() {
            return Err(Error::InvalidValue(format!(
                "cannot apply {op} to {self} and {other}"
            )));
        }

        if matches!(self, Value::Decimal(_)) || matches!(other, Value::Decimal(_)) {
            let result = decimals(self.to_decimal()?, other.to_decimal()?)
                .ok_or_else(|| Error::InvalidValue(format!("decimal overflow in {op}")))?;
            Ok(Value::Decimal(result))
        } else if self.is_float() || other.is_float() {
            let result = floats(self.to_f64()?, other.to_f64()?)
                .ok_or_else(|| Error::InvalidValue(format!("invalid float operation {op}")))?;
            Ok(Value::F64(result))
        } else {
            let wide = ints(self.to_i128()?, other.to_i128()?)
                .ok_or_else(|| Error::InvalidValue(format!("integer overflow in {op}")))?;
            let narrow = i64::try_from(wide)
                .map_err(|_| Error::InvalidValue(format!("integer overflow in {op}")))?;
            Ok(Value::I64(narrow))
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        self.numeric_op(
            other,
            "+",
            |a, b| a.checked_add(b),
            |a, b| Some(a + b),
            |a, b| a.checked_add(b),
        )
    }

    pub fn subtract(&self, other: &Value) -> Result<Value> {
        self.numeric_op(
            other,
            "-",
            |a, b| a.checked_sub(b),
            |a, b| Some(a - b),
            |a, b| a.checked_sub(b),
        )
    }

    pub fn multiply(&self, other: &Value) -> Result<Value> {
        self.numeric_op(
            other,
            "*",
            |a, b| a.checked_mul(b),
            |a, b| Some(a * b),
            |a, b| a.checked_mul(b),
        )
    }

    pub fn divide(&self, other: &Value) -> Result<Value> {
        if other.is_numeric() && other.to_f64()? == 0.0 {
            return Err(Error::InvalidValue("division by zero".to_string()));
        }
        self.numeric_op(
            other,
            "/",
            |a, b| a.checked_div(b),
            |a, b| Some(a / b),
            |a, b| a.checked_div(b),
        )
    }

    pub fn remainder(&self, other: &Value) -> Result<Value> {
        if other.is_numeric() && other.to_f64()? == 0.0 {
            return Err(Error::InvalidValue("division by zero".to_string()));
        }
        self.numeric_op(
            other,
            "%",
            |a, b| a.checked_rem(b),
            |a, b| Some(a % b),
            |a, b| a.checked_rem(b),
        )
    }

    /// Total order between two values of the same kind. Null sorts first,
    /// mismatched kinds fall back to comparing canonical renderings.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (F32(a), F32(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (F64(a), F64(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Decimal(a), Decimal(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            (Bytea(a), Bytea(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Tuple(a), Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.natural_cmp(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) if a.is_integer() && b.is_integer() => match (a.to_i128(), b.to_i128()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            },
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytea(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{d}"),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Tuple(values) => {
                write!(f, "(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}
