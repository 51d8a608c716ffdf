//! Semantic field types and the column conversion table.
//!
//! Every mapped field declares a [`FieldType`]. When a row is materialized the
//! raw column value is passed through [`FieldType::coerce`], which widens or
//! narrows integers, parses decimals and falls back to text for anything the
//! table does not know.

use crate::error::TypeError;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Semantic type of a mapped entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    Boolean,

    // Fixed precision, carried as text
    Decimal,

    // Date/time types
    Date,
    Timestamp,

    /// Anything else is read as text.
    Text,
}

impl FieldType {
    /// Convert a raw column value into the canonical value for this type.
    ///
    /// NULL passes through unchanged for every type.
    #[allow(clippy::result_large_err)]
    pub fn coerce(&self, value: &Value) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.convert(value).inspect_err(|e| {
            tracing::trace!(
                target_type = ?self,
                expected = e.expected,
                actual = %e.actual,
                "Column value rejected by type table"
            );
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::result_large_err)]
    fn convert(&self, value: &Value) -> Result<Value, TypeError> {
        let mismatch = |expected: &'static str| TypeError {
            expected,
            actual: value.type_name().to_string(),
            column: None,
        };
        let out_of_range = |expected: &'static str, v: i64| TypeError {
            expected,
            actual: format!("value {} out of range", v),
            column: None,
        };

        match self {
            FieldType::TinyInt => {
                let v = value.as_i64().ok_or_else(|| mismatch("TINYINT"))?;
                i8::try_from(v)
                    .map(Value::TinyInt)
                    .map_err(|_| out_of_range("TINYINT", v))
            }
            FieldType::SmallInt => {
                let v = value.as_i64().ok_or_else(|| mismatch("SMALLINT"))?;
                i16::try_from(v)
                    .map(Value::SmallInt)
                    .map_err(|_| out_of_range("SMALLINT", v))
            }
            FieldType::Integer => {
                let v = value.as_i64().ok_or_else(|| mismatch("INTEGER"))?;
                i32::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| out_of_range("INTEGER", v))
            }
            FieldType::BigInt => value
                .as_i64()
                .map(Value::BigInt)
                .ok_or_else(|| mismatch("BIGINT")),
            FieldType::Real => value
                .as_f64()
                .map(|v| Value::Float(v as f32))
                .ok_or_else(|| mismatch("REAL")),
            FieldType::Double => value
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| mismatch("DOUBLE")),
            FieldType::Boolean => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| mismatch("BOOLEAN")),
            FieldType::Decimal => match value {
                Value::Decimal(s) | Value::Text(s) if is_decimal_literal(s.trim()) => {
                    Ok(Value::Decimal(s.trim().to_string()))
                }
                Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => value
                    .to_text()
                    .map(Value::Decimal)
                    .ok_or_else(|| mismatch("DECIMAL")),
                Value::Float(_) | Value::Double(_) => value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .and_then(|_| value.to_text())
                    .map(Value::Decimal)
                    .ok_or_else(|| mismatch("DECIMAL")),
                _ => Err(mismatch("DECIMAL")),
            },
            FieldType::Date => match value {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::Timestamp(ts) => {
                    let days = ts.div_euclid(MICROS_PER_DAY);
                    i32::try_from(days)
                        .map(Value::Date)
                        .map_err(|_| out_of_range("DATE", days))
                }
                _ => Err(mismatch("DATE")),
            },
            FieldType::Timestamp => match value {
                Value::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
                Value::Date(d) => Ok(Value::Timestamp(i64::from(*d) * MICROS_PER_DAY)),
                _ => Err(mismatch("TIMESTAMP")),
            },
            FieldType::Text => value
                .to_text()
                .map(Value::Text)
                .ok_or_else(|| mismatch("TEXT")),
        }
    }
}

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Plain decimal notation: optional sign, digits with at most one point,
/// optional exponent. Rejects `NaN` and the infinities.
fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = !(whole.is_empty() && fraction.is_empty()) && digits(whole) && digits(fraction);
    let exponent_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits(e)
    });
    mantissa_ok && exponent_ok
}

/// Calendar date stored as days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date(pub i32);

/// Point in time stored as microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

/// Fixed-precision decimal kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decimal(pub String);

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v.0)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v.0)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v.0)
    }
}

/// Trait for types that have a corresponding semantic field type.
pub trait TypeInfo {
    /// The field type for this Rust type.
    const FIELD_TYPE: FieldType;

    /// Whether this type is nullable by default.
    const NULLABLE: bool = false;
}

impl TypeInfo for i8 {
    const FIELD_TYPE: FieldType = FieldType::TinyInt;
}

impl TypeInfo for i16 {
    const FIELD_TYPE: FieldType = FieldType::SmallInt;
}

impl TypeInfo for i32 {
    const FIELD_TYPE: FieldType = FieldType::Integer;
}

impl TypeInfo for i64 {
    const FIELD_TYPE: FieldType = FieldType::BigInt;
}

impl TypeInfo for f32 {
    const FIELD_TYPE: FieldType = FieldType::Real;
}

impl TypeInfo for f64 {
    const FIELD_TYPE: FieldType = FieldType::Double;
}

impl TypeInfo for bool {
    const FIELD_TYPE: FieldType = FieldType::Boolean;
}

impl TypeInfo for String {
    const FIELD_TYPE: FieldType = FieldType::Text;
}

impl TypeInfo for Decimal {
    const FIELD_TYPE: FieldType = FieldType::Decimal;
}

impl TypeInfo for Date {
    const FIELD_TYPE: FieldType = FieldType::Date;
}

impl TypeInfo for Timestamp {
    const FIELD_TYPE: FieldType = FieldType::Timestamp;
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;
    const NULLABLE: bool = true;
}
