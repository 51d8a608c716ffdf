//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::types::{Date, Decimal, Timestamp};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// This struct is wrapped in `Arc` so all rows from the same query share
/// the same column information.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Access to the columns of the current row of a result.
///
/// A missing column (`None`) is distinct from a NULL column
/// (`Some(&Value::Null)`).
pub trait RowSource {
    /// Fetch a column's raw value by storage name.
    fn column(&self, name: &str) -> Option<&Value>;

    /// Fetch and convert a column by storage name.
    #[allow(clippy::result_large_err)]
    fn get_named<T: FromValue>(&self, name: &str) -> Result<T>
    where
        Self: Sized,
    {
        convert_named(self.column(name), name)
    }
}

impl dyn RowSource + '_ {
    /// Fetch and convert a column by storage name.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        convert_named(self.column(name), name)
    }
}

#[allow(clippy::result_large_err)]
fn convert_named<T: FromValue>(value: Option<&Value>, name: &str) -> Result<T> {
    let value = value.ok_or_else(|| {
        Error::Type(TypeError {
            expected: std::any::type_name::<T>(),
            actual: format!("column '{}' not found", name),
            column: Some(name.to_string()),
        })
    })?;
    T::from_value(value).map_err(|e| match e {
        Error::Type(mut te) => {
            te.column = Some(name.to_string());
            Error::Type(te)
        }
        e => e,
    })
}

/// A single row returned from a database query.
///
/// Column metadata is shared via `Arc` for memory efficiency.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values in order
    values: Vec<Value>,
    /// Shared column metadata
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl RowSource for Row {
    fn column(&self, name: &str) -> Option<&Value> {
        self.get_by_name(name)
    }
}

impl RowSource for HashMap<String, Value> {
    fn column(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Self>;
}

fn type_error(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

fn range_error(expected: &'static str, v: i64) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("value {} out of range", v),
        column: None,
    })
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| type_error("bool", value))
    }
}

impl FromValue for i8 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = value.as_i64().ok_or_else(|| type_error("i8", value))?;
        i8::try_from(v).map_err(|_| range_error("i8", v))
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = value.as_i64().ok_or_else(|| type_error("i16", value))?;
        i16::try_from(v).map_err(|_| range_error("i16", v))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = value.as_i64().ok_or_else(|| type_error("i32", value))?;
        i32::try_from(v).map_err(|_| range_error("i32", v))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| type_error("i64", value))
    }
}

#[allow(clippy::cast_possible_truncation)]
impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            _ => value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| type_error("f32", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| type_error("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Decimal(s) => Ok(s.clone()),
            _ => Err(type_error("String", value)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Decimal(s) => Ok(Decimal(s.clone())),
            _ => Err(type_error("Decimal", value)),
        }
    }
}

impl FromValue for Date {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(Date(*d)),
            _ => Err(type_error("Date", value)),
        }
    }
}

impl FromValue for Timestamp {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(Timestamp(*ts)),
            _ => Err(type_error("Timestamp", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}
