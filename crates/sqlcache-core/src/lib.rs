//! Core types and traits for SQLCache.
//!
//! This crate provides the building blocks the session layer works with:
//!
//! - `Value` and `FieldType` for dynamically typed column data
//! - `FieldDescriptor` and `FieldTable` for explicit field registration
//! - `Entity` for row-mapped structs
//! - `RowSource` and `QueryExecutor` for reading rows from a store
//! - `QueryObject` for statement configuration

pub mod entity;
pub mod error;
pub mod field;
pub mod query;
pub mod row;
pub mod types;
pub mod value;

pub use entity::Entity;
pub use error::{
    ConfigError, Error, FieldMappingError, FieldMappingErrorKind, IndexError, InvariantViolation,
    QueryError, QueryErrorKind, Result, TypeError,
};
pub use field::{FieldDescriptor, FieldTable};
pub use query::{QueryExecutor, QueryObject};
pub use row::{ColumnInfo, FromValue, Row, RowSource};
pub use types::{Date, Decimal, FieldType, Timestamp, TypeInfo};
pub use value::Value;
