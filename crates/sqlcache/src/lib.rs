//! SQLCache - tracked entity collections loaded from relational queries.
//!
//! Load the rows of a select into a collection of plain Rust structs, edit
//! the collection freely, then either hand the edits to a commit sink or roll
//! them back to exactly what was loaded.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlcache::prelude::*;
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! impl Entity for Hero {
//!     const ENTITY_NAME: &'static str = "Hero";
//!
//!     fn field_table() -> FieldTable<Self> {
//!         FieldTable::builder(Self::ENTITY_NAME)
//!             .field(FieldDescriptor::typed("id", |h: &Self| &h.id, |h| &mut h.id).column("ID"))
//!             .field(FieldDescriptor::typed("name", |h: &Self| &h.name, |h| &mut h.name).column("NAME"))
//!             .field(FieldDescriptor::typed("age", |h: &Self| &h.age, |h| &mut h.age).column("AGE"))
//!     }
//! }
//!
//! fn example(executor: &impl QueryExecutor) -> Result<()> {
//!     let mut heroes = DataAccessObject::<Hero>::with_query(
//!         QueryObject::select("SELECT ID, NAME, AGE FROM HEROES"),
//!     );
//!     heroes.open(executor)?;
//!
//!     heroes.cache_mut().edit(0, |h| h.age = Some(26))?;
//!     heroes.cache_mut().push(Hero { id: 9, name: "Nova".into(), age: None });
//!     assert_eq!(heroes.cache().pending_counts().total(), 2);
//!
//!     heroes.rollback();
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **No runtime reflection**: fields are registered once in an explicit table
//! - **Best-effort loading**: a bad column never costs more than its own field
//! - **Exact change classification**: edits are tracked as added / updated /
//!   removed relative to the loaded baseline
//! - **Injected executors**: loading never reaches for a global connection

// Re-export all public types from sub-crates
pub use sqlcache_core::{
    ColumnInfo,
    // Errors
    ConfigError,
    // Core types
    Date,
    Decimal,
    Entity,
    Error,
    FieldDescriptor,
    FieldMappingError,
    FieldMappingErrorKind,
    FieldTable,
    FieldType,
    FromValue,
    IndexError,
    InvariantViolation,
    QueryError,
    QueryErrorKind,
    // Query seam
    QueryExecutor,
    QueryObject,
    Result,
    Row,
    RowSource,
    Timestamp,
    TypeError,
    TypeInfo,
    Value,
};

pub use sqlcache_session::{
    ChangeSet, CollectionChange, Command, CommitSink, DaoConfig, DataAccessObject,
    EntityMaterializer, ListenerId, LoadReport, LookupHandler, MutationRecord,
    MutationTrackingCache, PendingCounts, RollbackReport,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlcache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChangeSet, CollectionChange, Command, CommitSink, DaoConfig, DataAccessObject, Entity,
        Error, FieldDescriptor, FieldTable, MutationTrackingCache, QueryExecutor, QueryObject,
        Result, Row, RowSource, Value,
    };
}
