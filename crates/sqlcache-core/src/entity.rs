//! Entity trait for row-mapped structs.
//!
//! An `Entity` is a plain struct that can be produced from a result row. It
//! registers its persistable fields once through [`Entity::field_table`]; the
//! materializer builds and caches that table on first use.

use crate::field::FieldTable;

/// Trait for types that can be materialized from query rows.
///
/// `Default` provides the zero-valued instance that row values are written
/// onto; fields that fail to map keep their default.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Document {
///     id: i64,
///     title: String,
/// }
///
/// impl Entity for Document {
///     const ENTITY_NAME: &'static str = "Document";
///
///     fn field_table() -> FieldTable<Self> {
///         FieldTable::builder(Self::ENTITY_NAME)
///             .field(FieldDescriptor::typed("id", |d: &Self| &d.id, |d| &mut d.id).column("ID"))
///             .field(FieldDescriptor::typed("title", |d: &Self| &d.title, |d| &mut d.title).column("TITLE"))
///     }
/// }
/// ```
pub trait Entity: Default + Clone + PartialEq + Send + Sync + 'static {
    /// Name used in diagnostics.
    const ENTITY_NAME: &'static str;

    /// Build the field table for this type.
    ///
    /// Called at most once per materializer.
    fn field_table() -> FieldTable<Self>;
}
