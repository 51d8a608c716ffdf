//! Row-to-entity materialization.
//!
//! [`EntityMaterializer`] turns one row into one entity. Each mapped field is
//! handled on its own: a missing column, a failed conversion or a rejected
//! write is recorded as a [`FieldMappingError`] and the field keeps its
//! default value, while the remaining fields are still populated.
//!
//! The eligible descriptor list is built from [`Entity::field_table`] on the
//! first materialization and reused for every row after that.
//!
//! A [`LookupHandler`] may be attached to fill data the field table does not
//! map, such as joined lookup columns. It sees the same row after the mapped
//! fields have been written.

use sqlcache_core::{
    Entity, Error, FieldDescriptor, FieldMappingError, FieldMappingErrorKind, Result, RowSource,
    Value,
};
use std::sync::OnceLock;

/// Hook run on every materialized entity with the row it came from.
pub type LookupHandler<E> = Box<dyn Fn(&dyn RowSource, &mut E) + Send + Sync>;

/// Builds entities of type `E` from rows.
pub struct EntityMaterializer<E: Entity> {
    descriptors: OnceLock<Vec<FieldDescriptor<E>>>,
    lookup: Option<LookupHandler<E>>,
}

impl<E: Entity> Default for EntityMaterializer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> std::fmt::Debug for EntityMaterializer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMaterializer")
            .field("entity", &E::ENTITY_NAME)
            .field("discovered", &self.descriptors.get().map(Vec::len))
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

impl<E: Entity> EntityMaterializer<E> {
    pub fn new() -> Self {
        Self {
            descriptors: OnceLock::new(),
            lookup: None,
        }
    }

    /// Attach a lookup handler (builder pattern).
    #[must_use]
    pub fn with_lookup(
        mut self,
        handler: impl Fn(&dyn RowSource, &mut E) + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Some(Box::new(handler));
        self
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// The eligible descriptors, discovering them on first call.
    pub fn descriptors(&self) -> &[FieldDescriptor<E>] {
        self.descriptors.get_or_init(Self::discover)
    }

    fn discover() -> Vec<FieldDescriptor<E>> {
        let table = E::field_table();
        let total = table.len();
        let eligible: Vec<_> = table
            .into_fields()
            .into_iter()
            .filter(|d| {
                let keep = d.is_mappable();
                if !keep {
                    tracing::trace!(
                        entity = E::ENTITY_NAME,
                        field = d.name(),
                        readable = d.is_readable(),
                        writable = d.is_writable(),
                        persistable = d.is_persistable(),
                        "Skipping unmapped field"
                    );
                }
                keep
            })
            .collect();
        tracing::debug!(
            entity = E::ENTITY_NAME,
            fields = total,
            mapped = eligible.len(),
            "Discovered field descriptors"
        );
        eligible
    }

    /// Descriptors recorded so far; empty until the first materialization.
    pub fn properties(&self) -> &[FieldDescriptor<E>] {
        self.descriptors.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_by_name(name).is_some()
    }

    /// Look up a mapped field by its semantic name.
    pub fn property_by_name(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.descriptors().iter().find(|d| d.name() == name)
    }

    /// Look up a mapped field by its storage column name.
    pub fn property_by_column(&self, column: &str) -> Option<&FieldDescriptor<E>> {
        self.descriptors()
            .iter()
            .find(|d| d.storage_name() == Some(column))
    }

    /// Read one mapped field from an entity.
    pub fn field_value(&self, entity: &E, name: &str) -> Option<Value> {
        self.property_by_name(name).and_then(|d| d.get(entity))
    }

    /// Write one mapped field onto an entity.
    #[allow(clippy::result_large_err)]
    pub fn set_field_value(&self, entity: &mut E, name: &str, value: &Value) -> Result<()> {
        let descriptor = self.property_by_name(name).ok_or_else(|| {
            Error::config(format!(
                "{} has no mapped field named '{}'",
                E::ENTITY_NAME,
                name
            ))
        })?;
        self.write_field(descriptor, entity, value)
            .map_err(Error::FieldMapping)
    }

    /// Build an entity from a row, logging and discarding field failures.
    pub fn materialize<R: RowSource>(&self, row: &R) -> E {
        let (entity, failures) = self.materialize_with_report(row);
        for failure in &failures {
            tracing::warn!(
                entity = failure.entity,
                field = failure.field,
                column = failure.column.as_deref(),
                error = %failure,
                "Field mapping failed"
            );
        }
        entity
    }

    /// Build an entity from a row and return every field failure alongside it.
    pub fn materialize_with_report<R: RowSource>(
        &self,
        row: &R,
    ) -> (E, Vec<FieldMappingError>) {
        let mut entity = E::default();
        let mut failures = Vec::new();

        for descriptor in self.descriptors() {
            let Some(column) = descriptor.storage_name() else {
                continue;
            };
            let Some(raw) = row.column(column) else {
                failures.push(
                    FieldMappingError::new(
                        FieldMappingErrorKind::MissingColumn,
                        E::ENTITY_NAME,
                        descriptor.name(),
                        "column not present in row",
                    )
                    .with_column(column),
                );
                continue;
            };
            if let Err(err) = self.write_field(descriptor, &mut entity, raw) {
                failures.push(err.with_column(column));
            }
        }

        if let Some(lookup) = &self.lookup {
            lookup(row, &mut entity);
        }

        tracing::trace!(
            entity = E::ENTITY_NAME,
            failures = failures.len(),
            "Materialized row"
        );
        (entity, failures)
    }

    fn write_field(
        &self,
        descriptor: &FieldDescriptor<E>,
        entity: &mut E,
        raw: &Value,
    ) -> std::result::Result<(), FieldMappingError> {
        let converted = descriptor.field_type().coerce(raw).map_err(|e| {
            FieldMappingError::new(
                FieldMappingErrorKind::Conversion,
                E::ENTITY_NAME,
                descriptor.name(),
                e.to_string(),
            )
            .with_source(e)
        })?;

        if converted.is_null() && !descriptor.is_nullable() {
            return Err(FieldMappingError::new(
                FieldMappingErrorKind::UnexpectedNull,
                E::ENTITY_NAME,
                descriptor.name(),
                "NULL for a non-optional field",
            ));
        }

        descriptor.set(entity, &converted).map_err(|e| {
            FieldMappingError::new(
                FieldMappingErrorKind::Writer,
                E::ENTITY_NAME,
                descriptor.name(),
                e.to_string(),
            )
            .with_source(e)
        })
    }
}
