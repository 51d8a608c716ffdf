//! Field descriptors and per-entity field tables.
//!
//! A [`FieldDescriptor`] binds one semantic entity field to its storage
//! column and to a reader/writer pair. A [`FieldTable`] is the explicit,
//! registered list of descriptors for one entity type; sub-structures are
//! composed in with [`FieldTable::embed`].

use crate::Result;
use crate::row::FromValue;
use crate::types::{FieldType, TypeInfo};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

type Reader<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;
type Writer<E> = Arc<dyn Fn(&mut E, &Value) -> Result<()> + Send + Sync>;

/// Metadata and accessors for one mapped entity field.
pub struct FieldDescriptor<E> {
    /// Semantic field name
    name: &'static str,
    /// Storage column name; `None` when the field is not persisted
    column: Option<&'static str>,
    field_type: FieldType,
    nullable: bool,
    reader: Option<Reader<E>>,
    writer: Option<Writer<E>>,
}

impl<E> Clone for FieldDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            column: self.column,
            field_type: self.field_type,
            nullable: self.nullable,
            reader: self.reader.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<E> fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("readable", &self.reader.is_some())
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

impl<E: 'static> FieldDescriptor<E> {
    /// Create a descriptor with no column and no accessors.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column: None,
            field_type,
            nullable: false,
            reader: None,
            writer: None,
        }
    }

    /// Create a readable and writable descriptor from a pair of projections.
    ///
    /// The field type and nullability come from `T`'s [`TypeInfo`].
    ///
    /// ```ignore
    /// FieldDescriptor::typed("id", |d: &Doc| &d.id, |d: &mut Doc| &mut d.id).column("ID")
    /// ```
    pub fn typed<T>(name: &'static str, get: fn(&E) -> &T, get_mut: fn(&mut E) -> &mut T) -> Self
    where
        T: TypeInfo + FromValue + Clone + Into<Value> + 'static,
    {
        Self {
            name,
            column: None,
            field_type: T::FIELD_TYPE,
            nullable: T::NULLABLE,
            reader: Some(Arc::new(move |entity: &E| get(entity).clone().into())),
            writer: Some(Arc::new(move |entity: &mut E, value: &Value| {
                *get_mut(entity) = T::from_value(value)?;
                Ok(())
            })),
        }
    }

    /// Set the storage column name.
    ///
    /// Blank names are treated as "not persisted".
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = if column.trim().is_empty() {
            None
        } else {
            Some(column)
        };
        self
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Install a custom reader.
    pub fn reader(mut self, reader: impl Fn(&E) -> Value + Send + Sync + 'static) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Install a custom writer.
    pub fn writer(
        mut self,
        writer: impl Fn(&mut E, &Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Semantic field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Storage column name, if the field is persisted.
    pub fn storage_name(&self) -> Option<&'static str> {
        self.column
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_readable(&self) -> bool {
        self.reader.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    pub fn is_persistable(&self) -> bool {
        self.column.is_some()
    }

    /// Readable, writable and persistable at once; only these take part in
    /// row materialization.
    pub fn is_mappable(&self) -> bool {
        self.is_readable() && self.is_writable() && self.is_persistable()
    }

    /// Read the field from an entity. Unreadable fields yield `None`.
    pub fn get(&self, entity: &E) -> Option<Value> {
        self.reader.as_ref().map(|read| read(entity))
    }

    /// Write the field onto an entity. Unwritable fields are left untouched.
    #[allow(clippy::result_large_err)]
    pub fn set(&self, entity: &mut E, value: &Value) -> Result<()> {
        match &self.writer {
            Some(write) => write(entity, value),
            None => Ok(()),
        }
    }

    /// Re-target this descriptor at a parent type that embeds `E`.
    fn lift<P: 'static>(
        self,
        get: fn(&P) -> &E,
        get_mut: fn(&mut P) -> &mut E,
    ) -> FieldDescriptor<P> {
        FieldDescriptor {
            name: self.name,
            column: self.column,
            field_type: self.field_type,
            nullable: self.nullable,
            reader: self.reader.map(|read| -> Reader<P> {
                Arc::new(move |parent: &P| read(get(parent)))
            }),
            writer: self.writer.map(|write| -> Writer<P> {
                Arc::new(move |parent: &mut P, value: &Value| write(get_mut(parent), value))
            }),
        }
    }
}

/// The registered field list of one entity type.
pub struct FieldTable<E> {
    entity: &'static str,
    fields: Vec<FieldDescriptor<E>>,
}

impl<E> Clone for FieldTable<E> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            fields: self.fields.clone(),
        }
    }
}

impl<E> fmt::Debug for FieldTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTable")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<E: 'static> FieldTable<E> {
    /// Start a table for the named entity.
    pub fn builder(entity: &'static str) -> Self {
        Self {
            entity,
            fields: Vec::new(),
        }
    }

    /// Add a field descriptor.
    pub fn field(mut self, descriptor: FieldDescriptor<E>) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Compose the fields of an embedded sub-structure into this table.
    pub fn embed<S: 'static>(
        mut self,
        table: FieldTable<S>,
        get: fn(&E) -> &S,
        get_mut: fn(&mut E) -> &mut S,
    ) -> Self {
        self.fields
            .extend(table.fields.into_iter().map(|d| d.lift(get, get_mut)));
        self
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn fields(&self) -> &[FieldDescriptor<E>] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor<E>> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a descriptor by semantic field name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.iter().find(|d| d.name == name)
    }

    /// Storage name for a semantic field, or `None` if it is unknown or not
    /// persisted.
    pub fn storage_name(&self, name: &str) -> Option<&'static str> {
        self.get(name).and_then(FieldDescriptor::storage_name)
    }
}
