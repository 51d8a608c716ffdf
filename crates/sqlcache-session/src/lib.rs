//! Loading and mutation tracking for SQLCache.
//!
//! `sqlcache-session` is the **collection layer**. It loads query results into
//! an in-memory collection of entities and tracks every edit made to that
//! collection relative to what was loaded, so the edits can later be
//! committed or discarded as a unit.
//!
//! # Role In The Architecture
//!
//! - **Materialization**: [`EntityMaterializer`] turns rows into entities
//!   with per-field failure isolation.
//! - **Change tracking**: [`MutationTrackingCache`] classifies inserts,
//!   removals and replacements into added / updated / removed.
//! - **Rollback and commit**: restore the baseline, or hand the changes to a
//!   [`CommitSink`] and adopt the result as the new baseline.
//!
//! # Example
//!
//! ```ignore
//! let mut dao = DataAccessObject::<Document>::with_query(
//!     QueryObject::select("SELECT ID, TITLE FROM DOCS WHERE OWNER = ?").params([7i64]),
//! );
//! dao.open(&executor)?;
//!
//! dao.cache_mut().edit(0, |doc| doc.title.push_str(" (draft)"))?;
//! dao.cache_mut().push(Document::default());
//!
//! // Throw the edits away again
//! dao.rollback();
//! ```

pub mod change_tracker;
pub mod commit;
pub mod materializer;
pub mod rollback;

pub use change_tracker::{
    CollectionChange, Command, ListenerId, MutationRecord, MutationTrackingCache, PendingCounts,
};
pub use commit::{ChangeSet, CommitSink};
pub use materializer::{EntityMaterializer, LookupHandler};
pub use rollback::RollbackReport;

use sqlcache_core::{
    Entity, Error, FieldMappingError, QueryExecutor, QueryObject, Result, RowSource, Value,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for data-access object behavior.
#[derive(Debug, Clone)]
pub struct DaoConfig {
    /// Abort a load on the first field mapping failure.
    ///
    /// Every [`FieldMappingErrorKind`](sqlcache_core::FieldMappingErrorKind)
    /// counts, including `UnexpectedNull`: a NULL in a column backing a
    /// non-`Option` field rejects the whole load. Declare such fields as
    /// `Option<T>` when the column is nullable.
    pub strict_mapping: bool,
    /// Keep the report of the last load for inspection.
    pub retain_load_report: bool,
}

impl Default for DaoConfig {
    fn default() -> Self {
        Self {
            strict_mapping: false,
            retain_load_report: true,
        }
    }
}

impl DaoConfig {
    /// Create new default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `strict_mapping` option (builder pattern).
    #[must_use]
    pub fn strict_mapping(mut self, value: bool) -> Self {
        self.strict_mapping = value;
        self
    }

    /// Set the `retain_load_report` option (builder pattern).
    #[must_use]
    pub fn retain_load_report(mut self, value: bool) -> Self {
        self.retain_load_report = value;
        self
    }
}

/// Outcome of the most recent successful load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Rows read from the executor.
    pub rows: usize,
    /// Field failures across all rows, in row order.
    pub failures: Vec<FieldMappingError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Data Access Object
// ============================================================================

/// Loads entities of type `E` and tracks edits to them.
pub struct DataAccessObject<E: Entity> {
    query: QueryObject,
    config: DaoConfig,
    materializer: EntityMaterializer<E>,
    cache: MutationTrackingCache<E>,
    last_load: Option<LoadReport>,
}

impl<E: Entity> Default for DataAccessObject<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity + std::fmt::Debug> std::fmt::Debug for DataAccessObject<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAccessObject")
            .field("entity", &E::ENTITY_NAME)
            .field("query", &self.query)
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<E: Entity> DataAccessObject<E> {
    /// Create an object with no query and an empty collection.
    pub fn new() -> Self {
        Self {
            query: QueryObject::default(),
            config: DaoConfig::default(),
            materializer: EntityMaterializer::new(),
            cache: MutationTrackingCache::new(),
            last_load: None,
        }
    }

    pub fn with_query(query: QueryObject) -> Self {
        Self {
            query,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DaoConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `handler` on every loaded entity with its source row.
    #[must_use]
    pub fn with_lookup(
        mut self,
        handler: impl Fn(&dyn RowSource, &mut E) + Send + Sync + 'static,
    ) -> Self {
        self.materializer = self.materializer.with_lookup(handler);
        self
    }

    pub fn query(&self) -> &QueryObject {
        &self.query
    }

    pub fn set_query(&mut self, query: QueryObject) {
        self.query = query;
    }

    pub fn config(&self) -> &DaoConfig {
        &self.config
    }

    pub fn materializer(&self) -> &EntityMaterializer<E> {
        &self.materializer
    }

    pub fn cache(&self) -> &MutationTrackingCache<E> {
        &self.cache
    }

    /// Mutable access for editing; every edit is classified.
    pub fn cache_mut(&mut self) -> &mut MutationTrackingCache<E> {
        &mut self.cache
    }

    pub fn items(&self) -> &[E] {
        self.cache.items()
    }

    /// Report of the last successful load, if retained.
    pub fn last_load_report(&self) -> Option<&LoadReport> {
        self.last_load.as_ref()
    }

    /// Run the configured select and install the results as the new baseline.
    ///
    /// Returns the number of loaded entities. On error the previous
    /// collection and its pending changes are left as they were.
    #[allow(clippy::result_large_err)]
    pub fn open<X: QueryExecutor + ?Sized>(&mut self, executor: &X) -> Result<usize> {
        let params = self.query.select_params().to_vec();
        self.open_with_params(executor, &params)
    }

    /// Like [`open`](Self::open) with `params` in place of the configured ones.
    #[tracing::instrument(
        level = "debug",
        skip(self, executor, params),
        fields(entity = E::ENTITY_NAME, params = params.len())
    )]
    #[allow(clippy::result_large_err)]
    pub fn open_with_params<X: QueryExecutor + ?Sized>(
        &mut self,
        executor: &X,
        params: &[Value],
    ) -> Result<usize> {
        let Some(sql) = self.query.select_sql() else {
            tracing::warn!("Load requested without a select query");
            return Err(Error::config(format!(
                "no select query configured for {}",
                E::ENTITY_NAME
            )));
        };

        if self.materializer.descriptors().is_empty() {
            tracing::warn!("No mapped fields; installing an empty collection");
            self.cache.load(Vec::new());
            self.last_load = self.config.retain_load_report.then(LoadReport::default);
            return Ok(0);
        }

        tracing::debug!(sql, "Executing select");
        let rows = executor
            .query(sql, params)
            .map_err(|e| e.with_sql(sql))
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Select failed");
            })?;

        let mut items = Vec::new();
        let mut report = LoadReport::default();
        for row in rows {
            let row = row.map_err(|e| e.with_sql(sql)).inspect_err(|e| {
                tracing::warn!(error = %e, read = report.rows, "Row stream failed");
            })?;
            report.rows += 1;
            let (entity, failures) = self.materializer.materialize_with_report(&row);
            for failure in failures {
                tracing::warn!(
                    row = report.rows - 1,
                    field = failure.field,
                    column = failure.column.as_deref(),
                    error = %failure,
                    "Field mapping failed"
                );
                if self.config.strict_mapping {
                    return Err(Error::FieldMapping(failure));
                }
                report.failures.push(failure);
            }
            items.push(entity);
        }

        let loaded = items.len();
        tracing::debug!(
            rows = report.rows,
            failures = report.failures.len(),
            "Load complete"
        );
        self.cache.load(items);
        self.last_load = self.config.retain_load_report.then_some(report);
        Ok(loaded)
    }

    /// Replace the query and load.
    #[allow(clippy::result_large_err)]
    pub fn open_query<X: QueryExecutor + ?Sized>(
        &mut self,
        executor: &X,
        query: QueryObject,
    ) -> Result<usize> {
        self.query = query;
        self.open(executor)
    }

    /// Discard all edits since the last load or commit.
    pub fn rollback(&mut self) -> RollbackReport {
        self.cache.rollback()
    }

    /// Hand pending edits to `sink`.
    #[allow(clippy::result_large_err)]
    pub fn commit<S: CommitSink<E> + ?Sized>(&mut self, sink: &mut S) -> Result<usize> {
        self.cache.commit(sink)
    }
}
