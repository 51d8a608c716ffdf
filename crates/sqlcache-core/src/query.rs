//! Query configuration and the executor seam.
//!
//! A [`QueryObject`] holds the statement texts a data-access object runs.
//! Only the select text is required for loading; the insert, update and
//! delete texts are carried for commit sinks that want them.
//!
//! [`QueryExecutor`] is the only dependency loading has on the outside world:
//! it runs a select and yields rows one at a time.

use crate::Result;
use crate::row::RowSource;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Statement texts and parameters for a data-access object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryObject {
    select: Option<String>,
    params: Vec<Value>,
    insert: Option<String>,
    update: Option<String>,
    delete: Option<String>,
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

impl QueryObject {
    /// Create a query object with only select text.
    pub fn select(sql: impl Into<String>) -> Self {
        Self {
            select: non_blank(sql.into()),
            ..Self::default()
        }
    }

    /// Bind the select parameters.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn insert(mut self, sql: impl Into<String>) -> Self {
        self.insert = non_blank(sql.into());
        self
    }

    #[must_use]
    pub fn update(mut self, sql: impl Into<String>) -> Self {
        self.update = non_blank(sql.into());
        self
    }

    #[must_use]
    pub fn delete(mut self, sql: impl Into<String>) -> Self {
        self.delete = non_blank(sql.into());
        self
    }

    /// Select text; `None` when it was never set or is blank.
    pub fn select_sql(&self) -> Option<&str> {
        self.select.as_deref()
    }

    pub fn select_params(&self) -> &[Value] {
        &self.params
    }

    pub fn insert_sql(&self) -> Option<&str> {
        self.insert.as_deref()
    }

    pub fn update_sql(&self) -> Option<&str> {
        self.update.as_deref()
    }

    pub fn delete_sql(&self) -> Option<&str> {
        self.delete.as_deref()
    }
}

/// Runs select statements and streams the resulting rows.
///
/// A failure of [`query`](Self::query) itself, or an `Err` item from the row
/// iterator, aborts the load it belongs to.
pub trait QueryExecutor {
    /// The row type produced by this executor.
    type Row: RowSource;

    /// Row stream borrowed from the executor.
    type Rows<'a>: Iterator<Item = Result<Self::Row>>
    where
        Self: 'a;

    /// Execute a select statement with positional parameters.
    #[allow(clippy::result_large_err)]
    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Self::Rows<'a>>;
}
