//! Error types for SQLCache operations.
//!
//! [`Error`] is the data-access error surfaced by loading: every failure of
//! a load is one of its variants. Field-level failures during materialization
//! are reported as [`FieldMappingError`] values and normally never leave the
//! row they belong to.

use std::fmt;

/// The primary error type for all SQLCache operations.
#[derive(Debug)]
pub enum Error {
    /// Missing query text or unresolved mapping configuration
    Config(ConfigError),
    /// External query execution failed
    Query(QueryError),
    /// A single field could not be read from a row or written onto an entity
    FieldMapping(FieldMappingError),
    /// Value conversion errors
    Type(TypeError),
    /// A command addressed a position outside the collection
    Index(IndexError),
    /// Internal consistency check failed
    Invariant(InvariantViolation),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in the statement
    Syntax,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Connection lost or unavailable
    Connection,
    /// Row stream failed after the query started
    Fetch,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// A single field that failed to materialize.
#[derive(Debug)]
pub struct FieldMappingError {
    pub kind: FieldMappingErrorKind,
    /// Entity type name
    pub entity: &'static str,
    /// Semantic field name
    pub field: &'static str,
    /// Storage column name, when one was resolved
    pub column: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMappingErrorKind {
    /// Column not present in the row
    MissingColumn,
    /// Column value could not be converted to the field type
    Conversion,
    /// NULL column for a field whose type has no empty value
    UnexpectedNull,
    /// The field writer rejected the value
    Writer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}

/// A defensive check that failed inside an otherwise infallible operation.
///
/// The affected item is skipped; these should only surface in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub operation: &'static str,
    pub message: String,
}

impl Error {
    /// Create a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Create a query error of the given kind.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: None,
            message: message.into(),
            source: None,
        })
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_query_error(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Record the statement on a query error that does not carry one yet.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_sql(self, sql: &str) -> Self {
        match self {
            Error::Query(q) if q.sql.is_none() => Error::Query(q.with_sql(sql)),
            other => other,
        }
    }
}

impl QueryError {
    /// Attach the statement text to this error.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl FieldMappingError {
    pub fn new(
        kind: FieldMappingErrorKind,
        entity: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity,
            field,
            column: None,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::FieldMapping(e) => write!(f, "Field mapping error: {}", e),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Index(e) => write!(f, "Index error: {}", e),
            Error::Invariant(e) => write!(f, "Invariant violation: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::FieldMapping(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl std::error::Error for TypeError {}

impl fmt::Display for FieldMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(
                f,
                "{}.{} (column '{}'): {}",
                self.entity, self.field, col, self.message
            ),
            None => write!(f, "{}.{}: {}", self.entity, self.field, self.message),
        }
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index {} out of range for collection of length {}",
            self.index, self.len
        )
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<FieldMappingError> for Error {
    fn from(err: FieldMappingError) -> Self {
        Error::FieldMapping(err)
    }
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        Error::Index(err)
    }
}

impl From<InvariantViolation> for Error {
    fn from(err: InvariantViolation) -> Self {
        Error::Invariant(err)
    }
}

/// Result type alias for SQLCache operations.
pub type Result<T> = std::result::Result<T, Error>;
