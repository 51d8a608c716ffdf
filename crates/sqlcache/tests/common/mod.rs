#![allow(dead_code)]

use sqlcache::prelude::*;
use sqlcache::{ColumnInfo, Date, Decimal, EntityMaterializer, QueryErrorKind, Timestamp};
use std::cell::{Cell, RefCell};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Audit {
    pub author: String,
    pub created: Option<Timestamp>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub pages: i32,
    pub published: Option<Date>,
    pub price: Decimal,
    pub audit: Audit,
}

impl Document {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            pages: 10,
            published: None,
            price: Decimal("9.99".to_string()),
            audit: Audit {
                author: "ada".to_string(),
                created: Some(Timestamp(1_700_000_000_000_000)),
            },
        }
    }
}

fn audit_table() -> FieldTable<Audit> {
    FieldTable::builder("Audit")
        .field(
            FieldDescriptor::typed("author", |a: &Audit| &a.author, |a| &mut a.author)
                .column("AUTHOR"),
        )
        .field(
            FieldDescriptor::typed("created", |a: &Audit| &a.created, |a| &mut a.created)
                .column("CREATED_AT"),
        )
}

impl Entity for Document {
    const ENTITY_NAME: &'static str = "Document";

    fn field_table() -> FieldTable<Self> {
        FieldTable::builder(Self::ENTITY_NAME)
            .field(FieldDescriptor::typed("id", |d: &Self| &d.id, |d| &mut d.id).column("ID"))
            .field(
                FieldDescriptor::typed("title", |d: &Self| &d.title, |d| &mut d.title)
                    .column("TITLE"),
            )
            .field(
                FieldDescriptor::typed("pages", |d: &Self| &d.pages, |d| &mut d.pages)
                    .column("PAGES"),
            )
            .field(
                FieldDescriptor::typed("published", |d: &Self| &d.published, |d| {
                    &mut d.published
                })
                .column("PUBLISHED"),
            )
            .field(
                FieldDescriptor::typed("price", |d: &Self| &d.price, |d| &mut d.price)
                    .column("PRICE"),
            )
            .embed(audit_table(), |d| &d.audit, |d| &mut d.audit)
    }
}

pub const COLUMNS: [&str; 7] = [
    "ID",
    "TITLE",
    "PAGES",
    "PUBLISHED",
    "PRICE",
    "AUTHOR",
    "CREATED_AT",
];

/// A single in-memory table that answers every select with all of its rows.
pub struct MemoryTable {
    columns: Arc<ColumnInfo>,
    rows: RefCell<Vec<Vec<Value>>>,
    fail_query: Cell<Option<QueryErrorKind>>,
    fail_after: Cell<Option<usize>>,
    pub log: RefCell<Vec<(String, Vec<Value>)>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self {
            columns: Arc::new(ColumnInfo::new(
                COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            )),
            rows: RefCell::new(Vec::new()),
            fail_query: Cell::new(None),
            fail_after: Cell::new(None),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn with_documents(docs: &[Document]) -> Self {
        let table = Self::new();
        for doc in docs {
            table.insert_raw(document_row(doc));
        }
        table
    }

    pub fn insert_raw(&self, values: Vec<Value>) {
        self.rows.borrow_mut().push(values);
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    /// Make the next selects fail outright.
    pub fn fail_with(&self, kind: Option<QueryErrorKind>) {
        self.fail_query.set(kind);
    }

    /// Make the row stream fail after `n` rows.
    pub fn fail_after(&self, n: Option<usize>) {
        self.fail_after.set(n);
    }

    fn position_of(&self, id: i64) -> Option<usize> {
        self.rows
            .borrow()
            .iter()
            .position(|r| r.first() == Some(&Value::BigInt(id)))
    }
}

impl QueryExecutor for MemoryTable {
    type Row = Row;
    type Rows<'a> = std::vec::IntoIter<Result<Row>>;

    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Self::Rows<'a>> {
        self.log
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        if let Some(kind) = self.fail_query.get() {
            return Err(Error::query(kind, "table is unavailable"));
        }
        let mut out: Vec<Result<Row>> = self
            .rows
            .borrow()
            .iter()
            .map(|values| Ok(Row::with_columns(Arc::clone(&self.columns), values.clone())))
            .collect();
        if let Some(n) = self.fail_after.get() {
            out.truncate(n);
            out.push(Err(Error::query(QueryErrorKind::Fetch, "cursor closed")));
        }
        Ok(out.into_iter())
    }
}

pub fn document_row(doc: &Document) -> Vec<Value> {
    vec![
        Value::BigInt(doc.id),
        Value::Text(doc.title.clone()),
        Value::Int(doc.pages),
        doc.published.map_or(Value::Null, Value::from),
        Value::Decimal(doc.price.0.clone()),
        Value::Text(doc.audit.author.clone()),
        doc.audit.created.map_or(Value::Null, Value::from),
    ]
}

/// Commit sink that writes changes back into a [`MemoryTable`].
pub struct TableWriter<'a> {
    pub table: &'a MemoryTable,
    pub materializer: EntityMaterializer<Document>,
    pub fail: bool,
}

impl<'a> TableWriter<'a> {
    pub fn new(table: &'a MemoryTable) -> Self {
        Self {
            table,
            materializer: EntityMaterializer::new(),
            fail: false,
        }
    }

    fn to_row(&self, doc: &Document) -> Vec<Value> {
        COLUMNS
            .iter()
            .map(|column| {
                self.materializer
                    .property_by_column(column)
                    .and_then(|d| d.get(doc))
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

impl CommitSink<Document> for TableWriter<'_> {
    fn commit(&mut self, changes: &ChangeSet<'_, Document>) -> Result<()> {
        if self.fail {
            return Err(Error::query(QueryErrorKind::Connection, "write refused"));
        }
        for doc in changes.removed {
            if let Some(pos) = self.table.position_of(doc.id) {
                self.table.rows.borrow_mut().remove(pos);
            }
        }
        for record in changes.updated {
            let row = self.to_row(&record.last_value);
            if let Some(pos) = self.table.position_of(record.init_value.id) {
                self.table.rows.borrow_mut()[pos] = row;
            }
        }
        for doc in changes.added {
            let row = self.to_row(doc);
            self.table.insert_raw(row);
        }
        Ok(())
    }
}

pub fn sorted_ids(docs: &[Document]) -> Vec<i64> {
    let mut ids: Vec<i64> = docs.iter().map(|d| d.id).collect();
    ids.sort_unstable();
    ids
}
