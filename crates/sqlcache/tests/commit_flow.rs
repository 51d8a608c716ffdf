mod common;

use common::{Document, MemoryTable, TableWriter, sorted_ids};
use sqlcache::prelude::*;

fn dao() -> DataAccessObject<Document> {
    DataAccessObject::with_query(QueryObject::select("SELECT * FROM DOCUMENTS"))
}

#[test]
fn commit_writes_back_and_reload_matches() {
    let table = MemoryTable::with_documents(&[
        Document::new(1, "A"),
        Document::new(2, "B"),
        Document::new(3, "C"),
    ]);
    let mut dao = dao();
    dao.open(&table).unwrap();

    dao.cache_mut()
        .edit(0, |d| d.title = "A (revised)".to_string())
        .unwrap();
    dao.cache_mut().remove(1).unwrap();
    dao.cache_mut().push(Document::new(4, "D"));
    let expected = dao.items().to_vec();

    let mut writer = TableWriter::new(&table);
    assert_eq!(dao.commit(&mut writer).unwrap(), 3);
    assert!(!dao.cache().has_changes());
    assert_eq!(table.len(), 3);

    let mut reloaded = self::dao();
    reloaded.open(&table).unwrap();
    assert_eq!(sorted_ids(reloaded.items()), vec![1, 3, 4]);
    for doc in reloaded.items() {
        assert!(expected.contains(doc), "unexpected {doc:?}");
    }
}

#[test]
fn committed_state_is_the_new_baseline() {
    let table = MemoryTable::with_documents(&[Document::new(1, "A")]);
    let mut dao = dao();
    dao.open(&table).unwrap();
    dao.cache_mut().push(Document::new(2, "B"));
    dao.commit(&mut TableWriter::new(&table)).unwrap();

    dao.cache_mut().remove(1).unwrap();
    let removed: Vec<i64> = dao.cache().removed().iter().map(|d| d.id).collect();
    assert_eq!(removed, vec![2]);
    assert!(dao.cache().added().is_empty());

    dao.rollback();
    assert_eq!(sorted_ids(dao.items()), vec![1, 2]);
}

#[test]
fn failed_commit_keeps_pending_changes() {
    let table = MemoryTable::with_documents(&[Document::new(1, "A")]);
    let mut dao = dao();
    dao.open(&table).unwrap();
    dao.cache_mut().push(Document::new(2, "B"));

    let mut writer = TableWriter::new(&table);
    writer.fail = true;
    assert!(dao.commit(&mut writer).unwrap_err().is_query_error());
    assert_eq!(dao.cache().pending_counts().added, 1);
    assert_eq!(table.len(), 1);

    writer.fail = false;
    assert_eq!(dao.commit(&mut writer).unwrap(), 1);
    assert_eq!(table.len(), 2);
}

#[test]
fn updated_records_carry_the_stored_value() {
    let table = MemoryTable::with_documents(&[Document::new(1, "A"), Document::new(2, "B")]);
    let mut dao = dao();
    dao.open(&table).unwrap();

    dao.cache_mut().edit(1, |d| d.id = 20).unwrap();
    dao.cache_mut().edit(1, |d| d.pages = 300).unwrap();

    let changes = dao.cache().change_set();
    assert_eq!(changes.updated.len(), 1);
    assert_eq!(changes.updated[0].init_value.id, 2);
    assert_eq!(changes.updated[0].last_value.id, 20);
    assert_eq!(changes.updated[0].last_value.pages, 300);

    dao.commit(&mut TableWriter::new(&table)).unwrap();
    let mut reloaded = self::dao();
    reloaded.open(&table).unwrap();
    assert_eq!(sorted_ids(reloaded.items()), vec![1, 20]);
}

#[test]
fn nothing_pending_means_no_write() {
    let table = MemoryTable::with_documents(&[Document::new(1, "A")]);
    let mut dao = dao();
    dao.open(&table).unwrap();

    let mut writer = TableWriter::new(&table);
    writer.fail = true;
    assert_eq!(dao.commit(&mut writer).unwrap(), 0);
}
