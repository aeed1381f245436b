//! Integration tests for heap files

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use heapstore::storage::page::HeapPage;
use heapstore::tuple::{DataType, Schema, Tuple, TupleBuilder};
use heapstore::{
    BufferPool, Catalog, Config, DbError, HeapFile, PageId, RecordId, TableId, TransactionId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// 64-byte pages with 18-byte tuples hold 3 tuples each
const PAGE: usize = 64;

fn schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(12))
        .build_arc()
}

fn create_table(dir: &TempDir, pool_pages: usize) -> (Arc<HeapFile>, BufferPool) {
    let config = Config::new()
        .with_page_size(PAGE)
        .with_pool_pages(pool_pages);
    create_table_with(dir, &config)
}

fn create_table_with(dir: &TempDir, config: &Config) -> (Arc<HeapFile>, BufferPool) {
    let file = Arc::new(HeapFile::open(dir.path().join("table.dat"), schema(), PAGE).unwrap());
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::clone(&file), "table");
    (file, BufferPool::new(config, catalog))
}

fn row(id: i32) -> Tuple {
    TupleBuilder::new(schema())
        .value(id)
        .value(format!("name-{}", id))
        .build()
        .unwrap()
}

fn scan_ids(file: &HeapFile, pool: &BufferPool, tid: TransactionId) -> Vec<i32> {
    let mut ids: Vec<i32> = file
        .iter(pool, tid)
        .map(|t| t.unwrap().value(0).unwrap().as_integer().unwrap())
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_ten_inserts_fill_four_pages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table.dat");
    // Start from one empty page on disk
    std::fs::write(&path, vec![0u8; PAGE]).unwrap();

    let (file, pool) = create_table(&dir, 50);
    assert_eq!(file.num_pages(), 1);

    let tid = TransactionId::next_id();
    for i in 0..10 {
        pool.insert_tuple(tid, file.id(), &mut row(i)).unwrap();
    }

    assert_eq!(file.num_pages(), 4);
    assert_eq!(scan_ids(&file, &pool, tid), (0..10).collect::<Vec<_>>());
    pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn test_inserts_are_first_fit_by_page() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();

    let mut rows: Vec<Tuple> = (0..6).map(row).collect();
    for t in rows.iter_mut() {
        pool.insert_tuple(tid, file.id(), t).unwrap();
    }

    // Free a slot on page 0; the next insert goes there
    pool.delete_tuple(tid, &rows[1]).unwrap();
    let mut next = row(100);
    pool.insert_tuple(tid, file.id(), &mut next).unwrap();
    assert_eq!(next.record_id(), rows[1].record_id());
    assert_eq!(file.num_pages(), 2);
}

#[test]
fn test_double_delete_is_consistency_fault() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();

    let mut t = row(1);
    pool.insert_tuple(tid, file.id(), &mut t).unwrap();
    pool.delete_tuple(tid, &t).unwrap();

    let err = pool.delete_tuple(tid, &t).unwrap_err();
    assert!(matches!(err, DbError::SlotNotOccupied(_)));
    assert!(err.is_consistency_fault());
}

#[test]
fn test_delete_with_bogus_record_id() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();
    pool.insert_tuple(tid, file.id(), &mut row(1)).unwrap();

    let mut past_end = row(2);
    past_end.set_record_id(Some(RecordId::new(
        PageId::new(file.id(), 9),
        heapstore::SlotId::new(0),
    )));
    assert!(matches!(
        pool.delete_tuple(tid, &past_end),
        Err(DbError::SlotNotOccupied(_))
    ));

    let mut other_table = row(3);
    other_table.set_record_id(Some(RecordId::new(
        PageId::new(TableId(file.id().as_u32().wrapping_add(1)), 0),
        heapstore::SlotId::new(0),
    )));
    assert!(matches!(
        pool.delete_tuple(tid, &other_table),
        Err(DbError::SlotNotOccupied(_))
    ));
}

#[test]
fn test_insert_rejects_wrong_schema() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();

    let other = Arc::new(Schema::from_types(&[DataType::Integer]));
    let mut t = TupleBuilder::new(other).value(1).build().unwrap();
    assert!(matches!(
        pool.insert_tuple(tid, file.id(), &mut t),
        Err(DbError::SchemaMismatch)
    ));
    assert_eq!(file.num_pages(), 0);
}

#[test]
fn test_read_write_page_round_trip() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();
    for i in 0..5 {
        pool.insert_tuple(tid, file.id(), &mut row(i)).unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();

    for page_no in 0..file.num_pages() as u32 {
        let pid = PageId::new(file.id(), page_no);
        let before = std::fs::read(file.path()).unwrap();
        let page = file.read_page(pid).unwrap();
        file.write_page(&page).unwrap();
        let after = std::fs::read(file.path()).unwrap();
        assert_eq!(before, after);
        assert_eq!(
            file.read_page(pid).unwrap().to_bytes().unwrap(),
            page.to_bytes().unwrap()
        );
    }
}

#[test]
fn test_read_page_past_end_is_io_error() {
    let dir = TempDir::new().unwrap();
    let (file, _pool) = create_table(&dir, 50);
    let err = file.read_page(PageId::new(file.id(), 0)).unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}

#[test]
fn test_write_page_for_other_table_rejected() {
    let dir = TempDir::new().unwrap();
    let (file, _pool) = create_table(&dir, 50);
    let foreign = HeapPage::empty(
        PageId::new(TableId(file.id().as_u32().wrapping_add(1)), 0),
        schema(),
        PAGE,
    );
    assert!(matches!(
        file.write_page(&foreign),
        Err(DbError::WrongTable { .. })
    ));
}

#[test]
fn test_scan_is_lazy_per_page() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let writer = TransactionId::next_id();
    for i in 0..9 {
        pool.insert_tuple(writer, file.id(), &mut row(i)).unwrap();
    }
    pool.transaction_complete(writer, true).unwrap();

    let reader = TransactionId::next_id();
    let mut it = file.iter(&pool, reader);
    assert!(it.next().is_some());
    let pid = |n| PageId::new(file.id(), n);
    assert!(pool.holds_lock(reader, pid(0)));
    assert!(!pool.holds_lock(reader, pid(1)));

    // Drain page 0, then pull the first tuple of page 1
    it.next();
    it.next();
    it.next();
    assert!(pool.holds_lock(reader, pid(1)));
    assert!(!pool.holds_lock(reader, pid(2)));
}

#[test]
fn test_rewind_refetches_first_page() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 50);
    let tid = TransactionId::next_id();
    for i in 0..4 {
        pool.insert_tuple(tid, file.id(), &mut row(i)).unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();

    let reader = TransactionId::next_id();
    let mut it = file.iter(&pool, reader);
    assert_eq!(it.by_ref().count(), 4);

    pool.transaction_complete(reader, true).unwrap();
    assert!(!pool.holds_lock(reader, PageId::new(file.id(), 0)));

    it.rewind().unwrap();
    assert!(pool.holds_lock(reader, PageId::new(file.id(), 0)));
    assert_eq!(it.count(), 4);
}

#[test]
fn test_scan_error_ends_iteration() {
    let dir = TempDir::new().unwrap();
    let config = Config::new()
        .with_page_size(PAGE)
        .with_lock_timeout(Duration::from_millis(50))
        .with_lock_poll_interval(Duration::from_millis(10));
    let (file, pool) = create_table_with(&dir, &config);
    let writer = TransactionId::next_id();
    pool.insert_tuple(writer, file.id(), &mut row(1)).unwrap();

    // The writer still holds page 0 exclusively, so the reader times out
    let reader = TransactionId::next_id();
    let mut it = file.iter(&pool, reader);
    let first = it.next().unwrap();
    assert!(first.unwrap_err().is_transaction_aborted());
    assert!(it.next().is_none());
}

#[test]
fn test_random_insert_delete_matches_model() {
    let dir = TempDir::new().unwrap();
    let (file, pool) = create_table(&dir, 64);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let tid = TransactionId::next_id();

    let mut model: HashMap<RecordId, i32> = HashMap::new();
    let mut live: Vec<Tuple> = Vec::new();
    let mut last_pages = 0;

    for step in 0..300 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let mut t = row(step);
            pool.insert_tuple(tid, file.id(), &mut t).unwrap();
            let rid = t.record_id().unwrap();
            assert!(model.insert(rid, step).is_none(), "slot reused while live");
            live.push(t);
        } else {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            pool.delete_tuple(tid, &victim).unwrap();
            model.remove(&victim.record_id().unwrap());
        }

        let pages = file.num_pages();
        assert!(pages >= last_pages);
        last_pages = pages;
    }

    let stored: HashMap<RecordId, i32> = file
        .iter(&pool, tid)
        .map(|t| {
            let t = t.unwrap();
            (
                t.record_id().unwrap(),
                t.value(0).unwrap().as_integer().unwrap(),
            )
        })
        .collect();
    assert_eq!(stored, model);

    // Same contents after a commit and a cold reload
    pool.transaction_complete(tid, true).unwrap();
    let (file, pool) = {
        drop(pool);
        drop(file);
        create_table(&dir, 64)
    };
    let reader = TransactionId::next_id();
    let mut expected: Vec<i32> = model.values().copied().collect();
    expected.sort();
    assert_eq!(scan_ids(&file, &pool, reader), expected);
}
