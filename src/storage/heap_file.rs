use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{DbError, PageId, Permissions, Result, TableId, TransactionId};
use crate::tuple::{Schema, Tuple};

use super::disk::{DiskManager, DiskScheduler};
use super::page::{slots_per_page, HeapPage, MAX_SLOTS_PER_PAGE};

/// Stores one table's tuples as an unordered sequence of fixed-size pages.
///
/// The file itself only knows how to read and write whole pages. Tuple
/// placement goes through the buffer pool so that every page touched is
/// locked and cached on behalf of the calling transaction.
pub struct HeapFile {
    id: TableId,
    schema: Arc<Schema>,
    page_size: usize,
    scheduler: DiskScheduler,
}

impl HeapFile {
    /// Opens (creating if necessary) the heap file at `path`.
    ///
    /// The table id is derived from the canonical path, so reopening the
    /// same file yields the same id.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        let num_slots = slots_per_page(page_size, &schema);
        if num_slots == 0 {
            return Err(DbError::TupleTooLarge {
                tuple_size: schema.tuple_size(),
                page_size,
            });
        }
        if num_slots > MAX_SLOTS_PER_PAGE {
            return Err(DbError::TooManySlots {
                num_slots,
                page_size,
            });
        }

        let disk_manager = DiskManager::new(path.as_ref(), page_size)?;
        let canonical = std::fs::canonicalize(path.as_ref())?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        let id = TableId(hasher.finish() as u32);

        Ok(Self {
            id,
            schema,
            page_size,
            scheduler: DiskScheduler::new(Arc::new(disk_manager)),
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        self.scheduler.disk_manager().path()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file. Only grows.
    pub fn num_pages(&self) -> usize {
        self.scheduler.disk_manager().num_pages() as usize
    }

    /// Reads page `pid` from disk, bypassing the buffer pool.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        self.check_table(pid)?;
        let data = self.scheduler.schedule_read_sync(pid.page_no)?;
        HeapPage::from_bytes(pid, Arc::clone(&self.schema), self.page_size, &data)
    }

    /// Writes `page` back at its offset. Only the buffer pool calls this.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.check_table(page.id())?;
        let data = page.to_bytes()?;
        self.scheduler.schedule_write_sync(page.id().page_no, data)
    }

    /// Places `tuple` in the first page with a free slot, appending a page
    /// when every existing page is full. Sets the tuple's record id and
    /// returns the page that now holds it.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::SchemaMismatch);
        }

        for page_no in 0..self.num_pages() as u32 {
            let pid = PageId::new(self.id, page_no);
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            if Self::try_place(&page, tid, tuple)? {
                return Ok(vec![page]);
            }
        }

        loop {
            let page_no = self.scheduler.disk_manager().allocate_page()?;
            let pid = PageId::new(self.id, page_no);
            debug!(table = %self.id, page = %pid, "appended empty page");

            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            // A concurrent insert may fill the new page before we lock it
            if Self::try_place(&page, tid, tuple)? {
                return Ok(vec![page]);
            }
        }
    }

    /// Frees the slot named by the tuple's record id and returns the page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(DbError::TupleNotStored)?;
        let pid = record_id.page_id;
        if pid.table_id != self.id || pid.page_no as usize >= self.num_pages() {
            return Err(DbError::SlotNotOccupied(record_id));
        }

        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(Some(tid));
        }
        Ok(vec![page])
    }

    /// Returns a lazy scan over every stored tuple, in page order.
    pub fn iter<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, pool, tid)
    }

    fn try_place(page: &PageRef, tid: TransactionId, tuple: &mut Tuple) -> Result<bool> {
        let mut guard = page.write();
        if guard.num_empty_slots() == 0 {
            return Ok(false);
        }
        guard.insert_tuple(tuple)?;
        guard.mark_dirty(Some(tid));
        Ok(true)
    }

    fn check_table(&self, pid: PageId) -> Result<()> {
        if pid.table_id != self.id {
            return Err(DbError::WrongTable {
                page_id: pid,
                table_id: self.id,
            });
        }
        Ok(())
    }
}

/// Iterator over the tuples of a heap file.
///
/// Pages are fetched through the buffer pool with read permission, one at
/// a time, only once the previous page is exhausted. After an error the
/// iterator is finished until `rewind` is called.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    next_page: u32,
    current: std::vec::IntoIter<Tuple>,
    failed: bool,
}

impl<'a> HeapFileIterator<'a> {
    fn new(file: &'a HeapFile, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            next_page: 0,
            current: Vec::new().into_iter(),
            failed: false,
        }
    }

    /// Restarts the scan at page 0, fetching that page immediately.
    pub fn rewind(&mut self) -> Result<()> {
        self.next_page = 0;
        self.current = Vec::new().into_iter();
        self.failed = false;
        if self.file.num_pages() > 0 {
            if let Err(e) = self.load_next_page() {
                self.failed = true;
                return Err(e);
            }
        }
        Ok(())
    }

    fn load_next_page(&mut self) -> Result<()> {
        let pid = PageId::new(self.file.id(), self.next_page);
        let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
        self.current = tuples.into_iter();
        self.next_page += 1;
        Ok(())
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(tuple) = self.current.next() {
                return Some(Ok(tuple));
            }
            if self.next_page as usize >= self.file.num_pages() {
                return None;
            }
            if let Err(e) = self.load_next_page() {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::common::Config;
    use crate::tuple::{DataType, TupleBuilder};
    use tempfile::TempDir;

    const PAGE: usize = 64;

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Char(12))
            .build_arc()
    }

    fn setup(dir: &TempDir) -> (Arc<HeapFile>, BufferPool) {
        let file = Arc::new(HeapFile::open(dir.path().join("t.dat"), schema(), PAGE).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file), "t");
        let pool = BufferPool::new(&Config::new().with_page_size(PAGE), catalog);
        (file, pool)
    }

    fn row(id: i32) -> Tuple {
        TupleBuilder::new(schema())
            .value(id)
            .value(format!("row{}", id))
            .build()
            .unwrap()
    }

    #[test]
    fn test_open_rejects_oversized_tuples() {
        let dir = TempDir::new().unwrap();
        let wide = Schema::from_types(&[DataType::Char(100)]).into();
        let err = HeapFile::open(dir.path().join("w.dat"), wide, PAGE)
            .err()
            .unwrap();
        assert!(matches!(err, DbError::TupleTooLarge { .. }));
    }

    #[test]
    fn test_open_rejects_unaddressable_slot_counts() {
        let dir = TempDir::new().unwrap();
        let narrow: Arc<Schema> = Schema::from_types(&[DataType::Integer]).into();

        // 270336 * 8 / 33 is exactly 65536 slots
        HeapFile::open(dir.path().join("max.dat"), Arc::clone(&narrow), 270_336).unwrap();

        let err = HeapFile::open(dir.path().join("big.dat"), narrow, 300_000)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DbError::TooManySlots {
                num_slots: 72727,
                page_size: 300_000
            }
        ));
    }

    #[test]
    fn test_same_path_same_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.dat");
        let a = HeapFile::open(&path, schema(), PAGE).unwrap();
        let b = HeapFile::open(&path, schema(), PAGE).unwrap();
        let c = HeapFile::open(dir.path().join("u.dat"), schema(), PAGE).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_read_page_rejects_other_table() {
        let dir = TempDir::new().unwrap();
        let (file, _pool) = setup(&dir);
        let other = TableId(file.id().as_u32().wrapping_add(1));
        let err = file.read_page(PageId::new(other, 0)).unwrap_err();
        assert!(matches!(err, DbError::WrongTable { .. }));
    }

    #[test]
    fn test_insert_appends_pages() {
        let dir = TempDir::new().unwrap();
        let (file, pool) = setup(&dir);
        let tid = TransactionId::next_id();

        assert_eq!(file.num_pages(), 0);
        for i in 0..4 {
            let mut t = row(i);
            let pages = file.insert_tuple(&pool, tid, &mut t).unwrap();
            assert_eq!(pages.len(), 1);
            let rid = t.record_id().unwrap();
            assert_eq!(rid.page_id, pages[0].read().id());
            assert_eq!(pages[0].read().is_dirty(), Some(tid));
        }
        // 3 slots per page
        assert_eq!(file.num_pages(), 2);
    }

    #[test]
    fn test_scan_and_rewind() {
        let dir = TempDir::new().unwrap();
        let (file, pool) = setup(&dir);
        let tid = TransactionId::next_id();

        for i in 0..7 {
            file.insert_tuple(&pool, tid, &mut row(i)).unwrap();
        }

        let mut it = file.iter(&pool, tid);
        let ids: Vec<i32> = it
            .by_ref()
            .map(|t| t.unwrap().value(0).unwrap().as_integer().unwrap())
            .collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
        assert!(it.next().is_none());

        it.rewind().unwrap();
        assert_eq!(it.count(), 7);
    }

    #[test]
    fn test_delete_requires_record_id() {
        let dir = TempDir::new().unwrap();
        let (file, pool) = setup(&dir);
        let tid = TransactionId::next_id();

        let err = file.delete_tuple(&pool, tid, &row(1)).unwrap_err();
        assert!(matches!(err, DbError::TupleNotStored));
    }
}
