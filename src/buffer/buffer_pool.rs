use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::common::{Config, DbError, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::page::HeapPage;
use crate::transaction::LockManager;
use crate::tuple::Tuple;

use super::LruReplacer;

/// Shared handle to a cached page.
///
/// The `RwLock` is a short-term latch guarding the page contents while
/// they are read or modified. Transactional isolation comes from the lock
/// manager, not from this latch. Never call into the buffer pool while
/// holding it.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Cache contents, guarded by the pool's mutex
struct PoolState {
    /// Resident pages
    pages: HashMap<PageId, PageRef>,
    /// Recency order for eviction
    replacer: LruReplacer,
}

/// BufferPool caches pages in memory and mediates every page access.
///
/// A page is only handed out after the requesting transaction holds the
/// matching lock. Dirty pages are never evicted (NO-STEAL): they stay
/// resident until their transaction commits (flush) or aborts (discard),
/// which is when its locks are finally released.
pub struct BufferPool {
    /// Maximum number of resident pages
    capacity: usize,
    /// Cache contents
    state: Mutex<PoolState>,
    /// Page locks
    lock_manager: LockManager,
    /// Resolves a page's owning heap file
    catalog: Arc<Catalog>,
}

impl BufferPool {
    pub fn new(config: &Config, catalog: Arc<Catalog>) -> Self {
        Self {
            capacity: config.pool_pages,
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.pool_pages),
                replacer: LruReplacer::new(),
            }),
            lock_manager: LockManager::with_config(config),
            catalog,
        }
    }

    /// Returns page `pid` after locking it for `tid` in the mode implied by
    /// `perm`, loading it from disk (and evicting a clean page) on a miss.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<PageRef> {
        self.lock_manager.acquire_lock(tid, pid, perm.into())?;

        let mut state = self.state.lock();
        if let Some(page) = state.pages.get(&pid).cloned() {
            state.replacer.record_access(pid);
            return Ok(page);
        }

        let file = self.catalog.database_file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        self.make_room(&mut state)?;
        state.pages.insert(pid, Arc::clone(&page));
        state.replacer.record_access(pid);
        Ok(page)
    }

    /// Adds `tuple` to table `table_id` on behalf of `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let file = self.catalog.database_file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.cache_dirtied(tid, pages)
    }

    /// Removes `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::TupleNotStored)?;
        let file = self
            .catalog
            .database_file(record_id.page_id.table_id)
            .map_err(|_| DbError::SlotNotOccupied(record_id))?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.cache_dirtied(tid, pages)
    }

    /// Writes page `pid` to disk if it is cached and dirty.
    /// On failure the page stays cached and dirty.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let state = self.state.lock();
        match state.pages.get(&pid) {
            Some(page) => self.write_back(page),
            None => Ok(()),
        }
    }

    /// Flushes every page `tid` holds an exclusive lock on.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for pid in self.lock_manager.exclusive_locked_page_ids(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops page `pid` from the cache without writing it back.
    pub fn discard_page(&self, pid: PageId) {
        let mut state = self.state.lock();
        if let Some(page) = state.pages.remove(&pid) {
            state.replacer.remove(pid);
            page.write().mark_dirty(None);
            debug!(page = %pid, "discarded page");
        }
    }

    /// Ends transaction `tid`. A commit flushes the pages it locked
    /// exclusively; an abort discards them. Locks are released last, and
    /// are kept if the commit flush fails.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let pages = self.lock_manager.exclusive_locked_page_ids(tid);

        if commit {
            for pid in &pages {
                self.flush_page(*pid)?;
            }
        } else {
            for pid in &pages {
                self.discard_page(*pid);
            }
        }

        self.lock_manager.release_all_locks(tid);
        debug!(%tid, commit, pages = pages.len(), "transaction complete");
        Ok(())
    }

    /// Commits `tid`.
    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, true)
    }

    /// Releases a single lock before the transaction ends. This breaks
    /// two-phase locking and is only safe for pages `tid` did not modify.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        self.lock_manager.release_lock(tid, pid)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Writes every dirty cached page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            self.write_back(page)?;
        }
        Ok(())
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.state.lock().pages.contains_key(&pid)
    }

    /// Number of resident pages.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Marks pages modified by `tid` dirty and makes sure they are cached
    /// as most recently used.
    fn cache_dirtied(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        for page in pages {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(Some(tid));
                guard.id()
            };

            let mut state = self.state.lock();
            let cached = state
                .pages
                .get(&pid)
                .is_some_and(|resident| Arc::ptr_eq(resident, &page));
            if !cached {
                if !state.pages.contains_key(&pid) {
                    self.make_room(&mut state)?;
                }
                state.pages.insert(pid, page);
            }
            state.replacer.record_access(pid);
        }
        Ok(())
    }

    /// Evicts clean pages until there is room for one more.
    fn make_room(&self, state: &mut PoolState) -> Result<()> {
        while state.pages.len() >= self.capacity {
            let PoolState { pages, replacer } = &mut *state;
            // A page latched for writing is being modified, so skip it too
            let victim = replacer.victim(|pid| {
                pages
                    .get(pid)
                    .and_then(|page| page.try_read().map(|p| p.is_dirty().is_none()))
                    .unwrap_or(false)
            });

            match victim {
                Some(pid) => {
                    pages.remove(&pid);
                    debug!(page = %pid, "evicted clean page");
                }
                None => {
                    warn!(capacity = self.capacity, "no clean page to evict");
                    return Err(DbError::NoEvictablePage {
                        capacity: self.capacity,
                    });
                }
            }
        }
        Ok(())
    }

    fn write_back(&self, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        if guard.is_dirty().is_none() {
            return Ok(());
        }
        let file = self.catalog.database_file(guard.id().table_id)?;
        file.write_page(&guard)?;
        guard.mark_dirty(None);
        debug!(page = %guard.id(), "flushed page");
        Ok(())
    }
}
