use tracing::{error, warn};

use crate::buffer::{BufferPool, PageRef};
use crate::common::{PageId, Permissions, Result, TableId, TransactionId};
use crate::tuple::Tuple;

/// RAII handle for a transaction running against a buffer pool.
///
/// Finish it with `commit` or `abort`. A handle dropped without either is
/// aborted: its dirty pages are discarded and its locks released.
pub struct Transaction<'a> {
    id: TransactionId,
    pool: &'a BufferPool,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Starts a transaction with a fresh id.
    pub fn new(pool: &'a BufferPool) -> Self {
        Self {
            id: TransactionId::next_id(),
            pool,
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn get_page(&self, pid: PageId, perm: Permissions) -> Result<PageRef> {
        self.pool.get_page(self.id, pid, perm)
    }

    pub fn insert_tuple(&self, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        self.pool.insert_tuple(self.id, table_id, tuple)
    }

    pub fn delete_tuple(&self, tuple: &Tuple) -> Result<()> {
        self.pool.delete_tuple(self.id, tuple)
    }

    /// Flushes this transaction's pages and releases its locks.
    /// If the flush fails the handle is dropped and therefore aborted.
    pub fn commit(mut self) -> Result<()> {
        self.pool.transaction_complete(self.id, true)?;
        self.finished = true;
        Ok(())
    }

    /// Discards this transaction's pages and releases its locks.
    pub fn abort(mut self) -> Result<()> {
        self.finished = true;
        self.pool.transaction_complete(self.id, false)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(tid = %self.id, "transaction dropped without commit, aborting");
        if let Err(e) = self.pool.transaction_complete(self.id, false) {
            error!(tid = %self.id, error = %e, "implicit abort failed");
        }
    }
}
