//! Page-level two-phase locking.
//!
//! All lock state lives behind one mutex. A blocked request parks on a
//! condition variable tied to that mutex, wakes at least every poll
//! interval, and gives up with `TransactionAborted` once its deadline
//! passes. The timeout is the only deadlock breaker; there is no
//! wait-for graph.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::common::{
    Config, DbError, LockMode, PageId, Result, TransactionId, DEFAULT_LOCK_POLL_INTERVAL,
    DEFAULT_LOCK_TIMEOUT,
};

use super::Lock;

#[derive(Default)]
struct LockTable {
    /// Lock state per page; free locks are removed
    locks: HashMap<PageId, Lock>,
    /// Pages each transaction holds a lock on
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn try_grant(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let granted = self.locks.entry(pid).or_default().try_grant(tid, mode);
        if granted {
            self.held.entry(tid).or_default().insert(pid);
        }
        granted
    }

    fn release(&mut self, tid: TransactionId, pid: PageId) -> bool {
        let Some(lock) = self.locks.get_mut(&pid) else {
            return false;
        };
        if !lock.release(tid) {
            return false;
        }
        if lock.is_free() {
            self.locks.remove(&pid);
        }
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&pid);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }
        true
    }

    fn mode_of(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.locks.get(&pid).and_then(|lock| lock.mode_of(tid))
    }
}

/// Grants shared and exclusive page locks to transactions.
pub struct LockManager {
    table: Mutex<LockTable>,
    /// Signalled on every release
    released: Condvar,
    timeout: Duration,
    poll_interval: Duration,
    jitter: Duration,
}

impl LockManager {
    /// Creates a lock manager with the default timeout and poll interval.
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_LOCK_TIMEOUT, DEFAULT_LOCK_POLL_INTERVAL, Duration::ZERO)
    }

    pub fn with_config(config: &Config) -> Self {
        Self::with_timeouts(
            config.lock_timeout,
            config.lock_poll_interval,
            config.lock_timeout_jitter,
        )
    }

    pub fn with_timeouts(timeout: Duration, poll_interval: Duration, jitter: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
            poll_interval,
            jitter,
        }
    }

    /// Blocks until `tid` holds `pid` in `mode` or the lock timeout
    /// expires, in which case the transaction must be aborted.
    pub fn acquire_lock(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<()> {
        let deadline = Instant::now() + self.timeout + self.random_jitter();
        let mut table = self.table.lock();
        let mut waited = false;

        loop {
            if table.try_grant(tid, pid, mode) {
                if waited {
                    debug!(%tid, page = %pid, %mode, "lock granted after wait");
                } else {
                    trace!(%tid, page = %pid, %mode, "lock granted");
                }
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(%tid, page = %pid, %mode, "lock wait timed out");
                return Err(DbError::TransactionAborted {
                    tid,
                    page_id: pid,
                    mode,
                });
            }

            if !waited {
                debug!(%tid, page = %pid, %mode, "waiting for lock");
                waited = true;
            }
            let wake_at = (now + self.poll_interval).min(deadline);
            self.released.wait_until(&mut table, wake_at);
        }
    }

    /// Releases the lock `tid` holds on `pid`.
    pub fn release_lock(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        let released = self.table.lock().release(tid, pid);
        if !released {
            return Err(DbError::LockNotHeld { tid, page_id: pid });
        }
        trace!(%tid, page = %pid, "lock released");
        self.released.notify_all();
        Ok(())
    }

    /// Releases every lock held by `tid`.
    pub fn release_all_locks(&self, tid: TransactionId) {
        {
            let mut table = self.table.lock();
            let Some(pages) = table.held.remove(&tid) else {
                return;
            };
            for pid in pages {
                if let Some(lock) = table.locks.get_mut(&pid) {
                    lock.release(tid);
                    if lock.is_free() {
                        table.locks.remove(&pid);
                    }
                }
            }
        }
        trace!(%tid, "all locks released");
        self.released.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.table.lock().mode_of(tid, pid).is_some()
    }

    /// The mode in which `tid` holds `pid`, if at all.
    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.table.lock().mode_of(tid, pid)
    }

    /// Pages on which `tid` holds any lock.
    pub fn locked_pages(&self, tid: TransactionId) -> HashSet<PageId> {
        self.table.lock().held.get(&tid).cloned().unwrap_or_default()
    }

    /// Pages `tid` holds exclusively, i.e. the pages it may have dirtied.
    pub fn exclusive_locked_page_ids(&self, tid: TransactionId) -> HashSet<PageId> {
        let table = self.table.lock();
        let Some(pages) = table.held.get(&tid) else {
            return HashSet::new();
        };
        pages
            .iter()
            .copied()
            .filter(|pid| table.mode_of(tid, *pid) == Some(LockMode::Exclusive))
            .collect()
    }

    fn random_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=self.jitter)
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
