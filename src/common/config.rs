use std::time::Duration;

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity (number of cached pages)
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Default time a transaction waits for a conflicting page lock before aborting
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Default interval at which a blocked lock request re-checks the lock state
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default width in bytes of a string column
pub const DEFAULT_STRING_LEN: u16 = 128;

/// Runtime configuration for a database instance.
///
/// Every value is per-instance, so tests can run pools with different page
/// sizes and capacities side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bytes per page, including the slot bitmap
    pub page_size: usize,
    /// Maximum number of pages resident in the buffer pool
    pub pool_pages: usize,
    /// Upper bound on how long `acquire_lock` blocks
    pub lock_timeout: Duration,
    /// How often a blocked lock request re-evaluates its predicate
    pub lock_poll_interval: Duration,
    /// Random extra wait added to each lock deadline (zero disables)
    pub lock_timeout_jitter: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    pub fn with_lock_timeout_jitter(mut self, jitter: Duration) -> Self {
        self.lock_timeout_jitter = jitter;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            lock_timeout_jitter: Duration::ZERO,
        }
    }
}
