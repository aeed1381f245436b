use std::collections::{BTreeMap, HashMap};

use crate::common::PageId;

/// Least-recently-used ordering over cached pages.
///
/// Every access stamps the page with a monotonically increasing clock
/// value; the oldest stamp is the eviction candidate. The replacer is not
/// synchronized itself and lives inside the buffer pool's cache mutex.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Current logical time
    clock: u64,
    /// Latest access time of each tracked page
    last_access: HashMap<PageId, u64>,
    /// Tracked pages ordered by last access, oldest first
    order: BTreeMap<u64, PageId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pid` as the most recently used page.
    pub fn record_access(&mut self, pid: PageId) {
        self.clock += 1;
        if let Some(previous) = self.last_access.insert(pid, self.clock) {
            self.order.remove(&previous);
        }
        self.order.insert(self.clock, pid);
    }

    /// Stops tracking `pid`. Returns false if it was not tracked.
    pub fn remove(&mut self, pid: PageId) -> bool {
        match self.last_access.remove(&pid) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the least recently used page for which
    /// `evictable` holds, skipping any for which it does not.
    pub fn victim<F>(&mut self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(&PageId) -> bool,
    {
        let (stamp, pid) = self
            .order
            .iter()
            .find(|(_, pid)| evictable(pid))
            .map(|(stamp, pid)| (*stamp, *pid))?;
        self.order.remove(&stamp);
        self.last_access.remove(&pid);
        Some(pid)
    }

    pub fn len(&self) -> usize {
        self.last_access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_access.is_empty()
    }

    pub fn contains(&self, pid: PageId) -> bool {
        self.last_access.contains_key(&pid)
    }
}
