use std::collections::HashSet;

use crate::common::{LockMode, TransactionId};

/// Lock state for a single page.
///
/// A page is free, shared by any number of transactions, or exclusively
/// held by one. Keeping the exclusive holder in an `Option` means there
/// can never be two writers.
#[derive(Debug, Default)]
pub struct Lock {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl Lock {
    /// Grants `mode` to `tid` if compatible with the current holders.
    ///
    /// A sole shared holder is upgraded in place. Asking for shared access
    /// while holding the exclusive lock keeps the exclusive lock.
    pub fn try_grant(&mut self, tid: TransactionId, mode: LockMode) -> bool {
        match self.exclusive {
            Some(holder) => holder == tid,
            None => match mode {
                LockMode::Shared => {
                    self.shared.insert(tid);
                    true
                }
                LockMode::Exclusive => {
                    let sole_or_none = self.shared.is_empty()
                        || (self.shared.len() == 1 && self.shared.contains(&tid));
                    if sole_or_none {
                        self.shared.clear();
                        self.exclusive = Some(tid);
                    }
                    sole_or_none
                }
            },
        }
    }

    /// Drops whatever `tid` holds. Returns false if it held nothing.
    pub fn release(&mut self, tid: TransactionId) -> bool {
        if self.exclusive == Some(tid) {
            self.exclusive = None;
            true
        } else {
            self.shared.remove(&tid)
        }
    }

    pub fn holds(&self, tid: TransactionId) -> bool {
        self.mode_of(tid).is_some()
    }

    /// The mode in which `tid` holds this lock, if any.
    pub fn mode_of(&self, tid: TransactionId) -> Option<LockMode> {
        if self.exclusive == Some(tid) {
            Some(LockMode::Exclusive)
        } else if self.shared.contains(&tid) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    pub fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}
