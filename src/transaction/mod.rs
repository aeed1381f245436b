mod lock;
mod lock_manager;
mod transaction;

pub use lock::Lock;
pub use lock_manager::LockManager;
pub use transaction::Transaction;
