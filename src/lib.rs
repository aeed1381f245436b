//! Heapstore - a transactional page store for fixed-schema tables
//!
//! Tables are heap files of fixed-size pages. All page access goes through
//! a bounded buffer pool, and every access is gated by page-level two-phase
//! locking so concurrent transactions see serializable page contents.
//!
//! # Architecture
//!
//! - **Tuples** (`tuple`): schemas, typed values and fixed-width tuples
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Reads and writes pages to/from a table file
//!   - `DiskScheduler`: Background worker that performs disk I/O
//!   - `HeapPage`: Slot bitmap plus fixed-width tuple slots
//!   - `HeapFile`: Unordered sequence of pages holding one table
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPool`: Caches pages, tracks dirty pages and commits or aborts transactions
//!   - `LruReplacer`: Least-recently-used ordering used to pick clean victims
//!
//! - **Transactions** (`transaction`): `LockManager` grants shared and
//!   exclusive page locks with timeout-based deadlock breaking
//!
//! - **Catalog** (`catalog`): Maps table ids and names to heap files
//!
//! Dirty pages are never evicted and never written before commit, so an
//! aborted transaction leaves the files untouched. There is no log, so a
//! crash during a commit can leave a partially written transaction.
//!
//! # Example
//!
//! ```rust,no_run
//! use heapstore::tuple::{DataType, Schema, TupleBuilder};
//! use heapstore::{Config, Database};
//!
//! let db = Database::new(Config::default());
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(32))
//!     .build_arc();
//! let table = db.create_table("people.dat", "people", schema.clone()).unwrap();
//!
//! let txn = db.begin();
//! let mut row = TupleBuilder::new(schema).value(1).value("Ada").build().unwrap();
//! txn.insert_tuple(table, &mut row).unwrap();
//! txn.commit().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod database;
pub mod storage;
pub mod transaction;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use buffer::{BufferPool, PageRef};
pub use catalog::Catalog;
pub use common::{
    Config, DbError, LockMode, PageId, Permissions, RecordId, Result, SlotId, TableId,
    TransactionId,
};
pub use database::Database;
pub use storage::HeapFile;
pub use transaction::{LockManager, Transaction};
