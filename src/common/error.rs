use thiserror::Error;

use super::types::{LockMode, PageId, RecordId, TableId, TransactionId};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tid} aborted: timed out waiting for {mode} lock on {page_id}")]
    TransactionAborted {
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    },

    #[error("Buffer pool is full, all {capacity} cached pages are dirty")]
    NoEvictablePage { capacity: usize },

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table '{0}' not found")]
    TableNameNotFound(String),

    #[error("Page {page_id} does not belong to table {table_id}")]
    WrongTable { page_id: PageId, table_id: TableId },

    #[error("Record {0} does not refer to an occupied slot")]
    SlotNotOccupied(RecordId),

    #[error("Tuple has no record id")]
    TupleNotStored,

    #[error("Page {0} has no empty slot")]
    PageFull(PageId),

    #[error("Tuple schema does not match table schema")]
    SchemaMismatch,

    #[error("Value {value} does not fit column type {data_type}")]
    TypeMismatch { value: String, data_type: String },

    #[error("{tid} holds no lock on {page_id}")]
    LockNotHeld { tid: TransactionId, page_id: PageId },

    #[error("Tuple size {tuple_size} does not fit in a page of {page_size} bytes")]
    TupleTooLarge { tuple_size: usize, page_size: usize },

    #[error("A page of {page_size} bytes would hold {num_slots} slots, more than slot ids can address")]
    TooManySlots { num_slots: usize, page_size: usize },

    #[error("Corrupted page {page_id}: {reason}")]
    CorruptedPage { page_id: PageId, reason: String },

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),
}

impl DbError {
    /// True for lock timeouts; the caller should abort and may retry the transaction.
    pub fn is_transaction_aborted(&self) -> bool {
        matches!(self, DbError::TransactionAborted { .. })
    }

    /// True for errors that indicate caller misuse rather than a runtime condition.
    pub fn is_consistency_fault(&self) -> bool {
        matches!(
            self,
            DbError::SlotNotOccupied(_)
                | DbError::TupleNotStored
                | DbError::LockNotHeld { .. }
                | DbError::WrongTable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
