use std::io;

use crate::page_id::HeapPageId;

/// Closed set of error kinds surfaced by the storage and execution core.
///
/// `TxnAborted` is recovered by the transaction driver (the caller is
/// expected to treat its transaction as dead and call
/// `BufferPool::transaction_complete(tid, false)`); the rest are surfaced to
/// the caller. No error is ever swallowed silently.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid page {0:?}: page number exceeds file length or a short read occurred")]
    InvalidPage(HeapPageId),

    #[error("page {0:?} has no free slot for insertion")]
    SlotFull(HeapPageId),

    #[error("tuple's record id does not refer to a set slot on the expected page")]
    TupleNotFound,

    #[error("transaction {0} aborted waiting for a lock")]
    TxnAborted(u64),

    #[error("buffer pool is full and every resident page is dirty")]
    NoSpace,

    #[error("inserted tuple's descriptor disagrees with the target table's descriptor")]
    SchemaMismatch,

    #[error("disk I/O failure: {0}")]
    IoError(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
