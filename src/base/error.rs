use crate::base::TxnId;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// A release was issued for a key on which the transaction has no queued request.
    /// The lock table is left untouched when this is returned.
    #[display("Lock not held: {txn} has no request queued on key {key}")]
    NotHeld { txn: TxnId, key: String },

    #[display("Lock dispatcher closed: the background task is no longer running")]
    DispatcherClosed,
}

pub type LockResult<T> = Result<T, LockError>;
