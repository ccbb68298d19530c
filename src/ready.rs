//! # Ready Sink
//!
//! Transactions whose last waiting request gets granted are handed to a [`ReadySink`]. The sink is
//! owned by whoever drives the lock manager; the manager only ever appends to it.
//!
//! Implementations are provided for plain queues, for use from a single scheduling thread, and
//! for an unbounded [`tokio`] channel sender, for when the scheduler drains ready transactions on
//! another task.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::base::TxnId;

pub trait ReadySink {
    /// Appends `txn`, whose wait count just dropped to zero.
    fn push_ready(&mut self, txn: TxnId);
}

impl ReadySink for VecDeque<TxnId> {
    fn push_ready(&mut self, txn: TxnId) {
        self.push_back(txn);
    }
}

impl ReadySink for Vec<TxnId> {
    fn push_ready(&mut self, txn: TxnId) {
        self.push(txn);
    }
}

impl ReadySink for mpsc::UnboundedSender<TxnId> {
    fn push_ready(&mut self, txn: TxnId) {
        if self.send(txn).is_err() {
            warn!(%txn, "could not push ready transaction: receiver closed");
        }
    }
}

impl<S: ReadySink + ?Sized> ReadySink for &mut S {
    fn push_ready(&mut self, txn: TxnId) {
        (**self).push_ready(txn);
    }
}

impl<S: ReadySink + ?Sized> ReadySink for Box<S> {
    fn push_ready(&mut self, txn: TxnId) {
        (**self).push_ready(txn);
    }
}
