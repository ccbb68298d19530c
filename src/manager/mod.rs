//! # Lock Managers
//!
//! A lock manager grants or queues per-key locks for transactions whose read and write sets are
//! known up front. Every decision is a pure function of the order in which calls arrive: two
//! managers fed the same sequence of acquires and releases grant the same requests and push the
//! same transactions to their ready sinks, in the same order. This is what lets independent
//! replicas agree on a serialization without talking to each other.
//!
//! No call ever blocks. An acquire that cannot be granted right away is queued and counted against
//! the transaction's wait count. Once a later release grants the transaction's last waiting
//! request, the transaction is pushed to the [`ReadySink`] exactly once.
//!
//! Two grant policies are available:
//!
//! - [`ExclusiveLockManager`]: Every request is exclusive. A key is owned by the head of its queue.
//! - [`SharedLockManager`]: Readers share a key while no writer is queued on it. A queued writer
//!   blocks every reader that arrives after it, so writers cannot be starved by a steady stream of
//!   readers.
//!
//! Deadlock freedom is up to the caller, e.g. by acquiring every transaction's keys in the same
//! global order, which is what [`LockManager::acquire_set`] does.

use std::{fmt, hash::Hash};

use crate::{
    base::{LockError, LockResult, LockStatus, RequestMode, TxnId},
    config::LockManagerConfig,
    lockset::LockSet,
    ready::ReadySink,
    table::LockTable,
    wait::WaitCounter,
};

mod exclusive;
mod shared;

#[cfg(test)]
mod tests;

pub use exclusive::ExclusiveLockManager;
pub use shared::SharedLockManager;

pub trait LockManager<K> {
    /// Requests an exclusive lock on `key`. Returns `true` if it was granted right away.
    fn acquire_write(&mut self, txn: TxnId, key: K) -> bool;

    /// Requests a shared lock on `key`. Returns `true` if it was granted right away.
    fn acquire_read(&mut self, txn: TxnId, key: K) -> bool;

    /// Removes the first request of `txn` on `key` and grants whatever becomes grantable.
    ///
    /// Returns [`LockError::NotHeld`] without touching any state when `txn` has no request on
    /// `key`.
    fn release(&mut self, txn: TxnId, key: &K) -> LockResult<()>;

    /// Returns the current owners of `key`.
    fn status(&self, key: &K) -> LockStatus;

    /// Number of requests of `txn` that are queued but not yet granted.
    fn pending_count(&self, txn: TxnId) -> u32;

    /// Number of keys that currently have an entry in the lock table.
    fn key_count(&self) -> usize;

    /// Number of requests, granted or waiting, queued on `key`.
    fn queue_len(&self, key: &K) -> usize;

    /// Removes the table entries of all keys that have no requests left.
    /// Returns how many entries were removed.
    fn compact(&mut self) -> usize;

    fn acquire(&mut self, mode: RequestMode, txn: TxnId, key: K) -> bool {
        match mode {
            RequestMode::Shared => self.acquire_read(txn, key),
            RequestMode::Exclusive => self.acquire_write(txn, key),
        }
    }

    #[inline]
    fn is_waiting(&self, txn: TxnId) -> bool {
        self.pending_count(txn) > 0
    }

    /// Acquires every lock in `set` for `txn`, in ascending key order.
    ///
    /// Returns `true` when `txn` holds all of them now and may run. Otherwise it will be pushed to
    /// the ready sink once the last of its waiting requests is granted.
    fn acquire_set(&mut self, txn: TxnId, set: &LockSet<K>) -> bool
    where
        K: Ord + Clone,
    {
        for (key, mode) in set.requests() {
            self.acquire(mode, txn, key.clone());
        }
        !self.is_waiting(txn)
    }

    /// Releases every lock in `set` held by `txn`, in ascending key order.
    ///
    /// All keys are attempted, even after a failure. The first error is returned.
    fn release_set(&mut self, txn: TxnId, set: &LockSet<K>) -> LockResult<()>
    where
        K: Ord + Clone,
    {
        let mut result = Ok(());
        for (key, _) in set.requests() {
            if let Err(err) = self.release(txn, key)
                && result.is_ok()
            {
                result = Err(err);
            }
        }
        result
    }
}

/// State shared by both grant policies: the lock table, the wait counter and the ready sink.
#[derive(Debug)]
pub(crate) struct LockCore<K, S> {
    table: LockTable<K>,
    waits: WaitCounter,
    ready: S,
    compact_on_release: bool,
}

impl<K: Eq + Hash + fmt::Debug, S: ReadySink> LockCore<K, S> {
    pub(crate) fn new(config: &LockManagerConfig, ready: S) -> Self {
        Self {
            table: LockTable::with_capacity(config.initial_capacity),
            waits: WaitCounter::default(),
            ready,
            compact_on_release: config.compact_on_release,
        }
    }

    /// Counts one more waiting request for `txn`.
    fn wait(&mut self, txn: TxnId) {
        let pending = self.waits.add(txn);
        trace!(%txn, pending, "request queued");
    }

    /// A waiting request of `txn` has just been granted. Pushes `txn` to the ready sink if it was
    /// the last one.
    fn grant(&mut self, txn: TxnId) {
        match self.waits.remove_one(txn) {
            Some(0) => {
                debug!(%txn, waiting = self.waits.len(), "transaction ready");
                self.ready.push_ready(txn);
            }
            Some(pending) => trace!(%txn, pending, "request granted, still waiting"),
            None => {}
        }
    }

    /// A waiting request of `txn` was released before it was ever granted.
    fn abandon(&mut self, txn: TxnId) {
        if let Some(pending) = self.waits.remove_one(txn) {
            debug!(%txn, pending, "waiting request released before grant");
        }
    }

    fn not_held(&self, txn: TxnId, key: &K) -> LockError {
        warn!(%txn, ?key, "release of a lock that is not held");
        LockError::NotHeld {
            txn,
            key: format!("{key:?}"),
        }
    }

    /// Housekeeping after a successful release on `key`.
    fn released(&mut self, key: &K) {
        if self.compact_on_release && self.table.remove_if_idle(key) {
            trace!(?key, "dropped idle table entry");
        }
    }

    fn pending_count(&self, txn: TxnId) -> u32 {
        self.waits.get(txn)
    }

    fn queue_len(&self, key: &K) -> usize {
        self.table.get(key).map_or(0, |locks| locks.len())
    }

    fn compact(&mut self) -> usize {
        let removed = self.table.compact();
        debug!(removed, remaining = self.table.len(), "compacted lock table");
        removed
    }

    pub(crate) fn ready(&self) -> &S {
        &self.ready
    }

    pub(crate) fn ready_mut(&mut self) -> &mut S {
        &mut self.ready
    }

    pub(crate) fn into_ready(self) -> S {
        self.ready
    }
}
