use std::{collections::VecDeque, fmt, hash::Hash};

use crate::{
    base::{LockMode, LockRequest, LockResult, LockStatus, RequestMode, TxnId},
    config::LockManagerConfig,
    manager::{LockCore, LockManager},
    ready::ReadySink,
};

/// Lock manager with shared and exclusive locks.
///
/// # Ownership
///
/// The owners of a key are the granted prefix of its queue:
///
/// - a run of shared requests starting at the head, or
/// - a single exclusive request at the head.
///
/// Anything behind that prefix waits. An exclusive request can only ever own a key from the head
/// of its queue.
///
/// # Writer Starvation
///
/// A new shared request on a locked key is only granted if no exclusive request is queued on that
/// key at all, even when it would be compatible with the current shared owners. As soon as a
/// writer waits, every later reader lines up behind it, so the writer gets the key once the
/// readers ahead of it are done.
///
/// | Requested \ Queue | empty | only S | any X |
/// |-------------------|-------|--------|-------|
/// |         S         |  Yes  |  Yes   |  No   |
/// |         X         |  Yes  |  No    |  No   |
#[derive(Debug)]
pub struct SharedLockManager<K, S = VecDeque<TxnId>> {
    core: LockCore<K, S>,
}

/// Returns the length of the granted prefix of `queue` and the mode it is held in.
fn granted_prefix(queue: &VecDeque<LockRequest>) -> (usize, LockMode) {
    let mut shared = 0;
    for request in queue {
        match request.mode() {
            RequestMode::Shared => shared += 1,
            RequestMode::Exclusive if shared == 0 => return (1, LockMode::Exclusive),
            RequestMode::Exclusive => break,
        }
    }
    if shared == 0 {
        (0, LockMode::Unlocked)
    } else {
        (shared, LockMode::Shared)
    }
}

impl<K: Eq + Hash + fmt::Debug, S: ReadySink> SharedLockManager<K, S> {
    pub fn new(config: &LockManagerConfig, ready: S) -> Self {
        Self {
            core: LockCore::new(config, ready),
        }
    }

    /// The sink ready transactions are pushed to.
    pub fn ready(&self) -> &S {
        self.core.ready()
    }

    pub fn ready_mut(&mut self) -> &mut S {
        self.core.ready_mut()
    }

    pub fn into_ready(self) -> S {
        self.core.into_ready()
    }

    /// Number of exclusive requests, granted or waiting, queued on `key`.
    pub fn exclusive_waiters(&self, key: &K) -> u32 {
        self.core
            .table
            .get(key)
            .map_or(0, |locks| locks.exclusive_waiters())
    }

    fn add_lock(&mut self, mode: RequestMode, txn: TxnId, key: K) -> bool {
        trace!(%txn, ?key, %mode, "acquiring lock");
        let locks = self.core.table.get_or_create(key);

        // an empty queue means the key is unlocked, anything else is held by someone
        let granted = locks.is_empty()
            || match mode {
                RequestMode::Shared => locks.exclusive_waiters() == 0,
                RequestMode::Exclusive => false,
            };
        locks.push(LockRequest::new(mode, txn));

        if !granted {
            self.core.wait(txn);
        }
        granted
    }
}

impl<K: Eq + Hash + fmt::Debug, S: ReadySink> LockManager<K> for SharedLockManager<K, S> {
    fn acquire_write(&mut self, txn: TxnId, key: K) -> bool {
        self.add_lock(RequestMode::Exclusive, txn, key)
    }

    fn acquire_read(&mut self, txn: TxnId, key: K) -> bool {
        self.add_lock(RequestMode::Shared, txn, key)
    }

    fn release(&mut self, txn: TxnId, key: &K) -> LockResult<()> {
        let Some(locks) = self.core.table.get_mut(key) else {
            return Err(self.core.not_held(txn, key));
        };
        let (owned, _) = granted_prefix(locks.queue());
        let Some((pos, removed)) = locks.remove_first(txn) else {
            return Err(self.core.not_held(txn, key));
        };
        trace!(%txn, ?key, mode = %removed.mode(), pos, "released lock");

        // Owners that survive the release keep their place at the front of the queue. Everybody
        // past them in the new prefix has just been granted.
        let was_owner = pos < owned;
        let survivors = if was_owner { owned - 1 } else { owned };
        let (now_owned, _) = granted_prefix(locks.queue());
        let granted: Vec<TxnId> = locks
            .queue()
            .iter()
            .take(now_owned)
            .skip(survivors)
            .map(LockRequest::txn)
            .collect();

        if !was_owner {
            self.core.abandon(txn);
        }
        for owner in granted {
            self.core.grant(owner);
        }

        self.core.released(key);
        Ok(())
    }

    fn status(&self, key: &K) -> LockStatus {
        let Some(locks) = self.core.table.get(key) else {
            return LockStatus::unlocked();
        };
        match granted_prefix(locks.queue()) {
            (_, LockMode::Unlocked) => LockStatus::unlocked(),
            (owned, mode) => LockStatus::new(
                mode,
                locks
                    .queue()
                    .iter()
                    .take(owned)
                    .map(LockRequest::txn)
                    .collect(),
            ),
        }
    }

    fn pending_count(&self, txn: TxnId) -> u32 {
        self.core.pending_count(txn)
    }

    fn key_count(&self) -> usize {
        self.core.table.len()
    }

    fn queue_len(&self, key: &K) -> usize {
        self.core.queue_len(key)
    }

    fn compact(&mut self) -> usize {
        self.core.compact()
    }
}
