use std::{collections::VecDeque, fmt, hash::Hash};

use crate::{
    base::{LockMode, LockRequest, LockResult, LockStatus, RequestMode, TxnId},
    config::LockManagerConfig,
    manager::{LockCore, LockManager},
    ready::ReadySink,
};

/// Lock manager that only knows exclusive locks.
///
/// Reads and writes are handled the same way: the head of a key's queue owns the key, everybody
/// behind it waits. Releasing the owner hands the key to the next request in line.
#[derive(Debug)]
pub struct ExclusiveLockManager<K, S = VecDeque<TxnId>> {
    core: LockCore<K, S>,
}

impl<K: Eq + Hash + fmt::Debug, S: ReadySink> ExclusiveLockManager<K, S> {
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
}

impl<K: Eq + Hash + fmt::Debug, S: ReadySink> LockManager<K> for ExclusiveLockManager<K, S> {
    fn acquire_write(&mut self, txn: TxnId, key: K) -> bool {
        trace!(%txn, ?key, "acquiring exclusive lock");
        let locks = self.core.table.get_or_create(key);
        let granted = locks.is_empty();
        locks.push(LockRequest::new(RequestMode::Exclusive, txn));
        if !granted {
            self.core.wait(txn);
        }
        granted
    }

    fn acquire_read(&mut self, txn: TxnId, key: K) -> bool {
        // no shared locks in this policy
        self.acquire_write(txn, key)
    }

    fn release(&mut self, txn: TxnId, key: &K) -> LockResult<()> {
        let Some(locks) = self.core.table.get_mut(key) else {
            return Err(self.core.not_held(txn, key));
        };
        let Some((pos, _)) = locks.remove_first(txn) else {
            return Err(self.core.not_held(txn, key));
        };
        trace!(%txn, ?key, pos, "released lock");

        if pos == 0 {
            // the owner left, the next request in line now owns the key
            if let Some(next) = locks.head().map(LockRequest::txn) {
                self.core.grant(next);
            }
        } else {
            self.core.abandon(txn);
        }

        self.core.released(key);
        Ok(())
    }

    fn status(&self, key: &K) -> LockStatus {
        match self.core.table.get(key).and_then(|locks| locks.head()) {
            Some(head) => LockStatus::new(LockMode::Exclusive, vec![head.txn()]),
            None => LockStatus::unlocked(),
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
