//! # Lock Table
//!
//! The table maps every key that has ever been locked to a [`KeyLocks`] record. A record is created
//! the first time a key is acquired and stays in the table afterwards, even once its queue has
//! drained, unless it is explicitly compacted away.
//!
//! Each record keeps the FIFO request queue for its key next to the number of exclusive requests
//! in that queue. Both are only ever changed through [`KeyLocks::push`] and
//! [`KeyLocks::remove_first`], so they cannot drift apart.

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
};

use crate::base::{LockRequest, TxnId};

#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    /// Requests in arrival order. Appended at the back, removed from anywhere.
    queue: VecDeque<LockRequest>,
    /// Number of exclusive requests in `queue`, granted or not.
    exclusive_waiters: u32,
}

impl KeyLocks {
    #[inline]
    pub(crate) fn queue(&self) -> &VecDeque<LockRequest> {
        &self.queue
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<&LockRequest> {
        self.queue.front()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub(crate) fn exclusive_waiters(&self) -> u32 {
        self.exclusive_waiters
    }

    /// Returns `true` when nothing references this key anymore.
    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.exclusive_waiters == 0
    }

    pub(crate) fn push(&mut self, request: LockRequest) {
        if request.is_exclusive() {
            self.exclusive_waiters += 1;
        }
        self.queue.push_back(request);
    }

    /// Removes the first request owned by `txn`, scanning from the head.
    /// Returns the position the request was found at, together with the request itself.
    pub(crate) fn remove_first(&mut self, txn: TxnId) -> Option<(usize, LockRequest)> {
        let pos = self.queue.iter().position(|request| request.txn() == txn)?;
        let request = self.queue.remove(pos)?;
        if request.is_exclusive() {
            debug_assert!(self.exclusive_waiters > 0, "exclusive waiter count underflow");
            self.exclusive_waiters = self.exclusive_waiters.saturating_sub(1);
        }
        Some((pos, request))
    }
}

#[derive(Debug)]
pub(crate) struct LockTable<K> {
    entries: HashMap<K, KeyLocks>,
}

impl<K: Eq + Hash> LockTable<K> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the record for `key`, inserting an empty one on first reference.
    pub(crate) fn get_or_create(&mut self, key: K) -> &mut KeyLocks {
        self.entries.entry(key).or_default()
    }

    #[inline]
    pub(crate) fn get(&self, key: &K) -> Option<&KeyLocks> {
        self.entries.get(key)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut KeyLocks> {
        self.entries.get_mut(key)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops the record for `key` if it is idle. Returns `true` if it was removed.
    pub(crate) fn remove_if_idle(&mut self, key: &K) -> bool {
        if self.entries.get(key).is_some_and(KeyLocks::is_idle) {
            self.entries.remove(key);
            return true;
        }
        false
    }

    /// Drops every idle record and returns how many were removed.
    pub(crate) fn compact(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, locks| !locks.is_idle());
        before - self.entries.len()
    }
}
