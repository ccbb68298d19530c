use std::collections::BTreeSet;

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::base::RequestMode;

/// The keys a transaction reads and writes, known before it runs.
///
/// A key that is both read and written is locked once, exclusively. Requests are produced in
/// ascending key order, so every transaction locks its keys in one global order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSet<K: Ord> {
    reads: BTreeSet<K>,
    writes: BTreeSet<K>,
}

impl<K: Ord> Default for LockSet<K> {
    fn default() -> Self {
        Self {
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
        }
    }
}

impl<K: Ord> LockSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read(mut self, key: K) -> Self {
        self.reads.insert(key);
        self
    }

    pub fn with_write(mut self, key: K) -> Self {
        self.writes.insert(key);
        self
    }

    pub fn insert_read(&mut self, key: K) {
        self.reads.insert(key);
    }

    pub fn insert_write(&mut self, key: K) {
        self.writes.insert(key);
    }

    /// Number of distinct keys in this set.
    pub fn len(&self) -> usize {
        self.requests().count()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Every key in this set together with the mode it gets locked in, in ascending key order.
    pub fn requests(&self) -> impl Iterator<Item = (&K, RequestMode)> {
        self.reads
            .iter()
            .merge_join_by(self.writes.iter(), |read, write| read.cmp(write))
            .map(|entry| match entry {
                EitherOrBoth::Left(key) => (key, RequestMode::Shared),
                EitherOrBoth::Right(key) | EitherOrBoth::Both(_, key) => {
                    (key, RequestMode::Exclusive)
                }
            })
    }
}

impl<K: Ord> FromIterator<(K, RequestMode)> for LockSet<K> {
    fn from_iter<I: IntoIterator<Item = (K, RequestMode)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, mode) in iter {
            match mode {
                RequestMode::Shared => set.insert_read(key),
                RequestMode::Exclusive => set.insert_write(key),
            }
        }
        set
    }
}
