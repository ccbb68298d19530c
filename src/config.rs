use std::{fmt, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::{
    manager::{ExclusiveLockManager, LockManager, SharedLockManager},
    ready::ReadySink,
};

/// Which grant policy a lock manager uses.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GrantPolicy {
    /// Every request is treated as exclusive, a key has at most one owner.
    ExclusiveOnly,
    /// Readers share a key, writers own it alone. New readers queue up behind any waiting writer.
    #[default]
    SharedExclusive,
}

/// Configuration for a lock manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockManagerConfig {
    pub policy: GrantPolicy,
    /// Number of keys the lock table reserves room for up front.
    pub initial_capacity: usize,
    /// Drop a key's table entry as soon as its last request is released.
    pub compact_on_release: bool,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            policy: GrantPolicy::SharedExclusive,
            initial_capacity: 1024,
            compact_on_release: false,
        }
    }
}

impl LockManagerConfig {
    /// A config tuned for fast testing.
    ///
    /// - **initial_capacity:** Tiny, so the table has to grow during tests.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            initial_capacity: 4,
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: GrantPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_compact_on_release(mut self, compact_on_release: bool) -> Self {
        self.compact_on_release = compact_on_release;
        self
    }

    /// Builds a lock manager with the configured policy that pushes ready transactions to `ready`.
    pub fn build<K, S>(&self, ready: S) -> Box<dyn LockManager<K> + Send>
    where
        K: Eq + Hash + fmt::Debug + Send + 'static,
        S: ReadySink + Send + 'static,
    {
        debug!(policy = %self.policy, capacity = self.initial_capacity, "building lock manager");
        match self.policy {
            GrantPolicy::ExclusiveOnly => Box::new(ExclusiveLockManager::new(self, ready)),
            GrantPolicy::SharedExclusive => Box::new(SharedLockManager::new(self, ready)),
        }
    }
}
