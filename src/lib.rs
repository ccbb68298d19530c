//! # Deterministic Lock Manager
//!
//! Lock management for transaction engines that order transactions ahead of time. Each
//! transaction declares its read and write set before it runs. The scheduler acquires those keys
//! on a lock manager in a fixed order, and the manager grants or queues every request based on
//! nothing but that order. Replicas that replay the same batch of transactions therefore grant
//! the same locks, wake the same transactions, and end up with the same serialization.
//!
//! ## Layout
//!
//! - [`base`]: transaction ids, lock modes, requests and status results.
//! - [`manager`]: the [`LockManager`] trait and its two grant policies,
//!   [`ExclusiveLockManager`] and [`SharedLockManager`].
//! - [`ready`]: the [`ReadySink`] that receives transactions once they hold all their locks.
//! - [`lockset`]: a transaction's read/write set, acquired in ascending key order.
//! - [`dispatcher`]: a background task that serializes calls from many tasks onto one manager.
//! - [`config`]: [`LockManagerConfig`] for picking a policy and sizing the lock table.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::collections::VecDeque;
//!
//! use detlock::{LockManager, LockManagerConfig, SharedLockManager, TxnId};
//!
//! let mut manager: SharedLockManager<&str> =
//!     SharedLockManager::new(&LockManagerConfig::default(), VecDeque::new());
//! let (t1, t2) = (TxnId::new(1), TxnId::new(2));
//!
//! assert!(manager.acquire_write(t1, "account:7"));
//! assert!(!manager.acquire_read(t2, "account:7"));
//!
//! manager.release(t1, &"account:7").unwrap();
//! assert_eq!(manager.ready_mut().pop_front(), Some(t2));
//! ```
//!
//! ## Non-goals
//!
//! There is no deadlock detection, no lock timeout and no table or range locking. Deadlocks are
//! avoided by acquiring keys in one global order, see [`LockManager::acquire_set`].

#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate tracing;

pub mod base;
pub mod config;
pub mod dispatcher;
pub mod lockset;
pub mod manager;
pub mod ready;

mod table;
mod wait;

pub use base::{LockError, LockMode, LockRequest, LockResult, LockStatus, RequestMode, TxnId};
pub use config::{GrantPolicy, LockManagerConfig};
pub use dispatcher::LockHandle;
pub use lockset::LockSet;
pub use manager::{ExclusiveLockManager, LockManager, SharedLockManager};
pub use ready::ReadySink;

#[cfg(test)]
mod tests {
    use tracing_subscriber::EnvFilter;

    /// Installs a test-friendly subscriber. Safe to call from every test.
    pub(crate) fn setup_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}
