//! This module contains base types that are used across the lock manager.
//!
//! - [`TxnId`]: The identity of a transaction. The lock manager never looks inside a transaction,
//!   it only compares these ids and hands them back through [`LockStatus`] and the ready sink.
//! - [`LockMode`]: The mode a key is currently held in, as reported by a status query.
//! - [`RequestMode`]: The mode a single request asks for. Unlike [`LockMode`] it can never be
//!   `Unlocked`, so a stored request is always either shared or exclusive.
//! - [`LockRequest`]: One transaction's claim on one key, granted or still waiting.
//! - [`LockStatus`]: The current owners of a key together with the mode they hold it in.

use serde::{Deserialize, Serialize};

pub mod error;

pub use error::*;

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Serialize, Deserialize,
)]
#[debug("TxnId({_0})")]
#[display("T{_0}")]
pub struct TxnId(u64);

impl TxnId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    Unlocked,
    Shared,
    Exclusive,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestMode {
    Shared,
    Exclusive,
}

impl From<RequestMode> for LockMode {
    fn from(mode: RequestMode) -> Self {
        match mode {
            RequestMode::Shared => LockMode::Shared,
            RequestMode::Exclusive => LockMode::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[debug("{mode}({txn})")]
pub struct LockRequest {
    mode: RequestMode,
    txn: TxnId,
}

impl LockRequest {
    pub const fn new(mode: RequestMode, txn: TxnId) -> Self {
        Self { mode, txn }
    }

    #[inline]
    pub const fn mode(&self) -> RequestMode {
        self.mode
    }

    #[inline]
    pub const fn txn(&self) -> TxnId {
        self.txn
    }

    #[inline]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self.mode, RequestMode::Exclusive)
    }
}

/// The result of a status query: who owns a key right now, and in which mode.
///
/// Owners are listed in queue order. An `Unlocked` status always has no owners, an `Exclusive`
/// status always has exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub mode: LockMode,
    pub owners: Vec<TxnId>,
}

impl LockStatus {
    pub const fn unlocked() -> Self {
        Self {
            mode: LockMode::Unlocked,
            owners: Vec::new(),
        }
    }

    pub fn new(mode: LockMode, owners: Vec<TxnId>) -> Self {
        debug_assert_eq!(mode == LockMode::Unlocked, owners.is_empty());
        Self { mode, owners }
    }

    #[inline]
    pub fn is_unlocked(&self) -> bool {
        self.mode == LockMode::Unlocked
    }

    #[inline]
    pub fn is_owner(&self, txn: TxnId) -> bool {
        self.owners.contains(&txn)
    }
}

impl Default for LockStatus {
    fn default() -> Self {
        Self::unlocked()
    }
}
