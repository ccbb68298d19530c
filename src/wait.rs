use std::{collections::HashMap, num::NonZeroU32};

use crate::base::TxnId;

/// Tracks how many lock requests of each transaction are still waiting to be granted.
///
/// A transaction only has an entry while at least one of its requests is waiting, so a missing
/// entry means "holds everything it asked for".
#[derive(Debug, Default)]
pub(crate) struct WaitCounter {
    waits: HashMap<TxnId, NonZeroU32>,
}

impl WaitCounter {
    /// Records one more waiting request for `txn` and returns the new count.
    pub(crate) fn add(&mut self, txn: TxnId) -> u32 {
        let count = self
            .waits
            .entry(txn)
            .and_modify(|count| *count = count.saturating_add(1))
            .or_insert(NonZeroU32::MIN);
        count.get()
    }

    /// Records that one waiting request of `txn` is no longer waiting.
    ///
    /// Returns `None` when `txn` was not waiting at all, otherwise the remaining count. The entry
    /// is removed once the count reaches zero.
    pub(crate) fn remove_one(&mut self, txn: TxnId) -> Option<u32> {
        let count = self.waits.get_mut(&txn)?;
        match NonZeroU32::new(count.get() - 1) {
            Some(remaining) => {
                *count = remaining;
                Some(remaining.get())
            }
            None => {
                self.waits.remove(&txn);
                Some(0)
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, txn: TxnId) -> u32 {
        self.waits.get(&txn).map_or(0, |count| count.get())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.waits.len()
    }
}
