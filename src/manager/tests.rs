use std::collections::{HashMap, VecDeque};

use crate::{
    base::{LockMode, LockStatus, TxnId},
    config::LockManagerConfig,
    lockset::LockSet,
    tests::setup_tracing,
};

use super::*;

trait DrainReady {
    fn drain_ready(&mut self) -> Vec<TxnId>;
}

impl DrainReady for ExclusiveLockManager<u32> {
    fn drain_ready(&mut self) -> Vec<TxnId> {
        self.ready_mut().drain(..).collect()
    }
}

impl DrainReady for SharedLockManager<u32> {
    fn drain_ready(&mut self) -> Vec<TxnId> {
        self.ready_mut().drain(..).collect()
    }
}

fn exclusive_manager() -> ExclusiveLockManager<u32> {
    ExclusiveLockManager::new(&LockManagerConfig::for_testing(), VecDeque::new())
}

fn shared_manager() -> SharedLockManager<u32> {
    SharedLockManager::new(&LockManagerConfig::for_testing(), VecDeque::new())
}

/// Small xorshift generator, so workloads are reproducible without pulling in an RNG.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

fn workload(seed: u64, txn_count: u64, key_count: u64) -> Vec<(TxnId, LockSet<u32>)> {
    let mut rng = XorShift(seed);
    (1..=txn_count)
        .map(|id| {
            let mut set = LockSet::new();
            for _ in 0..=rng.below(4) {
                let key = rng.below(key_count) as u32;
                if rng.below(3) == 0 {
                    set.insert_write(key);
                } else {
                    set.insert_read(key);
                }
            }
            (TxnId::new(id), set)
        })
        .collect()
}

/// Checks the ownership invariants of every key in `keys`.
fn check_owners<M: LockManager<u32>>(manager: &M, keys: u32) {
    for key in 0..keys {
        let status = manager.status(&key);
        match status.mode {
            LockMode::Unlocked => {
                assert!(status.owners.is_empty());
                assert_eq!(manager.queue_len(&key), 0, "unlocked key {key} has requests");
            }
            LockMode::Exclusive => assert_eq!(status.owners.len(), 1, "key {key}: {status:?}"),
            LockMode::Shared => assert!(!status.owners.is_empty()),
        }
        for owner in &status.owners {
            assert!(
                status.owners.iter().filter(|txn| *txn == owner).count() == 1,
                "key {key} lists {owner} twice"
            );
        }
    }
}

/// Plays a scheduler: every transaction acquires its whole lock set, in order, then transactions
/// run as soon as they hold all their locks and release everything afterwards.
///
/// Returns the order in which transactions ran.
fn run_workload<M>(manager: &mut M, txns: &[(TxnId, LockSet<u32>)], keys: u32) -> Vec<TxnId>
where
    M: LockManager<u32> + DrainReady,
{
    let sets: HashMap<TxnId, &LockSet<u32>> = txns.iter().map(|(txn, set)| (*txn, set)).collect();
    let mut runnable = VecDeque::new();
    let mut ran = Vec::new();

    for (txn, set) in txns {
        if manager.acquire_set(*txn, set) {
            runnable.push_back(*txn);
        }
        check_owners(manager, keys);
    }

    while let Some(txn) = runnable.pop_front() {
        assert!(!manager.is_waiting(txn), "{txn} ran while still waiting");
        for (key, _) in sets[&txn].requests() {
            assert!(manager.status(key).is_owner(txn), "{txn} runs without owning {key}");
        }
        ran.push(txn);

        manager.release_set(txn, sets[&txn]).unwrap();
        runnable.extend(manager.drain_ready());
        check_owners(manager, keys);
    }

    ran
}

#[test]
fn test_exclusive_scenario() {
    setup_tracing();
    let (t1, t2) = (TxnId::new(1), TxnId::new(2));
    let mut manager = exclusive_manager();

    assert!(manager.acquire_write(t1, 7));
    assert!(!manager.acquire_write(t2, 7));
    manager.release(t1, &7).unwrap();

    assert_eq!(manager.status(&7), LockStatus::new(LockMode::Exclusive, vec![t2]));
    assert_eq!(manager.drain_ready(), vec![t2]);

    manager.release(t2, &7).unwrap();
    assert_eq!(manager.status(&7), LockStatus::unlocked());
    assert!(manager.drain_ready().is_empty());
}

#[test]
fn test_shared_scenario() {
    setup_tracing();
    let [t1, t2, t3, t4] = [1, 2, 3, 4].map(TxnId::new);
    let mut manager = shared_manager();

    assert!(manager.acquire_read(t1, 7));
    assert!(manager.acquire_read(t2, 7));
    assert_eq!(manager.status(&7), LockStatus::new(LockMode::Shared, vec![t1, t2]));

    assert!(!manager.acquire_write(t3, 7));
    assert_eq!(manager.exclusive_waiters(&7), 1);
    assert!(!manager.acquire_read(t4, 7));

    manager.release(t1, &7).unwrap();
    assert_eq!(manager.status(&7), LockStatus::new(LockMode::Shared, vec![t2]));
    assert!(manager.drain_ready().is_empty(), "t2 already owned the key");

    manager.release(t2, &7).unwrap();
    assert_eq!(manager.status(&7), LockStatus::new(LockMode::Exclusive, vec![t3]));
    assert_eq!(manager.drain_ready(), vec![t3]);
    assert!(manager.is_waiting(t4));

    manager.release(t3, &7).unwrap();
    assert_eq!(manager.status(&7), LockStatus::new(LockMode::Shared, vec![t4]));
    assert_eq!(manager.drain_ready(), vec![t4]);

    manager.release(t4, &7).unwrap();
    assert_eq!(manager.status(&7), LockStatus::unlocked());
    assert_eq!(manager.exclusive_waiters(&7), 0);
}

#[test]
fn test_fifo_order_per_key() {
    setup_tracing();
    let txns: Vec<TxnId> = (1..=5).map(TxnId::new).collect();
    let mut manager = exclusive_manager();

    for txn in &txns {
        manager.acquire_write(*txn, 1);
    }
    let mut owners = Vec::new();
    for txn in &txns {
        owners.push(manager.status(&1).owners[0]);
        manager.release(*txn, &1).unwrap();
    }
    assert_eq!(owners, txns);
}

#[test]
fn test_lock_set_readiness() {
    setup_tracing();
    let (t1, t2) = (TxnId::new(1), TxnId::new(2));
    let mut manager = shared_manager();

    let first = LockSet::new().with_read(1).with_write(2);
    let second = LockSet::new().with_read(1).with_read(2).with_write(3);

    assert!(manager.acquire_set(t1, &first));
    assert!(!manager.acquire_set(t2, &second), "t2 has to wait for key 2");
    assert_eq!(manager.pending_count(t2), 1);

    manager.release_set(t1, &first).unwrap();
    assert_eq!(manager.drain_ready(), vec![t2]);
    manager.release_set(t2, &second).unwrap();

    for key in 1..=3 {
        assert!(manager.status(&key).is_unlocked());
    }
}

#[test]
fn test_release_set_reports_first_error() {
    let t1 = TxnId::new(1);
    let mut manager = shared_manager();

    assert!(manager.acquire_read(t1, 2));
    let set = LockSet::new().with_read(1).with_read(2).with_read(3);
    let err = manager.release_set(t1, &set).unwrap_err();
    assert_eq!(
        err,
        LockError::NotHeld {
            txn: t1,
            key: "1".into()
        }
    );
    assert!(manager.status(&2).is_unlocked(), "later keys are still released");
}

#[test]
fn test_compaction() {
    setup_tracing();
    let t1 = TxnId::new(1);

    let mut manager = shared_manager();
    for key in 0..10 {
        manager.acquire_write(t1, key);
    }
    for key in 0..5 {
        manager.release(t1, &key).unwrap();
    }
    assert_eq!(manager.key_count(), 10, "drained keys stay in the table");
    assert_eq!(manager.compact(), 5);
    assert_eq!(manager.key_count(), 5);
    assert!(manager.status(&0).is_unlocked());

    let config = LockManagerConfig::for_testing().with_compact_on_release(true);
    let mut manager: ExclusiveLockManager<u32> = ExclusiveLockManager::new(&config, VecDeque::new());
    manager.acquire_write(t1, 1);
    manager.acquire_write(TxnId::new(2), 1);
    manager.release(t1, &1).unwrap();
    assert_eq!(manager.key_count(), 1, "key 1 still has a request");
    manager.release(TxnId::new(2), &1).unwrap();
    assert_eq!(manager.key_count(), 0);
}

#[test]
fn test_workloads_complete_and_replay_identically() {
    setup_tracing();
    let keys = 6;
    for seed in [0x9E37_79B9, 0xDEAD_BEEF, 42, 7_777_777] {
        let txns = workload(seed, 40, keys as u64);

        let shared_order = run_workload(&mut shared_manager(), &txns, keys);
        assert_eq!(shared_order.len(), txns.len(), "every transaction runs exactly once");
        let replayed = run_workload(&mut shared_manager(), &txns, keys);
        assert_eq!(shared_order, replayed, "seed {seed:#x} replays differently");

        let exclusive_order = run_workload(&mut exclusive_manager(), &txns, keys);
        assert_eq!(exclusive_order.len(), txns.len());
        let replayed = run_workload(&mut exclusive_manager(), &txns, keys);
        assert_eq!(exclusive_order, replayed, "seed {seed:#x} replays differently");
    }
}

#[test]
fn test_exclusive_only_serializes_conflicting_readers() {
    // Both transactions only read key 1. The shared policy lets them run together,
    // the exclusive one runs them one after another.
    let (t1, t2) = (TxnId::new(1), TxnId::new(2));
    let set = LockSet::new().with_read(1);

    let mut shared = shared_manager();
    assert!(shared.acquire_set(t1, &set));
    assert!(shared.acquire_set(t2, &set));

    let mut exclusive = exclusive_manager();
    assert!(exclusive.acquire_set(t1, &set));
    assert!(!exclusive.acquire_set(t2, &set));
    exclusive.release_set(t1, &set).unwrap();
    assert_eq!(exclusive.drain_ready(), vec![t2]);
}
