use std::collections::VecDeque;

use detlock::{LockHandle, LockManagerConfig, LockResult, LockSet, TxnId};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> LockResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
    let manager = LockManagerConfig::default().build(ready_tx);
    let (locks, _dispatcher) = LockHandle::spawn(manager);

    // two readers, then a writer, then a reader that has to wait behind the writer
    let batch = [
        (TxnId::new(1), LockSet::new().with_read("accounts/1")),
        (TxnId::new(2), LockSet::new().with_read("accounts/1")),
        (TxnId::new(3), LockSet::new().with_write("accounts/1")),
        (TxnId::new(4), LockSet::new().with_read("accounts/1")),
    ];

    let mut runnable = VecDeque::new();
    for (txn, set) in &batch {
        if locks.acquire_set(*txn, set.clone()).await? {
            runnable.push_back(*txn);
        }
    }
    info!(?runnable, "acquired all lock sets");

    let mut order = Vec::new();
    while let Some(txn) = runnable.pop_front() {
        order.push(txn);
        let set = batch
            .iter()
            .find_map(|(id, set)| (*id == txn).then(|| set.clone()))
            .unwrap_or_default();
        locks.release_set(txn, set).await?;

        while let Ok(ready) = ready_rx.try_recv() {
            runnable.push_back(ready);
        }
    }

    info!(?order, "batch finished");
    Ok(())
}
