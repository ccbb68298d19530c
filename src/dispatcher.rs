//! # Lock Dispatcher
//!
//! Lock managers are plain single-threaded state machines. To share one between tasks, it is moved
//! into a [`LockDispatcher`] that runs on a background task and applies [`LockMessage`]s one at a
//! time, strictly in the order they were sent. That order is the order every replica has to agree
//! on, so messages are put on the channel as soon as a [`LockHandle`] method is called, not when
//! the returned future is first polled.
//!
//! ```not_rust
//!   LockHandle ---+
//!   LockHandle ---+--> mpsc --> LockDispatcher --> dyn LockManager --> ReadySink
//!   LockHandle ---+                  |
//!                                    +--> oneshot reply per message
//! ```
//!
//! The dispatcher stops once every handle has been dropped.

use std::fmt;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    base::{LockError, LockResult, LockStatus, RequestMode, TxnId},
    lockset::LockSet,
    manager::LockManager,
};

pub(crate) enum LockMessage<K: Ord> {
    Acquire {
        txn: TxnId,
        key: K,
        mode: RequestMode,
        reply: oneshot::Sender<bool>,
    },
    Release {
        txn: TxnId,
        key: K,
        reply: oneshot::Sender<LockResult<()>>,
    },
    Status {
        key: K,
        reply: oneshot::Sender<LockStatus>,
    },
    PendingCount {
        txn: TxnId,
        reply: oneshot::Sender<u32>,
    },
    AcquireSet {
        txn: TxnId,
        set: LockSet<K>,
        reply: oneshot::Sender<bool>,
    },
    ReleaseSet {
        txn: TxnId,
        set: LockSet<K>,
        reply: oneshot::Sender<LockResult<()>>,
    },
}

#[derive(Debug)]
struct LockDispatcher<K: Ord> {
    #[debug(skip)]
    manager: Box<dyn LockManager<K> + Send>,
    /// The receiver of messages to this dispatcher.
    #[debug(skip)]
    rx: mpsc::UnboundedReceiver<LockMessage<K>>,
    /// Number of messages handled so far.
    handled: u64,
}

impl<K: Ord + Clone + fmt::Debug> LockDispatcher<K> {
    async fn run(&mut self) {
        info!("lock dispatcher started");
        while let Some(message) = self.rx.recv().await {
            self.handle_message(message);
            self.handled += 1;
        }
        info!(handled = self.handled, "lock dispatcher shut down");
    }

    fn handle_message(&mut self, message: LockMessage<K>) {
        // A dropped reply receiver only means the caller stopped listening. The request itself
        // has already taken effect, at its place in the message order.
        match message {
            LockMessage::Acquire {
                txn,
                key,
                mode,
                reply,
            } => {
                let granted = self.manager.acquire(mode, txn, key);
                let _ = reply.send(granted);
            }
            LockMessage::Release { txn, key, reply } => {
                let result = self.manager.release(txn, &key);
                let _ = reply.send(result);
            }
            LockMessage::Status { key, reply } => {
                let _ = reply.send(self.manager.status(&key));
            }
            LockMessage::PendingCount { txn, reply } => {
                let _ = reply.send(self.manager.pending_count(txn));
            }
            LockMessage::AcquireSet { txn, set, reply } => {
                let ready = self.manager.acquire_set(txn, &set);
                let _ = reply.send(ready);
            }
            LockMessage::ReleaseSet { txn, set, reply } => {
                let result = self.manager.release_set(txn, &set);
                let _ = reply.send(result);
            }
        }
    }
}

async fn await_reply<T>(sent: bool, rx: oneshot::Receiver<T>) -> LockResult<T> {
    if !sent {
        return Err(LockError::DispatcherClosed);
    }
    rx.await.map_err(|_recv_error| LockError::DispatcherClosed)
}

/// A cloneable handle to a lock manager running behind a [`LockDispatcher`].
///
/// Every method enqueues its request right away and returns a future for the reply. Requests
/// from all handles are applied in the order the methods were called.
#[derive(Debug)]
pub struct LockHandle<K: Ord> {
    #[debug(skip)]
    tx_to_dispatcher: mpsc::UnboundedSender<LockMessage<K>>,
}

impl<K: Ord> Clone for LockHandle<K> {
    fn clone(&self) -> Self {
        Self {
            tx_to_dispatcher: self.tx_to_dispatcher.clone(),
        }
    }
}

impl<K> LockHandle<K>
where
    K: Ord + Clone + fmt::Debug + Send + 'static,
{
    /// Moves `manager` onto a background task and returns a handle to it, along with the task's
    /// join handle. Must be called from within a tokio runtime.
    pub fn spawn(manager: Box<dyn LockManager<K> + Send>) -> (Self, JoinHandle<()>) {
        let (tx_to_dispatcher, rx) = mpsc::unbounded_channel();
        let mut dispatcher = LockDispatcher {
            manager,
            rx,
            handled: 0,
        };
        let dispatcher_handle = tokio::task::spawn(async move {
            dispatcher.run().await;
        });
        (Self { tx_to_dispatcher }, dispatcher_handle)
    }

    fn send(&self, message: LockMessage<K>) -> bool {
        let sent = self.tx_to_dispatcher.send(message).is_ok();
        if !sent {
            warn!("could not send lock message: dispatcher closed");
        }
        sent
    }

    pub fn acquire_read(
        &self,
        txn: TxnId,
        key: K,
    ) -> impl Future<Output = LockResult<bool>> + use<K> {
        self.acquire(RequestMode::Shared, txn, key)
    }

    pub fn acquire_write(
        &self,
        txn: TxnId,
        key: K,
    ) -> impl Future<Output = LockResult<bool>> + use<K> {
        self.acquire(RequestMode::Exclusive, txn, key)
    }

    pub fn acquire(
        &self,
        mode: RequestMode,
        txn: TxnId,
        key: K,
    ) -> impl Future<Output = LockResult<bool>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::Acquire {
            txn,
            key,
            mode,
            reply,
        });
        await_reply(sent, rx)
    }

    pub fn release(
        &self,
        txn: TxnId,
        key: K,
    ) -> impl Future<Output = LockResult<()>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::Release { txn, key, reply });
        async move { await_reply(sent, rx).await.and_then(|result| result) }
    }

    pub fn status(&self, key: K) -> impl Future<Output = LockResult<LockStatus>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::Status { key, reply });
        await_reply(sent, rx)
    }

    pub fn pending_count(&self, txn: TxnId) -> impl Future<Output = LockResult<u32>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::PendingCount { txn, reply });
        await_reply(sent, rx)
    }

    /// See [`LockManager::acquire_set`].
    pub fn acquire_set(
        &self,
        txn: TxnId,
        set: LockSet<K>,
    ) -> impl Future<Output = LockResult<bool>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::AcquireSet { txn, set, reply });
        await_reply(sent, rx)
    }

    /// See [`LockManager::release_set`].
    pub fn release_set(
        &self,
        txn: TxnId,
        set: LockSet<K>,
    ) -> impl Future<Output = LockResult<()>> + use<K> {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(LockMessage::ReleaseSet { txn, set, reply });
        async move { await_reply(sent, rx).await.and_then(|result| result) }
    }
}
