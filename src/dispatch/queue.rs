//! In-order dispatch queue.
//!
//! Decouples the framing loop from consumer work. The framing loop pushes
//! each parsed message into a bounded FIFO and moves on; a single worker
//! task drains the FIFO and runs dispatch N+1 only after dispatch N has
//! completed.
//!
//! ```text
//! read loop ─► mpsc::Sender<Arc<M>> ─► worker ─► CallbackRegistry::dispatch
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::{CallbackRegistry, Dispatchable};
use crate::error::{ChatwireError, Result};

/// Bounded FIFO of messages awaiting dispatch.
pub struct DispatchQueue<M: Dispatchable> {
    tx: mpsc::Sender<Arc<M>>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl<M: Dispatchable> DispatchQueue<M> {
    /// Spawn the dispatch worker.
    ///
    /// When `cancel` fires the worker stops accepting new messages,
    /// finishes everything already queued, then exits.
    pub fn spawn(
        registry: Arc<CallbackRegistry<M>>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(worker_loop(rx, registry, cancel.clone()));
        Self { tx, cancel, worker }
    }

    /// Queue a message, waiting for space if the queue is full.
    ///
    /// Returns `Err(Cancelled)` if the connection is cancelled first.
    pub async fn enqueue(&self, msg: Arc<M>) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChatwireError::Cancelled),
            sent = self.tx.send(msg) => sent.map_err(|_| ChatwireError::ConnectionClosed),
        }
    }

    /// Number of messages waiting for the worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Close the queue and wait until every queued message is dispatched.
    pub async fn join(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::error!("Dispatch worker failed: {}", e);
        }
    }
}

async fn worker_loop<M: Dispatchable>(
    mut rx: mpsc::Receiver<Arc<M>>,
    registry: Arc<CallbackRegistry<M>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(msg) => {
                    registry.dispatch(&msg).await;
                }
                None => return,
            },
            _ = cancel.cancelled() => break,
        }
    }

    // Cancelled: deliver what was already queued, accept nothing new.
    rx.close();
    let mut drained = 0usize;
    while let Some(msg) = rx.recv().await {
        registry.dispatch(&msg).await;
        drained += 1;
    }
    tracing::debug!(drained, "Dispatch worker stopped");
}
