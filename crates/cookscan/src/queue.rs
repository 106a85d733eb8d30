//! Typed work queues between pipeline stages.
//!
//! Unbounded FIFO, multi-producer/single-consumer: `enqueue` never blocks,
//! `dequeue` parks the consuming worker until an item arrives. A shared
//! depth gauge feeds the worker heartbeat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::WorkerError;
use crate::model::ScannedPage;

/// Input to one classification dispatch: all pages of a book scan, in page
/// order, plus the requesting owner.
#[derive(Debug, Clone)]
pub struct ClassificationJob {
    pub pages: Vec<ScannedPage>,
    pub owner_id: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingJob {
    pub recipe_id: String,
    pub owner_id: String,
    pub reindex: bool,
}

pub fn work_queue<T>() -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            tx,
            depth: Arc::clone(&depth),
        },
        QueueReceiver { rx, depth },
    )
}

/// Producer half. Cloneable; sends never block.
pub struct QueueSender<T> {
    tx: mpsc::UnboundedSender<T>,
    depth: Arc<AtomicUsize>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            depth: Arc::clone(&self.depth),
        }
    }
}

impl<T> QueueSender<T> {
    pub fn enqueue(&self, item: T) -> Result<(), WorkerError> {
        self.depth.fetch_add(1, Ordering::Relaxed);
        self.tx.send(item).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            WorkerError::QueueClosed
        })
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Consumer half, owned by exactly one worker.
pub struct QueueReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    depth: Arc<AtomicUsize>,
}

impl<T> QueueReceiver<T> {
    /// Waits for the next item. Returns `None` once every sender is gone
    /// and the queue has drained.
    pub async fn dequeue(&mut self) -> Option<T> {
        let item = self.rx.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        item
    }

    pub fn depth_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.depth)
    }
}
