//! Generic stage worker: one queue, one handler, one loop.

pub mod classification;
pub mod embedding;
pub mod ocr;
pub mod segmentation;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::watch;

use crate::error::WorkerError;
use crate::queue::QueueReceiver;

pub use classification::ClassificationHandler;
pub use embedding::EmbeddingHandler;
pub use ocr::OcrHandler;
pub use segmentation::SegmentationHandler;

#[async_trait]
pub trait JobHandler<T: Send>: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, item: T) -> Result<(), WorkerError>;
}

/// Consumer loop bound to a single stage queue.
///
/// Pulls one item at a time, hands it to the handler, logs and drops on
/// failure (at-most-once, no requeue), and keeps a heartbeat running
/// independently of item flow. Shutdown is observed even while the loop is
/// parked on an empty queue.
pub struct Worker<T: Send + 'static> {
    handler: Arc<dyn JobHandler<T>>,
    queue: QueueReceiver<T>,
    shutdown: watch::Receiver<bool>,
    heartbeat: Duration,
}

impl<T: Send + 'static> Worker<T> {
    pub fn new(
        handler: Arc<dyn JobHandler<T>>,
        queue: QueueReceiver<T>,
        shutdown: watch::Receiver<bool>,
        heartbeat: Duration,
    ) -> Self {
        Self {
            handler,
            queue,
            shutdown,
            heartbeat,
        }
    }

    pub async fn run(mut self) {
        let name = self.handler.name();
        info!("{name} - starting run loop");

        let heartbeat = tokio::spawn(heartbeat_loop(
            name,
            self.queue.depth_gauge(),
            self.heartbeat,
            self.shutdown.clone(),
        ));

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("{name} - shutdown signal received");
                        break;
                    }
                }
                item = self.queue.dequeue() => {
                    match item {
                        Some(item) => {
                            if let Err(e) = self.handler.handle(item).await {
                                error!("{name} - failed to process item: {e}");
                            }
                        }
                        None => {
                            info!("{name} - queue closed, stopping");
                            break;
                        }
                    }
                }
            }
        }

        heartbeat.abort();
        info!("{name} - stopped");
    }
}

async fn heartbeat_loop(
    name: &'static str,
    depth: Arc<std::sync::atomic::AtomicUsize>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("{name} - heartbeat stopped");
                    return;
                }
            }
            _ = tokio::time::sleep(interval) => {
                debug!("{name} - heartbeat: qsize={}", depth.load(Ordering::Relaxed));
            }
        }
    }
}
