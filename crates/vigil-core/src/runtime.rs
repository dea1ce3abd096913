//! Background detection worker.
//!
//! The conversation source hands over each completed exchange and moves
//! on; detection, scheduling and enqueueing happen on a separate task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{Exchange, InsightEngine};
use crate::error::{VigilError, VigilResult};

/// Configuration for the [`DetectionWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Exchanges buffered before `submit` waits (default: 256).
    pub capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl WorkerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Reads `VIGIL_WORKER_CAPACITY` (default: 256).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = std::env::var("VIGIL_WORKER_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config = config.with_capacity(capacity);
        }
        config
    }
}

/// Consumes exchanges from a bounded channel and ingests them in order.
///
/// # Example
///
/// ```ignore
/// let engine = Arc::new(InsightEngine::in_memory());
/// let worker = DetectionWorker::start(engine, WorkerConfig::default());
/// worker.submit(Exchange::new("ws", "I'll send it tomorrow", "conv")).await?;
/// worker.shutdown().await?;
/// ```
pub struct DetectionWorker {
    sender: mpsc::Sender<Exchange>,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl DetectionWorker {
    pub fn start(engine: Arc<InsightEngine>, config: WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let cancel = CancellationToken::new();
        let processed = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run(engine, receiver, cancel.clone(), processed.clone()));
        info!(capacity = config.capacity, "Detection worker started");
        Self {
            sender,
            cancel,
            processed,
            handle,
        }
    }

    /// Queue an exchange for detection. Waits while the buffer is full.
    pub async fn submit(&self, exchange: Exchange) -> VigilResult<()> {
        self.sender
            .send(exchange)
            .await
            .map_err(|_| VigilError::internal("detection worker has stopped"))
    }

    /// Exchanges ingested so far, including ones that failed.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Stop accepting exchanges, finish the ones already queued and wait
    /// for the task to exit.
    pub async fn shutdown(self) -> VigilResult<()> {
        let Self { sender, handle, .. } = self;
        drop(sender);
        handle
            .await
            .map_err(|e| VigilError::internal(format!("detection worker panicked: {}", e)))?;
        info!("Detection worker stopped");
        Ok(())
    }

    /// Stop immediately, dropping anything still queued.
    pub async fn abort(self) -> VigilResult<()> {
        self.cancel.cancel();
        self.shutdown().await
    }
}

async fn run(
    engine: Arc<InsightEngine>,
    mut receiver: mpsc::Receiver<Exchange>,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
) {
    loop {
        let exchange = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Detection worker cancelled");
                break;
            }
            next = receiver.recv() => match next {
                Some(exchange) => exchange,
                None => break,
            },
        };

        let workspace_id = exchange.workspace_id.clone();
        if let Err(e) = engine.ingest_exchange(exchange).await {
            warn!(%workspace_id, error = %e, "Failed to ingest exchange");
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let engine = Arc::new(InsightEngine::in_memory());
        let worker = DetectionWorker::start(engine.clone(), WorkerConfig::default());

        worker
            .submit(Exchange::new("ws", "Actually, I meant the other approach", "c1"))
            .await
            .unwrap();
        worker
            .submit(Exchange::new("ws", "Dana is still waiting on me for the Q3 budget numbers.", "c2"))
            .await
            .unwrap();
        worker.submit(Exchange::new("", "I'll send it tomorrow", "c3")).await.unwrap();
        worker.shutdown().await.unwrap();

        assert!(engine.queue().pending_count("ws").unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_processed_counts_failures() {
        let engine = Arc::new(InsightEngine::in_memory());
        let worker = DetectionWorker::start(engine, WorkerConfig::default().with_capacity(1));
        worker.submit(Exchange::new("", "anything", "c")).await.unwrap();
        worker.submit(Exchange::new("ws", "nothing to see", "c")).await.unwrap();

        for _ in 0..100 {
            if worker.processed() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(worker.processed(), 2);
        worker.abort().await.unwrap();
    }

    #[test]
    fn test_capacity_floor() {
        assert_eq!(WorkerConfig::default().with_capacity(0).capacity, 1);
    }
}
