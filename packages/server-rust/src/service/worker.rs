//! Background worker for queue draining.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from an mpsc channel
//! via a `BackgroundRunnable` implementation, with periodic tick callbacks, and the
//! `QueueDrainer` runnable that executes every Process-Queue request one at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interop_core::QueueItem;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::error::InteropError;
use super::interop::InteropService;

/// Tick interval used when auto-drain is disabled; ticks are no-ops then.
const IDLE_TICK_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Generic background worker that processes tasks via an mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the mpsc channel
/// 2. Calls `BackgroundRunnable::run()` for each task, one at a time
/// 3. Periodically calls `BackgroundRunnable::on_tick()` at the configured interval
/// 4. Calls `BackgroundRunnable::shutdown()` when stopped
///
/// All methods take `&self` so the worker can be shared through an `Arc`.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Mutex<Option<mpsc::Sender<R::Task>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the background worker with the given runnable and tick interval.
    ///
    /// Must be called from within a Tokio runtime. The channel capacity is
    /// fixed at 256.
    pub fn start(mut runnable: R, tick_interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(256);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick_interval =
                tokio::time::interval(Duration::from_millis(tick_interval_ms.max(1)));
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Mutex::new(Some(tx)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Submit a task to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// Stop the worker gracefully, waiting for the worker task to complete.
    ///
    /// A task already running finishes first. Calling `stop` twice is a no-op.
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        self.tx.lock().take();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// QueueDrainer
// ---------------------------------------------------------------------------

/// One Process-Queue request and the channel its results go back on.
#[derive(Debug)]
pub struct DrainRequest {
    pub limit: usize,
    pub reply: oneshot::Sender<Vec<QueueItem>>,
}

/// Runnable that drains the message queue.
///
/// Explicit drain requests are processed strictly one after another. When an
/// auto-drain interval is configured, each tick also drains up to the default
/// limit.
pub struct QueueDrainer {
    service: Arc<InteropService>,
    auto_drain: bool,
}

impl QueueDrainer {
    #[must_use]
    pub fn new(service: Arc<InteropService>) -> Self {
        let auto_drain = service.config().queue_drain_interval_ms.is_some();
        Self {
            service,
            auto_drain,
        }
    }

    /// Starts a drain worker ticking at the configured auto-drain interval.
    #[must_use]
    pub fn spawn(service: Arc<InteropService>) -> BackgroundWorker<Self> {
        let tick_ms = service
            .config()
            .queue_drain_interval_ms
            .unwrap_or(IDLE_TICK_MS);
        BackgroundWorker::start(Self::new(service), tick_ms)
    }
}

#[async_trait]
impl BackgroundRunnable for QueueDrainer {
    type Task = DrainRequest;

    async fn run(&mut self, task: DrainRequest) {
        let results = self.service.process_queue(task.limit).await;
        debug!(processed = results.len(), "drain request completed");
        if let Err(results) = task.reply.send(results) {
            // The items are already off the queue; the log is their only record.
            for item in &results {
                warn!(
                    message_id = %item.id,
                    module = %item.target,
                    status = item.status.as_str(),
                    error = item.error.as_deref().unwrap_or_default(),
                    "drain requester went away; result not delivered"
                );
            }
        }
    }

    async fn on_tick(&mut self) {
        if !self.auto_drain || self.service.queue().is_empty() {
            return;
        }
        let limit = self.service.config().default_drain_limit;
        let results = self.service.process_queue(limit).await;
        info!(
            processed = results.len(),
            remaining = self.service.queue().len(),
            "auto-drained message queue"
        );
    }

    async fn shutdown(&mut self) {
        debug!("queue drain worker stopped");
    }
}

impl BackgroundWorker<QueueDrainer> {
    /// Hands a drain of up to `limit` items to the worker and waits for the
    /// processed items.
    ///
    /// # Errors
    ///
    /// Returns `InteropError::Unavailable` if the worker has been stopped.
    pub async fn drain(&self, limit: usize) -> Result<Vec<QueueItem>, InteropError> {
        let (reply, rx) = oneshot::channel();
        self.submit(DrainRequest { limit, reply })
            .await
            .map_err(|err| InteropError::Unavailable(err.to_string()))?;
        rx.await.map_err(|_| {
            InteropError::Unavailable("queue drain worker stopped before replying".to_string())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use interop_core::messages::QueueSubmitRequest;
    use interop_core::QueueStatus;

    use super::*;
    use crate::service::config::ServerConfig;

    struct CountingRunnable {
        run_count: Arc<AtomicU32>,
        tick_count: Arc<AtomicU32>,
        shutdown_called: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BackgroundRunnable for CountingRunnable {
        type Task = String;

        async fn run(&mut self, _task: String) {
            self.run_count.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tick(&mut self) {
            self.tick_count.fetch_add(1, Ordering::SeqCst);
        }

        async fn shutdown(&mut self) {
            self.shutdown_called.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (CountingRunnable, Arc<AtomicU32>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let run_count = Arc::new(AtomicU32::new(0));
        let tick_count = Arc::new(AtomicU32::new(0));
        let shutdown_called = Arc::new(AtomicU32::new(0));
        let runnable = CountingRunnable {
            run_count: run_count.clone(),
            tick_count: tick_count.clone(),
            shutdown_called: shutdown_called.clone(),
        };
        (runnable, run_count, tick_count, shutdown_called)
    }

    fn enqueue(service: &InteropService, target: &str, priority: i64) {
        service
            .send(QueueSubmitRequest {
                target: Some(target.into()),
                method: Some("m".into()),
                params: None,
                priority: Some(priority),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn start_submit_and_stop() {
        let (runnable, run_count, _, shutdown_called) = counting();
        let worker = BackgroundWorker::start(runnable, 60_000);

        worker.submit("task-1".to_string()).await.unwrap();
        worker.submit("task-2".to_string()).await.unwrap();
        worker.submit("task-3".to_string()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 3);

        worker.stop().await;
        assert_eq!(shutdown_called.load(Ordering::SeqCst), 1);
        assert!(worker.submit("after-stop".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn tick_fires_periodically() {
        let (runnable, _, tick_count, _) = counting();
        let worker = BackgroundWorker::start(runnable, 20);

        tokio::time::sleep(Duration::from_millis(100)).await;
        worker.stop().await;

        assert!(tick_count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn submit_after_stop_returns_error() {
        let (runnable, _, _, _) = counting();
        let worker = BackgroundWorker::start(runnable, 60_000);
        worker.stop().await;
        worker.stop().await;

        assert!(worker.submit("late-task".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn drain_request_returns_processed_items() {
        let service = Arc::new(InteropService::new(ServerConfig::default()).unwrap());
        enqueue(&service, "ghost", 0);
        enqueue(&service, "ghost", 0);
        enqueue(&service, "ghost", 0);
        let worker = QueueDrainer::spawn(Arc::clone(&service));

        let results = worker.drain(2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|item| item.status == QueueStatus::Failed));
        assert_eq!(service.queue().len(), 1);
        worker.stop().await;
    }

    #[tokio::test]
    async fn drain_after_stop_is_unavailable() {
        let service = Arc::new(InteropService::new(ServerConfig::default()).unwrap());
        let worker = QueueDrainer::spawn(service);
        worker.stop().await;

        let err = worker.drain(10).await.unwrap_err();
        assert!(matches!(err, InteropError::Unavailable(_)));
    }

    #[tokio::test]
    async fn auto_drain_empties_queue_on_tick() {
        let config = ServerConfig {
            queue_drain_interval_ms: Some(20),
            default_drain_limit: 10,
            ..ServerConfig::default()
        };
        let service = Arc::new(InteropService::new(config).unwrap());
        enqueue(&service, "ghost", 1);
        enqueue(&service, "ghost", 2);
        let worker = QueueDrainer::spawn(Arc::clone(&service));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(service.queue().is_empty());
        worker.stop().await;
    }

    #[tokio::test]
    async fn ticks_do_nothing_without_auto_drain() {
        let service = Arc::new(InteropService::new(ServerConfig::default()).unwrap());
        enqueue(&service, "ghost", 0);
        let worker = BackgroundWorker::start(QueueDrainer::new(Arc::clone(&service)), 10);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(service.queue().len(), 1);
        worker.stop().await;
    }
}
