//! Task-execution service for close notifications.
//!
//! Close handlers are never run inside the resource lock; they are submitted
//! to an injected [`TaskExecutor`]. Submission is allowed to fail (the
//! service may be at capacity or shut down), in which case the task is handed
//! back to the submitter and runs synchronously in its control flow — a
//! notification is never silently dropped.
//!
//! The stock implementation is a dedicated worker task fed by an mpsc
//! channel:
//!
//! ```text
//! Resource 1 ─┐
//! Resource 2 ─┼─► mpsc::Sender<Task> ─► Notifier Task ─► handler bodies
//! Resource N ─┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (notifier, _task) = spawn_notifier(NotifierConfig::default());
//! let lifecycle = Lifecycle::new(Arc::new(notifier));
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A unit of work submitted for asynchronous execution.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Default channel capacity for the notifier task.
pub const DEFAULT_NOTIFIER_CAPACITY: usize = 1024;

/// A submission the executor could not accept.
///
/// Hands the task back so the submitter can run it inline instead of losing
/// it.
pub struct RejectedTask(pub Task);

impl std::fmt::Debug for RejectedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RejectedTask(..)")
    }
}

/// A service that runs units of work asynchronously.
///
/// Shared across many resources; implementations must tolerate concurrent
/// submission. Submission may fail (capacity, shutdown); callers use
/// [`run_or_inline`] when the task must run regardless.
pub trait TaskExecutor: Send + Sync {
    /// Submit a task for asynchronous execution.
    ///
    /// # Errors
    ///
    /// Returns the task back inside [`RejectedTask`] if it cannot be
    /// accepted.
    fn submit(&self, task: Task) -> Result<(), RejectedTask>;
}

/// Submit a task, falling back to synchronous execution on rejection.
pub fn run_or_inline(executor: &dyn TaskExecutor, task: Task) {
    if let Err(RejectedTask(task)) = executor.submit(task) {
        tracing::debug!("Executor rejected task, running inline");
        task();
    }
}

/// An executor that runs every task synchronously in the submitter.
///
/// Useful for tests and for owners that do not care about notification
/// latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: Task) -> Result<(), RejectedTask> {
        task();
        Ok(())
    }
}

/// Configuration for the notifier task.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Channel capacity for the task queue. Submissions beyond this are
    /// rejected rather than queued without bound.
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_NOTIFIER_CAPACITY,
        }
    }
}

/// Handle for submitting tasks to the notifier task.
///
/// Cheaply cloneable; shared across resources.
#[derive(Clone)]
pub struct NotifierHandle {
    tx: mpsc::Sender<Task>,
}

impl TaskExecutor for NotifierHandle {
    fn submit(&self, task: Task) -> Result<(), RejectedTask> {
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(task) => RejectedTask(task),
            mpsc::error::TrySendError::Closed(task) => RejectedTask(task),
        })
    }
}

/// Spawn the notifier task and return a handle for submitting work.
///
/// The task runs until every handle is dropped and the queue drains. A
/// panicking task is contained and logged; it cannot kill the loop or
/// suppress later tasks.
pub fn spawn_notifier(config: NotifierConfig) -> (NotifierHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(notifier_loop(rx));
    (NotifierHandle { tx }, task)
}

/// Spawn the notifier task with default configuration.
pub fn spawn_notifier_default() -> (NotifierHandle, JoinHandle<()>) {
    spawn_notifier(NotifierConfig::default())
}

/// Main notifier loop - receives tasks and runs them one at a time.
async fn notifier_loop(mut rx: mpsc::Receiver<Task>) {
    while let Some(task) = rx.recv().await {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("Notification task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_inline_executor_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = InlineExecutor.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notifier_config_default() {
        let config = NotifierConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_NOTIFIER_CAPACITY);
    }

    #[tokio::test]
    async fn test_notifier_runs_submitted_tasks() {
        let (handle, task) = spawn_notifier_default();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let c = counter.clone();
            handle
                .submit(Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        // Dropping the handle closes the queue; the loop drains then exits.
        drop(handle);
        task.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_submit_rejected_when_full() {
        let (handle, _task) = spawn_notifier(NotifierConfig {
            channel_capacity: 1,
        });

        // Block the worker so the queue stays occupied.
        let (block_tx, block_rx) = std::sync::mpsc::channel::<()>();
        handle
            .submit(Box::new(move || {
                let _ = block_rx.recv_timeout(Duration::from_secs(5));
            }))
            .unwrap();

        // Fill the single queue slot, then overflow it.
        let mut rejected = None;
        for _ in 0..2 {
            if let Err(r) = handle.submit(Box::new(|| {})) {
                rejected = Some(r);
                break;
            }
        }

        let RejectedTask(task) = rejected.expect("queue should overflow");
        // The rejected task is still runnable by the submitter.
        task();

        block_tx.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_submit_rejected_after_shutdown() {
        let (handle, task) = spawn_notifier_default();

        // Tear the worker down while the handle stays alive; its receiver
        // drops with it.
        task.abort();
        let _ = task.await;

        let result = handle.submit(Box::new(|| {}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_or_inline_falls_back_on_rejection() {
        struct AlwaysReject;
        impl TaskExecutor for AlwaysReject {
            fn submit(&self, task: Task) -> Result<(), RejectedTask> {
                Err(RejectedTask(task))
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        run_or_inline(
            &AlwaysReject,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_kill_loop() {
        let (handle, task) = spawn_notifier_default();

        handle.submit(Box::new(|| panic!("broken task"))).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        handle
            .submit(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        drop(handle);
        task.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
