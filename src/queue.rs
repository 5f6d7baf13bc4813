//! Serial Task Queue
//!
//! Runs asynchronous tasks one at a time on a single FIFO lane, with an escape
//! hatch for tasks that are independent of the lane. Every context-mutating
//! operation goes through the serial lane, which is what keeps pool
//! reconciliation and active-context swaps free of interleaving.

use crate::error::ContextError;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Task ID for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TaskId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Start immediately instead of waiting for the serial lane.
    pub parallel: bool,
}

impl PushOptions {
    pub fn serial() -> Self {
        Self { parallel: false }
    }

    pub fn parallel() -> Self {
        Self { parallel: true }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks pushed but not started
    pub pending: usize,
    /// Tasks currently running
    pub processing: usize,
    /// Tasks that finished with `Ok`
    pub completed: usize,
    /// Tasks that finished with an error or panicked
    pub failed: usize,
}

/// Resolves with the result of one pushed task.
#[must_use = "a task handle does nothing unless awaited; the task itself runs regardless"]
pub struct TaskHandle<T> {
    task_id: TaskId,
    receiver: oneshot::Receiver<Result<T, ContextError>>,
}

impl<T> TaskHandle<T> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, ContextError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ContextError::TaskFailed(
                "Task was dropped before completing".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct SerialTaskQueue {
    lane: mpsc::UnboundedSender<Job>,
    stats: Arc<RwLock<QueueStats>>,
}

impl SerialTaskQueue {
    /// Create the queue and spawn its lane worker. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (lane, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Self::worker_loop(receiver));
        Self {
            lane,
            stats: Arc::new(RwLock::new(QueueStats::default())),
        }
    }

    /// Push a task.
    ///
    /// Serial tasks start only after every earlier serial task finished, and
    /// everything they mutate is visible to the next one. A failing or
    /// panicking task resolves its own handle with the error; later tasks
    /// still run. Pushed tasks cannot be withdrawn.
    pub fn push<F, T>(&self, task: F, options: PushOptions) -> TaskHandle<T>
    where
        F: Future<Output = Result<T, ContextError>> + Send + 'static,
        T: Send + 'static,
    {
        let task_id = TaskId::next();
        let (tx, rx) = oneshot::channel();
        let stats = Arc::clone(&self.stats);
        stats.write().pending += 1;

        let job = async move {
            {
                let mut stats = stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
            }
            debug!(task_id = task_id.as_u64(), "Task started");

            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(task_id = task_id.as_u64(), panic = %message, "Task panicked");
                    Err(ContextError::TaskFailed(message))
                }
            };

            {
                let mut stats = stats.write();
                stats.processing = stats.processing.saturating_sub(1);
                if result.is_ok() {
                    stats.completed += 1;
                } else {
                    stats.failed += 1;
                }
            }
            debug!(task_id = task_id.as_u64(), ok = result.is_ok(), "Task finished");

            // The caller may have stopped waiting.
            let _ = tx.send(result);
        };

        if options.parallel {
            tokio::spawn(job);
        } else if self.lane.send(Box::pin(job)).is_err() {
            // Worker is gone; the dropped job closes the channel and the handle reports it.
            error!(task_id = task_id.as_u64(), "Serial lane closed, task dropped");
            let mut stats = self.stats.write();
            stats.pending = stats.pending.saturating_sub(1);
            stats.failed += 1;
        }

        TaskHandle {
            task_id,
            receiver: rx,
        }
    }

    /// Wait until every serial task pushed so far has finished.
    pub async fn drain(&self) -> Result<(), ContextError> {
        self.push(async { Ok(()) }, PushOptions::serial()).await
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    async fn worker_loop(mut receiver: mpsc::UnboundedReceiver<Job>) {
        debug!("Serial lane started");
        while let Some(job) = receiver.recv().await {
            job.await;
        }
        debug!("Serial lane stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
