//! Worker-pool harness around the queue's polling API.
//!
//! The executor polls `ready_tasks`, admits each task, and runs the
//! registered handler for its type on a spawned tokio task. Handlers perform
//! the actual work (transcription, file transfer, ...) — the harness only
//! routes lifecycle callbacks back through the queue, which keeps every
//! mutation linearized behind the shared lock.

use crate::error::{Result, SchedulerError};
use crate::queue::TaskQueue;
use crate::task::Task;
use crate::task_type::TaskType;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle to the queue shared between the embedder and the workers. The lock
/// is never held across an await point.
pub type SharedQueue = Arc<Mutex<TaskQueue>>;

pub fn shared_queue(queue: TaskQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}

/// Progress callback handed to handlers; forwards to the queue.
#[derive(Clone)]
pub struct ProgressHandle {
    queue: SharedQueue,
    task_id: uuid::Uuid,
}

impl ProgressHandle {
    pub fn update(&self, value: f32, message: Option<&str>) {
        self.queue.lock().update_task_progress(self.task_id, value, message);
    }
}

/// Performs the actual work for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Run the work for `task`. The task value is a transient snapshot; all
    /// state changes flow back through the queue. Returning an error fails
    /// the task with the error's message.
    async fn run(&self, task: Task, progress: ProgressHandle) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct Executor {
    queue: SharedQueue,
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    config: ExecutorConfig,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    pub fn new(queue: SharedQueue, config: ExecutorConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            config,
            shutdown: CancellationToken::new(),
            workers: Vec::new(),
        }
    }

    /// Register a handler, keyed by the type it declares. A later
    /// registration for the same type replaces the earlier one.
    pub fn register_handler(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    pub fn queue(&self) -> SharedQueue {
        self.queue.clone()
    }

    /// Token that stops `run` when cancelled. In-flight work is allowed to
    /// finish; stopping it early is a handler concern.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// One admission cycle: drain the ready set and spawn a worker per
    /// admitted task. Returns how many tasks were admitted.
    pub fn tick(&mut self) -> usize {
        self.workers.retain(|worker| !worker.is_finished());

        let admitted: Vec<Task> = {
            let mut queue = self.queue.lock();
            queue
                .ready_tasks()
                .into_iter()
                .filter(|task| queue.mark_task_processing(task.id))
                .collect()
        };

        let count = admitted.len();
        for task in admitted {
            let worker = self.spawn_worker(task);
            self.workers.push(worker);
        }
        count
    }

    fn spawn_worker(&self, task: Task) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let handler = self.handlers.get(&task.task_type).cloned();
        let id = task.id;
        let task_type = task.task_type;

        tokio::spawn(async move {
            debug!("Worker picked up task {} ({})", id, task_type);
            let result = match handler {
                Some(handler) => {
                    let progress = ProgressHandle {
                        queue: queue.clone(),
                        task_id: id,
                    };
                    AssertUnwindSafe(handler.run(task, progress))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Err(SchedulerError::Other(anyhow::anyhow!(
                                "task handler panicked"
                            )))
                        })
                }
                None => Err(SchedulerError::HandlerMissing(task_type)),
            };

            let mut queue = queue.lock();
            match result {
                Ok(()) => queue.complete_task(id),
                Err(e) => {
                    error!("Task {} ({}) failed: {}", id, task_type, e);
                    queue.fail_task(id, &e.to_string());
                }
            }
            queue.mark_task_finished(id);
        })
    }

    /// Poll until the cancellation token fires, then wait for outstanding
    /// workers to report back.
    pub async fn run(&mut self) {
        info!("Executor started ({} handler(s))", self.handlers.len());
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick();
                }
            }
        }
        let workers = std::mem::take(&mut self.workers);
        futures::future::join_all(workers).await;
        info!("Executor stopped");
    }
}
