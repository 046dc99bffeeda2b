//! The scheduler: owns the authoritative task list, computes readiness
//! against the type-level dependency graph, and bounds admission under a
//! concurrency cap.
//!
//! All operations are synchronous, in-memory, and infallible; mutations are
//! linearized through `&mut self`. Readiness is recomputed with a global
//! sweep after every structural change rather than through a reverse
//! dependency index — O(n·d) per call, which is fine at consumer-library
//! scale.

use crate::availability::ArtifactProbe;
use crate::events::QueueEvent;
use crate::snapshot::QueueSnapshot;
use crate::task::{Task, TaskStatus};
use crate::task_type::TaskType;
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum number of tasks in flight at once. Fixed for the lifetime of
    /// the queue.
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: (num_cpus::get() / 2).max(1),
        }
    }
}

/// Per-status totals for dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub waiting: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.pending + self.waiting + self.processing + self.completed + self.failed + self.cancelled
    }
}

pub struct TaskQueue {
    tasks: Vec<Task>,
    in_flight: HashSet<Uuid>,
    max_concurrent: usize,
    paused: bool,
    probe: Arc<dyn ArtifactProbe>,
    events: broadcast::Sender<QueueEvent>,
}

impl TaskQueue {
    pub fn new(config: QueueConfig, probe: Arc<dyn ArtifactProbe>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            tasks: Vec::new(),
            in_flight: HashSet::new(),
            max_concurrent: config.max_concurrent,
            paused: false,
            probe,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn status_counts(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::WaitingForDependencies => stats.waiting += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Enqueue a task. A task whose natural key matches one already in the
    /// collection is silently ignored and `false` is returned.
    pub fn add_task(&mut self, task: Task) -> bool {
        let key = task.natural_key();
        if self.tasks.iter().any(|t| t.natural_key() == key) {
            debug!("Ignoring duplicate enqueue of {}", key);
            return false;
        }
        let id = task.id;
        info!("Enqueued task {} ({})", id, key);
        self.tasks.push(task);
        self.emit(QueueEvent::TaskAdded { id });
        self.update_task_dependencies();
        true
    }

    /// Enqueue several tasks; returns how many were accepted.
    pub fn add_tasks(&mut self, tasks: Vec<Task>) -> usize {
        tasks
            .into_iter()
            .map(|task| usize::from(self.add_task(task)))
            .sum()
    }

    /// Global readiness sweep: reclassifies every non-terminal, not-running
    /// task as `Pending` or `WaitingForDependencies`. Idempotent; skipped
    /// entirely while paused. Always sweeps the whole collection before
    /// returning, so readiness is consistent at every call boundary.
    pub fn update_task_dependencies(&mut self) {
        if self.paused {
            return;
        }

        let verdicts: Vec<(usize, bool)> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                matches!(
                    t.status,
                    TaskStatus::Pending | TaskStatus::WaitingForDependencies
                )
            })
            .map(|(i, t)| (i, self.dependencies_satisfied(t)))
            .collect();

        let mut changes = Vec::new();
        for (i, satisfied) in verdicts {
            let task = &mut self.tasks[i];
            let before = task.status;
            if satisfied {
                task.mark_ready();
            } else {
                task.mark_waiting();
            }
            if task.status != before {
                changes.push((task.id, task.status));
            }
        }
        for (id, status) in changes {
            self.emit(QueueEvent::TaskStatusChanged { id, status });
        }
    }

    /// Instance-level dependency check: for each prerequisite type, a sibling
    /// task for the same subject must be completed, or — when no sibling
    /// exists — the host must confirm the artifact is already present.
    fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.task_type.dependencies().iter().all(|&dep| {
            let sibling = self
                .tasks
                .iter()
                .find(|t| t.subject == task.subject && t.task_type == dep);
            match sibling {
                Some(sibling) => sibling.status == TaskStatus::Completed,
                None => self.probe.has_artifact(&task.subject, dep),
            }
        })
    }

    /// Pure admission query: up to `max_concurrent - in_flight` pending tasks,
    /// oldest first (FIFO by creation time; insertion order breaks ties).
    /// Empty while paused or when no slots remain.
    pub fn ready_tasks(&self) -> Vec<Task> {
        if self.paused {
            return Vec::new();
        }
        let slots = self.max_concurrent.saturating_sub(self.in_flight.len());
        if slots == 0 {
            return Vec::new();
        }
        let mut ready: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect();
        ready.sort_by_key(|t| t.created_at);
        ready.into_iter().take(slots).cloned().collect()
    }

    /// Admit a task for execution: adds it to the in-flight set and starts
    /// it. Refused (returns `false`) when the task is not pending or every
    /// slot is taken.
    pub fn mark_task_processing(&mut self, id: Uuid) -> bool {
        if self.in_flight.len() >= self.max_concurrent {
            warn!("Refusing admission for {}: all slots in use", id);
            return false;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            return false;
        }
        task.mark_started();
        let status = task.status;
        let key = task.natural_key();
        self.in_flight.insert(id);
        info!("Task {} ({}) started", id, key);
        self.emit(QueueEvent::TaskStatusChanged { id, status });
        true
    }

    /// Release a task's execution slot and recompute readiness so dependents
    /// of a just-finished task become eligible. A completed task's follow-up
    /// types are auto-enqueued for the same subject first.
    pub fn mark_task_finished(&mut self, id: Uuid) {
        self.in_flight.remove(&id);

        let follow_up = self.task(id).and_then(|t| {
            if t.status == TaskStatus::Completed && !t.follow_up.is_empty() {
                Some((t.subject.clone(), t.follow_up.clone(), t.target_language.clone()))
            } else {
                None
            }
        });
        if let Some((subject, types, language)) = follow_up {
            for task_type in types {
                let mut task = Task::new(subject.clone(), task_type);
                if task_type == TaskType::Translate {
                    if let Some(language) = language.clone() {
                        task = task.with_target_language(language);
                    }
                }
                self.add_task(task);
            }
        }

        self.update_task_dependencies();
    }

    /// Executor progress callback, linearized through the queue.
    pub fn update_task_progress(&mut self, id: Uuid, value: f32, message: Option<&str>) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };
        if task.status != TaskStatus::Processing {
            return;
        }
        task.update_progress(value, message);
        let progress = task.progress;
        self.emit(QueueEvent::TaskProgress { id, progress });
    }

    /// Executor completion callback. Pair with `mark_task_finished`.
    pub fn complete_task(&mut self, id: Uuid) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };
        let before = task.status;
        task.mark_completed();
        if task.status == before {
            return;
        }
        let status = task.status;
        info!("Task {} completed", id);
        self.emit(QueueEvent::TaskStatusChanged { id, status });
    }

    /// Executor failure callback. The queue never retries on its own; the
    /// task stays failed until the caller retries or clears it.
    pub fn fail_task(&mut self, id: Uuid, error: &str) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };
        let before = task.status;
        task.mark_failed(error);
        if task.status == before {
            return;
        }
        let status = task.status;
        warn!("Task {} failed: {}", id, error);
        self.emit(QueueEvent::TaskStatusChanged { id, status });
    }

    /// Cancel a task in any active state. Cancelling in-flight work releases
    /// its slot immediately; actually stopping the work is the executor's
    /// concern (cancellation is cooperative).
    pub fn cancel_task(&mut self, id: Uuid) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        let before = task.status;
        task.mark_cancelled();
        if task.status == before {
            return false;
        }
        let status = task.status;
        self.in_flight.remove(&id);
        info!("Task {} cancelled", id);
        self.emit(QueueEvent::TaskStatusChanged { id, status });
        self.update_task_dependencies();
        true
    }

    /// Retry a failed or cancelled task by resetting it to pending. Any other
    /// state is a no-op.
    pub fn retry_task(&mut self, id: Uuid) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if !matches!(task.status, TaskStatus::Failed | TaskStatus::Cancelled) {
            return false;
        }
        task.reset();
        let status = task.status;
        info!("Task {} queued for retry", id);
        self.emit(QueueEvent::TaskStatusChanged { id, status });
        self.update_task_dependencies();
        true
    }

    /// Destroy a task outright, releasing its slot if it was in flight.
    pub fn remove_task(&mut self, id: Uuid) -> bool {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        self.tasks.remove(pos);
        self.in_flight.remove(&id);
        self.emit(QueueEvent::TaskRemoved { id });
        self.update_task_dependencies();
        true
    }

    pub fn clear_completed(&mut self) {
        self.clear_with_status(TaskStatus::Completed);
    }

    pub fn clear_failed(&mut self) {
        self.clear_with_status(TaskStatus::Failed);
    }

    fn clear_with_status(&mut self, status: TaskStatus) {
        let removed: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id)
            .collect();
        if removed.is_empty() {
            return;
        }
        self.tasks.retain(|t| t.status != status);
        for id in removed {
            self.emit(QueueEvent::TaskRemoved { id });
        }
        self.update_task_dependencies();
    }

    /// Force-cancel all in-flight work and drop every task.
    pub fn clear_all(&mut self) {
        let in_flight: Vec<Uuid> = self.in_flight.iter().copied().collect();
        for id in in_flight {
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                task.mark_cancelled();
                let status = task.status;
                self.emit(QueueEvent::TaskStatusChanged { id, status });
            }
        }
        self.in_flight.clear();
        self.tasks.clear();
        info!("Queue cleared");
        self.emit(QueueEvent::Cleared);
    }

    /// Freeze readiness recomputation and empty `ready_tasks`. In-flight
    /// work is unaffected.
    pub fn pause_processing(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        info!("Queue paused");
        self.emit(QueueEvent::Paused);
    }

    pub fn resume_processing(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        info!("Queue resumed");
        self.emit(QueueEvent::Resumed);
        self.update_task_dependencies();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::new(self.tasks.clone())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.snapshot().to_bytes()
    }

    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot = QueueSnapshot::from_bytes(bytes)?;
        self.restore_snapshot(snapshot);
        Ok(())
    }

    /// Replace the collection with a persisted snapshot. Any task found
    /// `processing` is an orphan of an unclean shutdown and is reset to
    /// pending — work restarts from the beginning, partial progress is not
    /// resumable.
    pub fn restore_snapshot(&mut self, snapshot: QueueSnapshot) {
        self.in_flight.clear();
        self.tasks = snapshot.tasks;

        let mut recovered = 0usize;
        for task in &mut self.tasks {
            if task.status == TaskStatus::Processing {
                warn!(
                    "Task {} ({}) was processing at shutdown, resetting to pending",
                    task.id,
                    task.natural_key()
                );
                task.reset();
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!("Crash recovery reset {} task(s)", recovered);
        }

        self.update_task_dependencies();
    }

    fn emit(&self, event: QueueEvent) {
        // No receivers is fine; events are best-effort for UI layers.
        let _ = self.events.send(event);
    }
}
