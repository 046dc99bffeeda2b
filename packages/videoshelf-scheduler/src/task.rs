use crate::error::{Result, SchedulerError};
use crate::task_type::TaskType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// What a task operates on: a library video or a not-yet-imported source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSubject {
    Video(Uuid),
    Source(PathBuf),
}

impl std::fmt::Display for TaskSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskSubject::Video(id) => write!(f, "video:{}", id),
            TaskSubject::Source(path) => write!(f, "source:{}", path.display()),
        }
    }
}

/// Task lifecycle states.
///
/// `Completed` is the only state with no outgoing transition; `Failed` and
/// `Cancelled` can be un-terminated through `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    WaitingForDependencies,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::WaitingForDependencies => "waiting_for_dependencies",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "waiting_for_dependencies" => Ok(TaskStatus::WaitingForDependencies),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(SchedulerError::parse(format!("Invalid task status: {}", s))),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub(crate) const WAITING_MESSAGE: &str = "Waiting for dependencies";

/// A single unit of background work bound to a subject and a type.
///
/// The queue exclusively owns the authoritative task list; everything else
/// holds transient clones and mutates state through the queue's operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub subject: TaskSubject,
    pub task_type: TaskType,

    pub status: TaskStatus,
    /// Fraction complete, always within [0.0, 1.0].
    pub progress: f32,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Re-run even when the produced artifact already exists. Carried for the
    /// executor; the scheduler itself does not interpret it.
    #[serde(default)]
    pub force_reprocess: bool,
    /// Task types to auto-enqueue for the same subject once this completes.
    #[serde(default)]
    pub follow_up: Vec<TaskType>,
    /// Target locale for translation work.
    #[serde(default)]
    pub target_language: Option<String>,
}

impl Task {
    pub fn new(subject: TaskSubject, task_type: TaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            task_type,
            status: TaskStatus::Pending,
            progress: 0.0,
            status_message: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            force_reprocess: false,
            follow_up: Vec::new(),
            target_language: None,
        }
    }

    pub fn with_force_reprocess(mut self) -> Self {
        self.force_reprocess = true;
        self
    }

    pub fn with_follow_up(mut self, follow_up: Vec<TaskType>) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }

    /// Deterministic key over (subject, type), used to reject duplicate
    /// enqueues of equivalent work.
    pub fn natural_key(&self) -> String {
        format!("{}:{}", self.task_type, self.subject)
    }

    /// Transition: Pending -> Processing. No-op from any other state; the
    /// queue only admits pending tasks, so a mismatch here is a caller error.
    pub fn mark_started(&mut self) {
        if self.status != TaskStatus::Pending {
            return;
        }
        self.status = TaskStatus::Processing;
        self.progress = 0.0;
        self.started_at = Some(Utc::now());
    }

    /// Transition: Pending -> WaitingForDependencies.
    pub fn mark_waiting(&mut self) {
        if self.status != TaskStatus::Pending {
            return;
        }
        self.status = TaskStatus::WaitingForDependencies;
        self.status_message = Some(WAITING_MESSAGE.to_string());
    }

    /// Transition: WaitingForDependencies -> Pending.
    pub fn mark_ready(&mut self) {
        if self.status != TaskStatus::WaitingForDependencies {
            return;
        }
        self.status = TaskStatus::Pending;
        self.status_message = None;
    }

    /// Clamps `value` to [0.0, 1.0]. Only meaningful while processing.
    pub fn update_progress(&mut self, value: f32, message: Option<&str>) {
        if self.status != TaskStatus::Processing {
            return;
        }
        self.progress = value.clamp(0.0, 1.0);
        if let Some(message) = message {
            self.status_message = Some(message.to_string());
        }
    }

    /// Transition: Processing -> Completed. Terminal.
    pub fn mark_completed(&mut self) {
        if self.status != TaskStatus::Processing {
            return;
        }
        self.status = TaskStatus::Completed;
        self.progress = 1.0;
        self.completed_at = Some(Utc::now());
        self.error_message = None;
    }

    /// Transition: Processing -> Failed. Terminal until retried.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.status != TaskStatus::Processing {
            return;
        }
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
    }

    /// Transition: Pending/WaitingForDependencies/Processing -> Cancelled.
    pub fn mark_cancelled(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.error_message = None;
    }

    /// Returns a failed, cancelled, or crash-recovered task to Pending,
    /// clearing progress, messages, and timing. The only un-terminating
    /// transition; completed tasks stay completed.
    pub fn reset(&mut self) {
        if !matches!(
            self.status,
            TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Processing
        ) {
            return;
        }
        self.status = TaskStatus::Pending;
        self.progress = 0.0;
        self.status_message = None;
        self.error_message = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_task(ty: TaskType) -> Task {
        Task::new(TaskSubject::Video(Uuid::new_v4()), ty)
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = video_task(TaskType::Transcribe);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::WaitingForDependencies,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::from_str("stalled").is_err());
    }

    #[test]
    fn test_natural_key_distinguishes_type_and_subject() {
        let video = Uuid::new_v4();
        let a = Task::new(TaskSubject::Video(video), TaskType::Transcribe);
        let b = Task::new(TaskSubject::Video(video), TaskType::Translate);
        let c = Task::new(TaskSubject::Video(Uuid::new_v4()), TaskType::Transcribe);
        assert_eq!(a.natural_key(), a.natural_key());
        assert_ne!(a.natural_key(), b.natural_key());
        assert_ne!(a.natural_key(), c.natural_key());
    }

    #[test]
    fn test_start_records_timing() {
        let mut task = video_task(TaskType::Download);
        task.mark_started();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.started_at.is_some());
    }

    #[test]
    fn test_start_only_from_pending() {
        let mut task = video_task(TaskType::Download);
        task.mark_started();
        task.mark_completed();
        let completed_at = task.completed_at;
        task.mark_started();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, completed_at);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut task = video_task(TaskType::Transcribe);
        task.mark_started();
        task.update_progress(1.7, Some("Transcribing"));
        assert_eq!(task.progress, 1.0);
        task.update_progress(-0.3, None);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.status_message.as_deref(), Some("Transcribing"));
    }

    #[test]
    fn test_progress_ignored_unless_processing() {
        let mut task = video_task(TaskType::Transcribe);
        task.update_progress(0.5, None);
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn test_complete_forces_progress_and_clears_error() {
        let mut task = video_task(TaskType::Thumbnail);
        task.mark_started();
        task.update_progress(0.4, None);
        task.mark_completed();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert!(task.completed_at.is_some());
        assert!(task.error_message.is_none());
    }

    #[test]
    fn test_fail_records_error() {
        let mut task = video_task(TaskType::Transcribe);
        task.mark_started();
        task.mark_failed("speech service unavailable");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.error_message.as_deref(),
            Some("speech service unavailable")
        );
    }

    #[test]
    fn test_cancel_from_waiting() {
        let mut task = video_task(TaskType::Translate);
        task.mark_waiting();
        task.mark_cancelled();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_cancel_does_not_touch_completed() {
        let mut task = video_task(TaskType::Download);
        task.mark_started();
        task.mark_completed();
        task.mark_cancelled();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_reset_clears_failure_state() {
        let mut task = video_task(TaskType::Transcribe);
        task.mark_started();
        task.mark_failed("boom");
        task.reset();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.error_message.is_none());
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_reset_recovers_crashed_processing_task() {
        let mut task = video_task(TaskType::Download);
        task.mark_started();
        task.update_progress(0.8, None);
        task.reset();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn test_reset_never_unterminates_completed() {
        let mut task = video_task(TaskType::Download);
        task.mark_started();
        task.mark_completed();
        task.reset();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_builder_fields() {
        let task = video_task(TaskType::Transcribe)
            .with_force_reprocess()
            .with_follow_up(vec![TaskType::Translate, TaskType::Summarize])
            .with_target_language("de-DE");
        assert!(task.force_reprocess);
        assert_eq!(task.follow_up, vec![TaskType::Translate, TaskType::Summarize]);
        assert_eq!(task.target_language.as_deref(), Some("de-DE"));
    }
}
