//! Durable representation of the queue's task list.
//!
//! The snapshot is a flat, order-preserving list; in-flight bookkeeping and
//! the paused flag are deliberately not persisted. Restoring treats any task
//! found `processing` as an orphan of an unclean shutdown (see
//! `TaskQueue::restore_snapshot`).

use crate::error::{Result, SchedulerError};
use crate::task::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub tasks: Vec<Task>,
}

impl QueueSnapshot {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(SchedulerError::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(SchedulerError::serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskSubject;
    use crate::task_type::TaskType;
    use uuid::Uuid;

    #[test]
    fn test_snapshot_roundtrip() {
        let subject = TaskSubject::Video(Uuid::new_v4());
        let mut failed = Task::new(subject.clone(), TaskType::Transcribe);
        failed.mark_started();
        failed.mark_failed("no audio track");

        let snapshot = QueueSnapshot::new(vec![
            Task::new(subject.clone(), TaskType::Download),
            failed,
            Task::new(subject, TaskType::Translate).with_target_language("fr-FR"),
        ]);

        let bytes = snapshot.to_bytes().unwrap();
        let restored = QueueSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(QueueSnapshot::from_bytes(b"not a snapshot").is_err());
    }
}
