//! Subject-availability collaborator.
//!
//! When a task's prerequisite type has no sibling task in the queue, the
//! scheduler asks the host whether the subject already possesses the artifact
//! that type would have produced (e.g. "does this video already have a
//! transcript?"). An unconfirmable artifact counts as unsatisfied.

use crate::task::TaskSubject;
use crate::task_type::TaskType;
use parking_lot::Mutex;
use std::collections::HashSet;

pub trait ArtifactProbe: Send + Sync {
    /// Whether `subject` already possesses the artifact `produced_by` would
    /// produce, independent of any task history.
    fn has_artifact(&self, subject: &TaskSubject, produced_by: TaskType) -> bool;
}

/// Probe for hosts that track nothing: every artifact reads as absent, so
/// prerequisites are only ever satisfied by completed sibling tasks.
pub struct NoArtifacts;

impl ArtifactProbe for NoArtifacts {
    fn has_artifact(&self, _subject: &TaskSubject, _produced_by: TaskType) -> bool {
        false
    }
}

/// In-memory artifact catalogue keyed by (subject, producing type).
///
/// Embedders record artifacts as the host catalogue learns about them
/// (import finished, transcript attached); the queue consults it during
/// readiness recomputation.
#[derive(Default)]
pub struct MemoryCatalog {
    artifacts: Mutex<HashSet<(TaskSubject, TaskType)>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, subject: TaskSubject, produced_by: TaskType) {
        self.artifacts.lock().insert((subject, produced_by));
    }

    pub fn forget(&self, subject: &TaskSubject, produced_by: TaskType) {
        self.artifacts.lock().remove(&(subject.clone(), produced_by));
    }
}

impl ArtifactProbe for MemoryCatalog {
    fn has_artifact(&self, subject: &TaskSubject, produced_by: TaskType) -> bool {
        self.artifacts
            .lock()
            .contains(&(subject.clone(), produced_by))
    }
}
