//! SQLite adapter for `QueueStateStore`.
//!
//! One row per task; the `position` column preserves the queue's insertion
//! order (the FIFO tie-break depends on it). `save` replaces the whole
//! table in one transaction, so a partially-written snapshot is never
//! observable. An empty snapshot reads back as `None`, same as a store that
//! was never written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;
use videoshelf_scheduler::{QueueSnapshot, Task, TaskStatus, TaskType};

use crate::domain::QueueStateStore;
use crate::error::{Result, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue_tasks (
    position        INTEGER PRIMARY KEY,
    id              TEXT NOT NULL UNIQUE,
    subject         TEXT NOT NULL,
    task_type       TEXT NOT NULL,
    status          TEXT NOT NULL,
    progress        REAL NOT NULL,
    status_message  TEXT,
    error_message   TEXT,
    created_at      TEXT NOT NULL,
    started_at      TEXT,
    completed_at    TEXT,
    force_reprocess INTEGER NOT NULL DEFAULT 0,
    follow_up       TEXT NOT NULL DEFAULT '[]',
    target_language TEXT
);
";

const INSERT: &str = "
INSERT INTO queue_tasks (
    position, id, subject, task_type, status, progress, status_message,
    error_message, created_at, started_at, completed_at, force_reprocess,
    follow_up, target_language
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
";

const SELECT: &str = "
SELECT id, subject, task_type, status, progress, status_message,
       error_message, created_at, started_at, completed_at, force_reprocess,
       follow_up, target_language
FROM queue_tasks
ORDER BY position
";

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl QueueStateStore for SqliteStateStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM queue_tasks", [])?;
        {
            let mut stmt = tx.prepare(INSERT)?;
            for (position, task) in snapshot.tasks.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    task.id.to_string(),
                    serde_json::to_string(&task.subject)?,
                    task.task_type.as_str(),
                    task.status.as_str(),
                    task.progress as f64,
                    task.status_message,
                    task.error_message,
                    task.created_at,
                    task.started_at,
                    task.completed_at,
                    task.force_reprocess,
                    serde_json::to_string(&task.follow_up)?,
                    task.target_language,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Persisted {} task(s)", snapshot.len());
        Ok(())
    }

    async fn load(&self) -> Result<Option<QueueSnapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT)?;
        let rows = stmt.query_map([], |row| {
            Ok(TaskRow {
                id: row.get(0)?,
                subject: row.get(1)?,
                task_type: row.get(2)?,
                status: row.get(3)?,
                progress: row.get(4)?,
                status_message: row.get(5)?,
                error_message: row.get(6)?,
                created_at: row.get(7)?,
                started_at: row.get(8)?,
                completed_at: row.get(9)?,
                force_reprocess: row.get(10)?,
                follow_up: row.get(11)?,
                target_language: row.get(12)?,
            })
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        if tasks.is_empty() {
            return Ok(None);
        }
        debug!("Loaded {} task(s)", tasks.len());
        Ok(Some(QueueSnapshot::new(tasks)))
    }

    async fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM queue_tasks", [])?;
        Ok(())
    }
}

/// Raw column values, converted to a `Task` outside the rusqlite closure so
/// conversion failures surface as `StoreError`s rather than database errors.
struct TaskRow {
    id: String,
    subject: String,
    task_type: String,
    status: String,
    progress: f64,
    status_message: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    force_reprocess: bool,
    follow_up: String,
    target_language: Option<String>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        Ok(Task {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| StoreError::serialization(format!("Invalid task id: {}", e)))?,
            subject: serde_json::from_str(&self.subject)?,
            task_type: TaskType::from_str(&self.task_type)
                .map_err(|e| StoreError::serialization(e.to_string()))?,
            status: TaskStatus::from_str(&self.status)
                .map_err(|e| StoreError::serialization(e.to_string()))?,
            progress: self.progress as f32,
            status_message: self.status_message,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            force_reprocess: self.force_reprocess,
            follow_up: serde_json::from_str(&self.follow_up)?,
            target_language: self.target_language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use videoshelf_scheduler::TaskSubject;

    fn sample_snapshot() -> QueueSnapshot {
        let subject = TaskSubject::Video(Uuid::new_v4());

        let mut completed = Task::new(subject.clone(), TaskType::Download);
        completed.mark_started();
        completed.mark_completed();

        let mut failed = Task::new(subject.clone(), TaskType::Transcribe)
            .with_follow_up(vec![TaskType::Translate])
            .with_target_language("ko-KR");
        failed.mark_started();
        failed.update_progress(0.4, Some("Transcribing audio"));
        failed.mark_failed("speech service unavailable");

        let mut waiting = Task::new(subject, TaskType::Summarize);
        waiting.mark_waiting();

        let import = Task::new(
            TaskSubject::Source("/media/inbox/holiday.mp4".into()),
            TaskType::Import,
        )
        .with_force_reprocess();

        QueueSnapshot::new(vec![completed, failed, waiting, import])
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        assert!(store.load().await.unwrap().is_none());

        let snapshot = sample_snapshot();
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.save(&sample_snapshot()).await.unwrap();

        let replacement = QueueSnapshot::new(vec![Task::new(
            TaskSubject::Video(Uuid::new_v4()),
            TaskType::Thumbnail,
        )]);
        store.save(&replacement).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, replacement);
    }

    #[tokio::test]
    async fn test_clear_leaves_nothing_to_load() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.save(&sample_snapshot()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_reads_persisted_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.db");

        let snapshot = sample_snapshot();
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.save(&snapshot).await.unwrap();
        }

        let store = SqliteStateStore::open(&path).unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.tasks[1].error_message.as_deref(), Some("speech service unavailable"));
    }
}
