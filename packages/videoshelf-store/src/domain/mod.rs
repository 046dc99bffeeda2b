//! Domain layer: the queue-state persistence port.
//!
//! The scheduler treats durable storage as an external collaborator: it
//! hands over its flat, order-preserving task snapshot on shutdown and asks
//! for it back on startup. Crash handling (resetting tasks that were
//! processing) is the scheduler's job, not the store's — an adapter only
//! has to preserve the list faithfully, including insertion order.
//!
//! # Port Trait
//!
//! - `QueueStateStore`: primary storage abstraction
//!
//! # Adapters
//!
//! - `MemoryStateStore` (here): in-process, for tests and ephemeral hosts
//! - `SqliteStateStore` (infrastructure): durable, one row per task

use async_trait::async_trait;
use parking_lot::Mutex;
use videoshelf_scheduler::QueueSnapshot;

use crate::Result;

/// Storage abstraction for the scheduler's task snapshot.
///
/// ```rust,ignore
/// async fn shutdown(queue: &TaskQueue, store: &impl QueueStateStore) -> Result<()> {
///     store.save(&queue.snapshot()).await
/// }
///
/// async fn startup(queue: &mut TaskQueue, store: &impl QueueStateStore) -> Result<()> {
///     if let Some(snapshot) = store.load().await? {
///         queue.restore_snapshot(snapshot);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait QueueStateStore: Send + Sync {
    /// Persist a snapshot, replacing whatever was stored before.
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<()>;

    /// Load the last saved snapshot. `None` when nothing has been stored
    /// (or the store was cleared).
    async fn load(&self) -> Result<Option<QueueSnapshot>>;

    /// Drop the stored snapshot.
    async fn clear(&self) -> Result<()>;
}

/// In-memory adapter for tests and hosts without durable state.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<QueueSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStateStore for MemoryStateStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<()> {
        *self.inner.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<QueueSnapshot>> {
        Ok(self.inner.lock().clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use videoshelf_scheduler::{Task, TaskSubject, TaskType};

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert!(store.load().await.unwrap().is_none());

        let snapshot = QueueSnapshot::new(vec![Task::new(
            TaskSubject::Video(Uuid::new_v4()),
            TaskType::Download,
        )]);
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryStateStore::new();
        let snapshot = QueueSnapshot::new(vec![Task::new(
            TaskSubject::Source("/media/inbox/clip.mp4".into()),
            TaskType::Import,
        )]);
        store.save(&snapshot).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
