//! Discrete queue events for UI layers.
//!
//! The queue broadcasts state changes over a `tokio::sync::broadcast`
//! channel instead of exposing observable properties, keeping the scheduler
//! decoupled from any presentation framework. Lagging subscribers lose old
//! events; senders never block.

use crate::task::TaskStatus;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    TaskAdded { id: Uuid },
    TaskStatusChanged { id: Uuid, status: TaskStatus },
    TaskProgress { id: Uuid, progress: f32 },
    TaskRemoved { id: Uuid },
    Paused,
    Resumed,
    Cleared,
}
