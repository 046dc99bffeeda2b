/*
 * Videoshelf Scheduler - Background Processing Queue
 *
 * Turns library actions ("transcribe this video", "import these files") into
 * a bounded set of concurrently-executing, dependency-ordered tasks.
 *
 * Architecture:
 * - Task Type Registry (closed enum + static dependency graph)
 * - Task State Machine (pending / waiting / processing / terminal)
 * - Queue (dedup by natural key, readiness sweep, FIFO admission under a cap)
 * - Snapshot / Crash Recovery (processing orphans reset to pending)
 * - Executor Harness (pluggable handlers, worker pool)
 * - Queue Events (broadcast channel for UI layers)
 */

// Public modules
pub mod availability;
pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod snapshot;
pub mod task;
pub mod task_type;

// Re-exports
pub use availability::{ArtifactProbe, MemoryCatalog, NoArtifacts};
pub use error::{Result, SchedulerError};
pub use events::QueueEvent;
pub use executor::{shared_queue, Executor, ExecutorConfig, ProgressHandle, SharedQueue, TaskHandler};
pub use queue::{QueueConfig, QueueStats, TaskQueue};
pub use snapshot::QueueSnapshot;
pub use task::{Task, TaskStatus, TaskSubject};
pub use task_type::TaskType;
