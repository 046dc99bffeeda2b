//! Queue-state persistence for the videoshelf scheduler.
//!
//! The scheduler's crash-recovery contract only needs two operations from
//! durable storage: persist the flat task snapshot on shutdown, hand it back
//! on startup. This crate defines that port (`QueueStateStore`) and ships an
//! in-memory adapter plus a SQLite adapter (feature `sqlite`, on by
//! default).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use videoshelf_store::{QueueStateStore, SqliteStateStore};
//!
//! let store = SqliteStateStore::open(data_dir.join("queue.db"))?;
//!
//! // startup
//! if let Some(snapshot) = store.load().await? {
//!     queue.restore_snapshot(snapshot); // resets processing orphans
//! }
//!
//! // shutdown
//! store.save(&queue.snapshot()).await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use domain::{MemoryStateStore, QueueStateStore};
pub use error::{ErrorKind, Result, StoreError};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteStateStore;
