//! # sqlx-sqlite-single-writer
//!
//! A minimal wrapper around SQLx that gives a SQLite database exactly one
//! serialized write connection, a strict-FIFO write queue, and WAL
//! checkpoint scheduling.
//!
//! ## Core Types
//!
//! - **[`SingleWriterDatabase`]**: main database type; owns the connection
//!   lifecycle, the write queue, and the checkpoint scheduler
//! - **[`SingleWriterConfig`]**: timeouts, pool sizing, and checkpoint
//!   cadence
//! - **[`WriteOutcome`]**: per-statement result of a queued write
//! - **[`CheckpointMode`]** / **[`CheckpointStats`]**: engine-level
//!   checkpoint vocabulary
//! - **[`Error`]**: error type for database operations
//!
//! ## Architecture
//!
//! - **Single writer**: one read-write connection, owned by a dedicated
//!   worker task; mutations queue through a bounded channel and execute
//!   strictly in submission order, one at a time
//! - **Isolated failure**: a failing statement rejects only its own caller;
//!   the queue always advances
//! - **Concurrent reads**: a small read-only pool serves queries, unordered
//!   relative to queued writes
//! - **Checkpointing**: a lowered WAL auto-checkpoint threshold, an
//!   immediate checkpoint after schema changes, and a periodic opportunistic
//!   checkpoint bound WAL growth between unclean shutdowns
//!
//! # Example
//!
//! ```no_run
//! use sqlx_sqlite_single_writer::{SingleWriterConfig, SingleWriterDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let db = SingleWriterDatabase::new("planner.db", SingleWriterConfig::default());
//!    db.ensure_open().await?;
//!
//!    db.execute_schema("CREATE TABLE IF NOT EXISTS goals (id INTEGER PRIMARY KEY, name TEXT)")
//!       .await?;
//!    let inserted = db.execute("INSERT INTO goals (name) VALUES ('ship it')").await?;
//!    assert_eq!(inserted.rows_affected, 1);
//!
//!    // Reads go straight to the read-only pool.
//!    let rows = sqlx::query("SELECT name FROM goals")
//!       .fetch_all(&db.read_pool().await?)
//!       .await?;
//!    assert_eq!(rows.len(), 1);
//!
//!    db.close().await?;
//!    Ok(())
//! }
//! ```

mod checkpoint;
mod config;
mod database;
mod error;
mod write_queue;

// Re-export public types
pub use checkpoint::{CheckpointMode, CheckpointStats};
pub use config::SingleWriterConfig;
pub use database::SingleWriterDatabase;
pub use error::{Error, Result};
pub use write_queue::WriteOutcome;
