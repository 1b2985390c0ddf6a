//! # moonlight-db
//!
//! Embedded SQLite persistence layer for the Moonlight side-hustle planner.
//! Every other module in the planner — profile, goal, skill, trade, and
//! inventory CRUD, job prospection, the wellness/financial heuristics, and
//! the agent orchestration — consumes this crate as an opaque persistence
//! service.
//!
//! ## Core Types
//!
//! - **[`Persistence`]**: the service itself — `init`, `query`, `execute`,
//!   `execute_schema`, `query_write`, `close`, `info`, and the signal-driven
//!   `shutdown`
//! - **[`DatabaseSettings`]**: environment-driven resolution of the database
//!   location
//! - **[`escape_text`] / [`sql_literal`]**: injection-safe literal escaping
//!   for interpolated statements
//! - **[`Error`]**: error type with machine-readable codes for the route
//!   layer
//!
//! ## Architecture
//!
//! - **Single writer**: all mutations funnel through
//!   [`sqlx_sqlite_single_writer`]'s FIFO write queue; one statement runs at
//!   a time, in submission order
//! - **Unordered reads**: queries run on a read-only pool and are not
//!   ordered against pending writes — await the write's future first when
//!   read-after-write consistency matters
//! - **Checkpointing**: schema changes checkpoint immediately; a background
//!   timer checkpoints periodically; shutdown checkpoints one final time
//! - **JSON rows**: results decode into column-order-preserving
//!   `IndexMap<String, serde_json::Value>` rows

mod decode;
mod error;
mod escape;
mod service;
mod settings;
mod shutdown;

pub use error::{Error, Result};
pub use escape::{escape_text, sql_literal};
pub use service::{DatabaseInfo, Persistence};
pub use settings::{DATA_DIR_VAR, DB_PATH_VAR, DatabaseSettings};
pub use shutdown::ShutdownPhase;

// Re-export the connection-manager vocabulary consumers need for
// configuration and maintenance flows.
pub use sqlx_sqlite_single_writer::{
   CheckpointMode, CheckpointStats, SingleWriterConfig, WriteOutcome,
};
