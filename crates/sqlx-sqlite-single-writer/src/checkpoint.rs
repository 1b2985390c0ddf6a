//! WAL checkpointing: modes, result decoding, and the checkpoint statement.
//!
//! A checkpoint flushes WAL contents back into the main store file, shrinking
//! the WAL and hardening durability. Checkpoints always run on the write
//! connection, so they travel through the write queue like any other mutating
//! statement.

use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

use crate::error::Result;

/// Engine-level checkpoint modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointMode {
   /// Checkpoint as many frames as possible without waiting on readers.
   Passive,
   /// Wait for writers, then checkpoint all frames.
   Full,
   /// Like `Full`, and additionally wait until readers move past the WAL.
   Restart,
   /// Like `Restart`, and additionally truncate the WAL file to zero bytes.
   Truncate,
}

impl CheckpointMode {
   pub(crate) fn statement(self) -> &'static str {
      match self {
         Self::Passive => "PRAGMA wal_checkpoint(PASSIVE)",
         Self::Full => "PRAGMA wal_checkpoint(FULL)",
         Self::Restart => "PRAGMA wal_checkpoint(RESTART)",
         Self::Truncate => "PRAGMA wal_checkpoint(TRUNCATE)",
      }
   }
}

/// Outcome of a checkpoint, decoded from the engine's `(busy, log,
/// checkpointed)` result row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckpointStats {
   /// True when the checkpoint could not complete because of a concurrent
   /// reader or writer.
   pub busy: bool,

   /// Total frames in the WAL at the time of the checkpoint.
   pub wal_frames: i64,

   /// Frames moved into the main store file.
   pub checkpointed_frames: i64,
}

pub(crate) async fn run(conn: &mut SqliteConnection, mode: CheckpointMode) -> Result<CheckpointStats> {
   let row = sqlx::query(mode.statement()).fetch_one(&mut *conn).await?;
   let busy: i64 = row.try_get(0)?;
   let wal_frames: i64 = row.try_get(1)?;
   let checkpointed_frames: i64 = row.try_get(2)?;

   Ok(CheckpointStats {
      busy: busy != 0,
      wal_frames,
      checkpointed_frames,
   })
}
