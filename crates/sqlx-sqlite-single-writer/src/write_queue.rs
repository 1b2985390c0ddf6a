//! FIFO serialization of mutating statements.
//!
//! A single spawned worker task owns the sole read-write connection and
//! drains a bounded channel of write requests. Statements therefore execute
//! strictly in submission order, one at a time, no matter how many callers
//! submit concurrently. Each request carries its own reply channel, so a
//! failing statement rejects only its own caller and the worker always
//! advances to the next request.
//!
//! The engine cannot cancel an in-flight statement, so queued writes carry
//! no timeout; a statement that never completes blocks the queue behind it.

use serde::{Deserialize, Serialize};
use sqlx::Connection;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::checkpoint::{self, CheckpointMode, CheckpointStats};
use crate::error::{Error, Result};

/// Result of a queued write (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WriteOutcome {
   /// The number of rows affected by the statement.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT statements on tables with a ROWID.
   pub last_insert_id: i64,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum WriteCommand {
   Execute { sql: String, reply: Reply<WriteOutcome> },
   Fetch { sql: String, reply: Reply<Vec<SqliteRow>> },
   Checkpoint { mode: CheckpointMode, reply: Reply<CheckpointStats> },
   Close { reply: oneshot::Sender<()> },
}

/// Cloneable handle submitting requests to the write worker.
#[derive(Clone)]
pub(crate) struct WriteQueue {
   commands: mpsc::Sender<WriteCommand>,
}

impl WriteQueue {
   /// Spawn the worker that takes ownership of the write connection.
   pub(crate) fn spawn(conn: SqliteConnection, depth: usize) -> (Self, JoinHandle<()>) {
      let (commands, requests) = mpsc::channel(depth);
      let worker = tokio::spawn(run_worker(conn, requests));

      (Self { commands }, worker)
   }

   /// Queue a mutating statement and await its outcome.
   pub(crate) async fn execute(&self, sql: impl Into<String>) -> Result<WriteOutcome> {
      let sql = sql.into();
      self.submit(|reply| WriteCommand::Execute { sql, reply }).await
   }

   /// Queue a mutating statement that also reports rows, for
   /// insert-then-fetch and `RETURNING` patterns.
   pub(crate) async fn fetch(&self, sql: impl Into<String>) -> Result<Vec<SqliteRow>> {
      let sql = sql.into();
      self.submit(|reply| WriteCommand::Fetch { sql, reply }).await
   }

   /// Queue a checkpoint; it serializes with the writes around it.
   pub(crate) async fn checkpoint(&self, mode: CheckpointMode) -> Result<CheckpointStats> {
      self.submit(|reply| WriteCommand::Checkpoint { mode, reply }).await
   }

   /// Stop accepting requests, drain whatever was already queued, and close
   /// the write connection. Resolves once the connection is closed.
   pub(crate) async fn shutdown(&self) {
      let (reply, closed) = oneshot::channel();
      if self.commands.send(WriteCommand::Close { reply }).await.is_ok() {
         let _ = closed.await;
      }
   }

   async fn submit<T>(&self, request: impl FnOnce(Reply<T>) -> WriteCommand) -> Result<T> {
      let (reply, response) = oneshot::channel();
      self
         .commands
         .send(request(reply))
         .await
         .map_err(|_| Error::QueueClosed)?;

      response.await.map_err(|_| Error::QueueClosed)?
   }
}

async fn run_worker(mut conn: SqliteConnection, mut requests: mpsc::Receiver<WriteCommand>) {
   let mut close_reply: Option<oneshot::Sender<()>> = None;

   while let Some(command) = requests.recv().await {
      match command {
         WriteCommand::Execute { sql, reply } => {
            let outcome = sqlx::query(&sql)
               .execute(&mut conn)
               .await
               .map(|done| WriteOutcome {
                  rows_affected: done.rows_affected(),
                  last_insert_id: done.last_insert_rowid(),
               })
               .map_err(Error::from);

            // A dropped caller cannot stall the queue; the statement ran.
            let _ = reply.send(outcome);
         }
         WriteCommand::Fetch { sql, reply } => {
            let rows = sqlx::query(&sql)
               .fetch_all(&mut conn)
               .await
               .map_err(Error::from);

            let _ = reply.send(rows);
         }
         WriteCommand::Checkpoint { mode, reply } => {
            let stats = checkpoint::run(&mut conn, mode).await;
            let _ = reply.send(stats);
         }
         WriteCommand::Close { reply } => {
            // Stop accepting new requests but keep draining the ones that
            // were already queued ahead of the close.
            requests.close();
            close_reply = Some(reply);
         }
      }
   }

   debug!("write queue drained, closing write connection");
   if let Err(e) = conn.close().await {
      warn!(error = %e, "error closing write connection");
   }

   if let Some(reply) = close_reply {
      let _ = reply.send(());
   }
}
