//! SQLite database with a single serialized write connection
//!
//! ## Architecture
//!
//! The database owns a per-path lifecycle with three states:
//!
//! - **`Cold`**: no connection; the next [`ensure_open`] starts an open
//!   sequence.
//! - **`Opening`**: an open sequence is in flight; concurrent callers
//!   subscribe to its outcome instead of starting a second one.
//! - **`Ready`**: open and probed; holds the read-only pool and the write
//!   queue whose worker owns the sole read-write connection.
//!
//! ## Open sequence
//!
//! 1. Create the parent directory if absent.
//! 2. Open the read-write connection (WAL journal mode), racing the connect
//!    against a fixed timeout so a stale lock or damaged file fails loudly
//!    instead of hanging.
//! 3. Probe with `SELECT 1`; only a successful probe completes
//!    initialization.
//! 4. Lower the WAL auto-checkpoint threshold (non-fatal on failure).
//! 5. Derive the read-only pool and spawn the write worker.
//!
//! Any failure along the way resets the lifecycle to `Cold` with no
//! half-open handles retained, so a later call retries cleanly.
//!
//! [`ensure_open`]: SingleWriterDatabase::ensure_open

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Pool, Sqlite};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, warn};

use crate::checkpoint::{CheckpointMode, CheckpointStats};
use crate::config::SingleWriterConfig;
use crate::error::{Error, Result};
use crate::write_queue::{WriteOutcome, WriteQueue};

/// Outcome of an open attempt, fanned out to every caller awaiting it.
/// Waiters receive the message rather than the original error, which goes to
/// the caller that ran the attempt.
type InitOutcome = std::result::Result<(), String>;

struct Handles {
   read_pool: Pool<Sqlite>,
   queue: WriteQueue,
   worker: JoinHandle<()>,
}

enum Lifecycle {
   Cold,
   Opening(watch::Receiver<Option<InitOutcome>>),
   Ready(Handles),
}

/// SQLite database whose mutations are serialized through one write
/// connection, with concurrent reads served by a small read-only pool.
///
/// Cloning is cheap and clones share the same underlying lifecycle.
pub struct SingleWriterDatabase {
   inner: Arc<Inner>,
}

struct Inner {
   path: PathBuf,
   config: SingleWriterConfig,
   lifecycle: Mutex<Lifecycle>,
   /// The periodic checkpoint task is armed at most once.
   checkpoint_armed: AtomicBool,
   /// Suppresses opportunistic checkpoints while teardown is in progress.
   closing: AtomicBool,
}

impl SingleWriterDatabase {
   /// Create a database handle for `path`. Cheap; nothing is opened until
   /// [`ensure_open`](Self::ensure_open) runs.
   pub fn new(path: impl Into<PathBuf>, config: SingleWriterConfig) -> Self {
      Self {
         inner: Arc::new(Inner {
            path: path.into(),
            config,
            lifecycle: Mutex::new(Lifecycle::Cold),
            checkpoint_armed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
         }),
      }
   }

   /// The resolved database file path.
   pub fn path(&self) -> &Path {
      &self.inner.path
   }

   /// Whether the database is currently open and probed.
   pub async fn is_open(&self) -> bool {
      matches!(*self.inner.lifecycle.lock().await, Lifecycle::Ready(_))
   }

   /// Ensure the database is open, probed, and usable.
   ///
   /// Idempotent and race-safe: when already open this returns without I/O;
   /// when an open attempt is in flight, this awaits that attempt's outcome
   /// rather than starting a second one; otherwise it runs the open sequence
   /// itself. A failed attempt resets state, so a later call retries fresh.
   pub async fn ensure_open(&self) -> Result<()> {
      enum Role {
         Waiter(watch::Receiver<Option<InitOutcome>>),
         Opener(watch::Sender<Option<InitOutcome>>),
      }

      let role = {
         let mut lifecycle = self.inner.lifecycle.lock().await;
         match &*lifecycle {
            Lifecycle::Ready(_) => return Ok(()),
            Lifecycle::Opening(outcome) => Role::Waiter(outcome.clone()),
            Lifecycle::Cold => {
               let (notify, outcome) = watch::channel(None);
               *lifecycle = Lifecycle::Opening(outcome);
               Role::Opener(notify)
            }
         }
      };

      match role {
         Role::Waiter(mut outcome) => {
            loop {
               let settled = outcome.borrow_and_update().clone();
               if let Some(result) = settled {
                  return result.map_err(Error::Init);
               }
               outcome
                  .changed()
                  .await
                  .map_err(|_| Error::Init("open attempt was abandoned".to_string()))?;
            }
         }
         Role::Opener(notify) => {
            // The attempt runs on its own task so that cancelling this
            // caller cannot strand the lifecycle in `Opening`.
            let inner = Arc::clone(&self.inner);
            let attempt = tokio::spawn(inner.run_open_attempt(notify));
            match attempt.await {
               Ok(result) => result,
               Err(join) => Err(Error::Init(join.to_string())),
            }
         }
      }
   }

   /// The read-only connection pool.
   ///
   /// Reads are not ordered against queued writes; a caller that needs
   /// read-after-write consistency must await the specific write first.
   pub async fn read_pool(&self) -> Result<Pool<Sqlite>> {
      self.ensure_open().await?;
      let lifecycle = self.inner.lifecycle.lock().await;
      match &*lifecycle {
         Lifecycle::Ready(handles) => Ok(handles.read_pool.clone()),
         _ => Err(Error::QueueClosed),
      }
   }

   /// Queue a mutating statement; resolves once that statement completes.
   pub async fn execute(&self, sql: &str) -> Result<WriteOutcome> {
      self.write_queue().await?.execute(sql).await
   }

   /// Queue a mutating statement that also returns rows.
   pub async fn query_write(&self, sql: &str) -> Result<Vec<SqliteRow>> {
      self.write_queue().await?.fetch(sql).await
   }

   /// Queue a schema-altering statement and checkpoint right after it.
   ///
   /// The checkpoint's failure stays out of the caller's result; the
   /// statement itself already succeeded.
   pub async fn execute_schema(&self, sql: &str) -> Result<WriteOutcome> {
      let queue = self.write_queue().await?;
      let outcome = queue.execute(sql).await?;

      match queue.checkpoint(CheckpointMode::Truncate).await {
         Ok(stats) => {
            debug!(
               checkpointed_frames = stats.checkpointed_frames,
               "checkpoint after schema change"
            );
         }
         Err(e) => warn!(error = %e, "checkpoint after schema change failed"),
      }

      Ok(outcome)
   }

   /// Run an explicit checkpoint through the write queue.
   pub async fn checkpoint(&self, mode: CheckpointMode) -> Result<CheckpointStats> {
      self.write_queue().await?.checkpoint(mode).await
   }

   /// Close the database: drain the write queue, close the write connection
   /// and the read pool, and reset the lifecycle. A subsequent
   /// [`ensure_open`](Self::ensure_open) reopens and re-probes.
   pub async fn close(&self) -> Result<()> {
      self.inner.closing.store(true, Ordering::SeqCst);

      let handles = loop {
         let mut lifecycle = self.inner.lifecycle.lock().await;
         match &*lifecycle {
            Lifecycle::Cold => break None,
            Lifecycle::Ready(_) => {
               let Lifecycle::Ready(handles) =
                  std::mem::replace(&mut *lifecycle, Lifecycle::Cold)
               else {
                  unreachable!("matched Ready above");
               };
               break Some(handles);
            }
            Lifecycle::Opening(outcome) => {
               // Let the in-flight open settle before tearing it down.
               let mut outcome = outcome.clone();
               drop(lifecycle);
               while outcome.borrow_and_update().is_none() {
                  if outcome.changed().await.is_err() {
                     break;
                  }
               }
            }
         }
      };

      if let Some(handles) = handles {
         handles.read_pool.close().await;
         handles.queue.shutdown().await;
         let _ = handles.worker.await;
         debug!(path = %self.inner.path.display(), "database closed");
      }

      self.inner.closing.store(false, Ordering::SeqCst);
      Ok(())
   }

   async fn write_queue(&self) -> Result<WriteQueue> {
      self.ensure_open().await?;
      let lifecycle = self.inner.lifecycle.lock().await;
      match &*lifecycle {
         Lifecycle::Ready(handles) => Ok(handles.queue.clone()),
         _ => Err(Error::QueueClosed),
      }
   }
}

impl Clone for SingleWriterDatabase {
   fn clone(&self) -> Self {
      Self {
         inner: Arc::clone(&self.inner),
      }
   }
}

impl std::fmt::Debug for SingleWriterDatabase {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("SingleWriterDatabase")
         .field("path", &self.inner.path)
         .finish_non_exhaustive()
   }
}

impl Inner {
   async fn run_open_attempt(
      self: Arc<Self>,
      notify: watch::Sender<Option<InitOutcome>>,
   ) -> Result<()> {
      let opened = self.open_sequence().await;
      let mut lifecycle = self.lifecycle.lock().await;

      match opened {
         Ok(handles) => {
            *lifecycle = Lifecycle::Ready(handles);
            drop(lifecycle);
            let _ = notify.send(Some(Ok(())));
            self.arm_periodic_checkpoints();
            Ok(())
         }
         Err(e) => {
            *lifecycle = Lifecycle::Cold;
            drop(lifecycle);
            let _ = notify.send(Some(Err(e.to_string())));
            Err(e)
         }
      }
   }

   async fn open_sequence(&self) -> Result<Handles> {
      if let Some(parent) = self.path.parent()
         && !parent.as_os_str().is_empty()
      {
         tokio::fs::create_dir_all(parent).await?;
      }

      let write_options = SqliteConnectOptions::new()
         .filename(&self.path)
         .create_if_missing(true)
         .journal_mode(SqliteJournalMode::Wal)
         .busy_timeout(self.config.busy_timeout)
         .foreign_keys(true);

      let mut conn = match timeout(self.config.open_timeout, write_options.connect()).await {
         Ok(connected) => connected?,
         Err(_) => {
            return Err(Error::OpenTimeout {
               path: self.path.display().to_string(),
               waited: self.config.open_timeout,
            });
         }
      };

      // Probe failure means the connection opened but is unusable; treated
      // exactly like an open failure.
      if let Err(probe) = sqlx::query_scalar::<_, i64>("SELECT 1")
         .fetch_one(&mut conn)
         .await
      {
         let _ = conn.close().await;
         return Err(Error::Sqlx(probe));
      }

      let autocheckpoint = format!(
         "PRAGMA wal_autocheckpoint = {}",
         self.config.wal_autocheckpoint_pages
      );
      if let Err(e) = sqlx::query(&autocheckpoint).execute(&mut conn).await {
         warn!(
            error = %e,
            "could not lower WAL auto-checkpoint threshold; continuing with the engine default"
         );
      }

      // The write connection has created and configured the file by now, so
      // read-only connections can attach to it.
      let read_options = SqliteConnectOptions::new()
         .filename(&self.path)
         .journal_mode(SqliteJournalMode::Wal)
         .read_only(true)
         .busy_timeout(self.config.busy_timeout);

      let read_pool = match SqlitePoolOptions::new()
         .max_connections(self.config.max_read_connections)
         .idle_timeout(Some(self.config.idle_timeout))
         .connect_with(read_options)
         .await
      {
         Ok(pool) => pool,
         Err(e) => {
            let _ = conn.close().await;
            return Err(Error::Sqlx(e));
         }
      };

      debug!(path = %self.path.display(), "database opened and probed");

      let (queue, worker) = WriteQueue::spawn(conn, self.config.write_queue_depth);

      Ok(Handles {
         read_pool,
         queue,
         worker,
      })
   }

   /// Start the periodic checkpoint task. Armed at most once; the task holds
   /// only a weak reference, so it keeps neither the database nor the
   /// process alive, and it simply skips ticks while the database is cold or
   /// closing.
   fn arm_periodic_checkpoints(self: &Arc<Self>) {
      if self.checkpoint_armed.swap(true, Ordering::SeqCst) {
         return;
      }

      let database = Arc::downgrade(self);
      let period = self.config.checkpoint_interval;

      tokio::spawn(async move {
         let mut ticker = tokio::time::interval(period);
         ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
         // An interval's first tick completes immediately; swallow it so the
         // first checkpoint happens one full period after arming.
         ticker.tick().await;

         loop {
            ticker.tick().await;

            let Some(inner) = database.upgrade() else {
               break;
            };
            if inner.closing.load(Ordering::SeqCst) {
               continue;
            }

            let queue = match &*inner.lifecycle.lock().await {
               Lifecycle::Ready(handles) => Some(handles.queue.clone()),
               _ => None,
            };
            let Some(queue) = queue else {
               continue;
            };

            match queue.checkpoint(CheckpointMode::Truncate).await {
               Ok(stats) => {
                  debug!(
                     wal_frames = stats.wal_frames,
                     checkpointed_frames = stats.checkpointed_frames,
                     "periodic checkpoint complete"
                  );
               }
               Err(e) => warn!(error = %e, "periodic checkpoint failed"),
            }
         }
      });
   }
}
