//! Signal-driven teardown of the persistence service.
//!
//! Termination follows `Running -> ShuttingDown -> Closed`, entered on the
//! first of Ctrl+C/SIGTERM: one final best-effort checkpoint, then the write
//! queue and read pool close and the process exits. A second signal while
//! shutting down is a no-op. Termination must not hang, so nothing on this
//! path is retried.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use sqlx_sqlite_single_writer::CheckpointMode;
use tracing::{debug, info, warn};

use crate::service::Persistence;

/// Teardown progress, advanced exactly once per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
   Running,
   ShuttingDown,
   Closed,
}

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Debug, Default)]
pub(crate) struct ShutdownState {
   phase: AtomicU8,
   handlers_installed: AtomicBool,
}

impl ShutdownState {
   pub(crate) fn new() -> Self {
      Self::default()
   }

   /// Transition `Running -> ShuttingDown`; false when teardown already ran.
   fn begin(&self) -> bool {
      self
         .phase
         .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::SeqCst, Ordering::SeqCst)
         .is_ok()
   }

   fn finish(&self) {
      self.phase.store(CLOSED, Ordering::SeqCst);
   }

   fn phase(&self) -> ShutdownPhase {
      match self.phase.load(Ordering::SeqCst) {
         RUNNING => ShutdownPhase::Running,
         SHUTTING_DOWN => ShutdownPhase::ShuttingDown,
         _ => ShutdownPhase::Closed,
      }
   }

   /// One-shot guard; true exactly once.
   fn try_install(&self) -> bool {
      !self.handlers_installed.swap(true, Ordering::SeqCst)
   }
}

impl Persistence {
   /// Install the process signal listeners (Ctrl+C and, on unix, SIGTERM).
   ///
   /// Installed at most once per service. The first signal drives
   /// [`shutdown`](Self::shutdown) and then exits the process; further
   /// signals while shutting down are ignored.
   pub fn install_signal_handlers(&self) {
      if !self.shutdown_state().try_install() {
         return;
      }

      let service = self.clone();
      tokio::spawn(async move {
         loop {
            wait_for_termination_signal().await;

            if service.shutdown_state().phase() != ShutdownPhase::Running {
               debug!("termination signal received while already shutting down; ignoring");
               continue;
            }

            service.shutdown().await;
            std::process::exit(0);
         }
      });
   }

   /// Run the teardown sequence once: a final best-effort checkpoint, then
   /// close the write connection and read pool and reset the lifecycle.
   /// Subsequent calls are no-ops.
   pub async fn shutdown(&self) {
      if !self.shutdown_state().begin() {
         return;
      }

      info!("shutting down persistence service");

      if self.is_initialized().await {
         match self.checkpoint(CheckpointMode::Truncate).await {
            Ok(stats) => {
               debug!(
                  checkpointed_frames = stats.checkpointed_frames,
                  "final checkpoint complete"
               );
            }
            Err(e) => warn!(error = %e, "final checkpoint failed; continuing with teardown"),
         }
      }

      if let Err(e) = self.close().await {
         warn!(error = %e, "error closing the database during shutdown");
      }

      self.shutdown_state().finish();
   }

   /// Current phase of the teardown state machine.
   pub fn shutdown_phase(&self) -> ShutdownPhase {
      self.shutdown_state().phase()
   }
}

async fn wait_for_termination_signal() {
   let ctrl_c = async {
      if let Err(e) = tokio::signal::ctrl_c().await {
         warn!(error = %e, "failed to install Ctrl+C handler");
         std::future::pending::<()>().await;
      }
   };

   #[cfg(unix)]
   let terminate = async {
      match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
         Ok(mut stream) => {
            stream.recv().await;
         }
         Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
         }
      }
   };

   #[cfg(not(unix))]
   let terminate = std::future::pending::<()>();

   tokio::select! {
      _ = ctrl_c => info!("received Ctrl+C, starting shutdown"),
      _ = terminate => info!("received SIGTERM, starting shutdown"),
   }
}
