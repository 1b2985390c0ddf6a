//! Error types for sqlx-sqlite-single-writer

use std::time::Duration;

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlite-single-writer
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// The engine never finished opening the database file within the
   /// configured window. Usually a stale lock or a damaged WAL sidecar;
   /// worth an operator's attention rather than a blind retry.
   #[error("opening {path} timed out after {waited:?}; check for stale lock or WAL files")]
   OpenTimeout { path: String, waited: Duration },

   /// An open attempt this caller shared with another caller failed.
   ///
   /// The caller that ran the attempt receives the original error; everyone
   /// awaiting the same attempt receives this variant carrying its message.
   #[error("database initialization failed: {0}")]
   Init(String),

   /// The write queue has been shut down and no longer accepts statements.
   #[error("write queue is closed")]
   QueueClosed,
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
