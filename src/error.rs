//! Error types for the Moonlight persistence layer

use thiserror::Error;

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the persistence layer.
///
/// Route handlers and the planner algorithms are expected to catch these and
/// convert them into user-facing responses; this layer never produces
/// user-facing messages itself.
#[derive(Debug, Error)]
pub enum Error {
   /// Error from the single-writer connection core.
   #[error(transparent)]
   Database(#[from] sqlx_sqlite_single_writer::Error),

   /// Error from SQLx queries issued by this layer.
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// I/O error when accessing database files or directories.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Database(inner) => match inner {
            sqlx_sqlite_single_writer::Error::OpenTimeout { .. } => "OPEN_TIMEOUT".to_string(),
            sqlx_sqlite_single_writer::Error::Init(_) => "INIT_FAILED".to_string(),
            sqlx_sqlite_single_writer::Error::QueueClosed => "QUEUE_CLOSED".to_string(),
            _ => "DATABASE_ERROR".to_string(),
         },
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }
}
