//! Configuration for the single-writer SQLite connection manager

use std::time::Duration;

/// Configuration for [`SingleWriterDatabase`](crate::SingleWriterDatabase)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_single_writer::SingleWriterConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SingleWriterConfig::default();
///
/// // Override just one field
/// let config = SingleWriterConfig {
///    checkpoint_interval: Duration::from_secs(60),
///    ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SingleWriterConfig {
   /// How long the open sequence may take before it fails with
   /// [`Error::OpenTimeout`](crate::Error::OpenTimeout).
   ///
   /// Opening a file held by a stale lock or damaged by an unclean shutdown
   /// can block indefinitely; this bounds that wait so the failure is
   /// diagnosable instead of a hang.
   ///
   /// Default: 10 seconds
   pub open_timeout: Duration,

   /// WAL auto-checkpoint threshold, in pages, applied right after the
   /// connection is probed.
   ///
   /// The engine default (1000 pages) lets the WAL grow large between
   /// checkpoints; a smaller threshold trades a little write overhead for a
   /// smaller WAL and a smaller blast radius on an unclean shutdown.
   /// Failure to apply this setting is logged and non-fatal.
   ///
   /// Default: 100
   pub wal_autocheckpoint_pages: u32,

   /// Period of the opportunistic background checkpoint.
   ///
   /// Default: 5 minutes
   pub checkpoint_interval: Duration,

   /// Maximum number of concurrent read-only connections.
   ///
   /// Default: 4
   pub max_read_connections: u32,

   /// Idle timeout for read-only connections.
   ///
   /// Default: 30 seconds
   pub idle_timeout: Duration,

   /// SQLite busy timeout applied to every connection.
   ///
   /// Default: 5 seconds
   pub busy_timeout: Duration,

   /// Capacity of the write queue channel. Submitters of queued writes wait
   /// for a free slot once this many statements are pending.
   ///
   /// Default: 128
   pub write_queue_depth: usize,
}

impl Default for SingleWriterConfig {
   fn default() -> Self {
      Self {
         open_timeout: Duration::from_secs(10),
         wal_autocheckpoint_pages: 100,
         checkpoint_interval: Duration::from_secs(300),
         max_read_connections: 4,
         idle_timeout: Duration::from_secs(30),
         busy_timeout: Duration::from_secs(5),
         write_queue_depth: 128,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_defaults() {
      let config = SingleWriterConfig::default();
      assert_eq!(config.open_timeout, Duration::from_secs(10));
      assert_eq!(config.wal_autocheckpoint_pages, 100);
      assert_eq!(config.checkpoint_interval, Duration::from_secs(300));
      assert_eq!(config.max_read_connections, 4);
      assert_eq!(config.write_queue_depth, 128);
   }
}
