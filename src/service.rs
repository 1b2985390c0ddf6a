//! Application-facing persistence service.
//!
//! Every CRUD module, scoring heuristic, and agent-orchestration flow in the
//! planner talks to the database through this service and nothing else.
//! Reads return column-order-preserving JSON rows; writes are serialized by
//! the underlying single-writer core.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};
use sqlx_sqlite_single_writer::{
   CheckpointMode, CheckpointStats, SingleWriterConfig, SingleWriterDatabase, WriteOutcome,
};

use crate::error::Result;
use crate::settings::DatabaseSettings;
use crate::shutdown::ShutdownState;

/// Introspection payload describing the resolved database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
   /// Resolved database file path.
   pub path: String,
   /// Directory holding the database file and its WAL sidecar.
   pub directory: String,
   /// Whether the connection is currently open and probed.
   pub initialized: bool,
}

/// Persistence service for the planner.
///
/// Cloning is cheap; clones share the same database lifecycle and shutdown
/// state. The service is created without touching the filesystem beyond
/// directory creation — the connection opens lazily on first use or via
/// [`init`](Self::init).
pub struct Persistence {
   db: SingleWriterDatabase,
   settings: DatabaseSettings,
   shutdown: Arc<ShutdownState>,
}

impl Persistence {
   /// Create the service for an explicit location and configuration.
   pub fn with_settings(settings: DatabaseSettings, config: SingleWriterConfig) -> Self {
      let db = SingleWriterDatabase::new(settings.database_path(), config);

      Self {
         db,
         settings,
         shutdown: Arc::new(ShutdownState::new()),
      }
   }

   /// Create the service from the environment (see
   /// [`DatabaseSettings::from_env`]).
   pub fn from_env() -> Result<Self> {
      Ok(Self::with_settings(
         DatabaseSettings::from_env()?,
         SingleWriterConfig::default(),
      ))
   }

   /// Ensure the connection is open and probed. Idempotent and race-safe;
   /// safe to call from any entry point.
   pub async fn init(&self) -> Result<()> {
      Ok(self.db.ensure_open().await?)
   }

   /// Run a read-only query and decode its rows to JSON.
   ///
   /// Reads are not ordered against queued writes; a caller that needs
   /// read-after-write consistency must await the specific write first.
   pub async fn query(&self, sql: &str) -> Result<Vec<IndexMap<String, JsonValue>>> {
      let pool = self.db.read_pool().await?;
      let rows = sqlx::query(sql).fetch_all(&pool).await?;
      decode_rows(rows)
   }

   /// Queue a mutating statement; resolves after that statement completes.
   pub async fn execute(&self, sql: &str) -> Result<WriteOutcome> {
      Ok(self.db.execute(sql).await?)
   }

   /// Queue a schema-altering statement (CREATE/ALTER/DROP) followed by an
   /// immediate checkpoint.
   pub async fn execute_schema(&self, sql: &str) -> Result<WriteOutcome> {
      Ok(self.db.execute_schema(sql).await?)
   }

   /// Queue a mutating statement that also reports rows, decoded to JSON.
   /// Intended for insert-then-fetch and `RETURNING` patterns.
   pub async fn query_write(&self, sql: &str) -> Result<Vec<IndexMap<String, JsonValue>>> {
      let rows = self.db.query_write(sql).await?;
      decode_rows(rows)
   }

   /// Run an explicit checkpoint through the write queue. Used by
   /// maintenance scripts and the shutdown path.
   pub async fn checkpoint(&self, mode: CheckpointMode) -> Result<CheckpointStats> {
      Ok(self.db.checkpoint(mode).await?)
   }

   /// Explicit teardown, distinct from the signal-driven shutdown. A
   /// subsequent call or [`init`](Self::init) reopens the database.
   pub async fn close(&self) -> Result<()> {
      Ok(self.db.close().await?)
   }

   /// Whether the connection is currently open and probed.
   pub async fn is_initialized(&self) -> bool {
      self.db.is_open().await
   }

   /// Resolved location and initialization state. Introspection only, no
   /// side effects.
   pub async fn info(&self) -> DatabaseInfo {
      DatabaseInfo {
         path: self.settings.database_path().display().to_string(),
         directory: self.settings.data_dir().display().to_string(),
         initialized: self.db.is_open().await,
      }
   }

   pub(crate) fn shutdown_state(&self) -> &ShutdownState {
      &self.shutdown
   }
}

impl Clone for Persistence {
   fn clone(&self) -> Self {
      Self {
         db: self.db.clone(),
         settings: self.settings.clone(),
         shutdown: Arc::clone(&self.shutdown),
      }
   }
}

fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<IndexMap<String, JsonValue>>> {
   let mut decoded = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         let v = crate::decode::to_json(v)?;
         value.insert(column.name().to_string(), v);
      }
      decoded.push(value);
   }

   Ok(decoded)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::escape::{escape_text, sql_literal};
   use serde_json::json;
   use tempfile::TempDir;

   async fn create_test_service() -> (Persistence, TempDir) {
      let temp_dir = TempDir::new().expect("Failed to create temp directory");
      let settings = DatabaseSettings::at_path(temp_dir.path().join("test.db"))
         .expect("Failed to resolve settings");
      let service = Persistence::with_settings(settings, SingleWriterConfig::default());

      (service, temp_dir)
   }

   #[tokio::test]
   async fn test_execute_and_write_outcome() {
      let (db, _temp) = create_test_service().await;

      // DDL returns 0 rows affected
      let result = db
         .execute_schema("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
         .await
         .unwrap();

      assert_eq!(result.rows_affected, 0);

      let result = db
         .execute("INSERT INTO t (name) VALUES ('Alice')")
         .await
         .unwrap();

      assert_eq!((result.rows_affected, result.last_insert_id), (1, 1));

      let result = db
         .execute("UPDATE t SET name = 'X' WHERE id > 0")
         .await
         .unwrap();

      assert_eq!(result.rows_affected, 1);

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_query_decodes_rows() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, active INT)")
         .await
         .unwrap();

      // Empty table returns empty vec
      assert!(db.query("SELECT * FROM t").await.unwrap().is_empty());

      db.execute("INSERT INTO t (name, active) VALUES ('Alice',1), ('Bob',0)")
         .await
         .unwrap();

      let rows = db.query("SELECT * FROM t ORDER BY id").await.unwrap();
      assert_eq!(rows.len(), 2);
      assert_eq!(rows[0].get("name"), Some(&json!("Alice")));
      assert_eq!(rows[1].get("active"), Some(&json!(0)));

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_query_write_returns_decoded_rows() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
         .await
         .unwrap();

      let rows = db
         .query_write("INSERT INTO t (name) VALUES ('Charlie') RETURNING id, name")
         .await
         .unwrap();

      assert_eq!(rows.len(), 1);
      assert_eq!(rows[0].get("id"), Some(&json!(1)));
      assert_eq!(rows[0].get("name"), Some(&json!("Charlie")));

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_escaped_literals_round_trip() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, tags TEXT)")
         .await
         .unwrap();

      let name = "plumber's apprentice";
      let tags = json!(["trade", "per-hour"]);
      db.execute(&format!(
         "INSERT INTO t (name, tags) VALUES ({}, {})",
         escape_text(name),
         sql_literal(&tags)
      ))
      .await
      .unwrap();

      let rows = db.query("SELECT name, tags FROM t").await.unwrap();
      assert_eq!(rows[0].get("name"), Some(&json!(name)));
      assert_eq!(rows[0].get("tags"), Some(&json!(tags.to_string())));

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_type_decoding() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema(
         "CREATE TABLE t (id INTEGER PRIMARY KEY, txt TEXT, num REAL, big INTEGER, flag BOOLEAN, data BLOB)",
      )
      .await
      .unwrap();

      let large_int: i64 = 9_007_199_254_740_992; // 2^53

      db.execute("INSERT INTO t (txt) VALUES (NULL)").await.unwrap();
      db.execute("INSERT INTO t (txt, num) VALUES ('hello', 1.25)")
         .await
         .unwrap();
      db.execute(&format!("INSERT INTO t (big) VALUES ({large_int})"))
         .await
         .unwrap();
      db.execute("INSERT INTO t (flag) VALUES (TRUE)").await.unwrap();
      // "Hello" in hex
      db.execute("INSERT INTO t (data) VALUES (X'48656C6C6F')")
         .await
         .unwrap();

      let rows = db.query("SELECT * FROM t ORDER BY id").await.unwrap();

      assert_eq!(rows[0].get("txt"), Some(&JsonValue::Null));
      assert_eq!(rows[1].get("num"), Some(&json!(1.25)));
      assert_eq!(rows[2].get("big"), Some(&json!(large_int)));
      assert_eq!(rows[3].get("flag"), Some(&json!(true)));
      // BLOB as base64
      assert_eq!(rows[4].get("data"), Some(&json!("SGVsbG8=")));

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_column_order_preserved() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema("CREATE TABLE t (z TEXT, a TEXT, m TEXT)")
         .await
         .unwrap();
      db.execute("INSERT INTO t VALUES ('1', '2', '3')")
         .await
         .unwrap();

      let rows = db.query("SELECT z, a, m FROM t").await.unwrap();
      let keys: Vec<&String> = rows[0].keys().collect();
      assert_eq!(keys, vec!["z", "a", "m"]);

      db.close().await.unwrap();
   }

   #[tokio::test]
   async fn test_info_tracks_initialization() {
      let (db, temp) = create_test_service().await;

      let info = db.info().await;
      assert!(!info.initialized, "lazily created, not yet opened");
      assert!(info.path.ends_with("test.db"));
      assert_eq!(info.directory, temp.path().display().to_string());

      db.init().await.unwrap();
      assert!(db.info().await.initialized);

      db.close().await.unwrap();
      assert!(!db.info().await.initialized);
   }

   #[tokio::test]
   async fn test_close_then_init_reopens() {
      let (db, _temp) = create_test_service().await;
      db.execute_schema("CREATE TABLE t (id INTEGER PRIMARY KEY)")
         .await
         .unwrap();

      db.close().await.unwrap();

      db.init().await.unwrap();
      db.execute("INSERT INTO t DEFAULT VALUES").await.unwrap();
      let rows = db.query("SELECT id FROM t").await.unwrap();
      assert_eq!(rows.len(), 1);

      db.close().await.unwrap();
   }
}
