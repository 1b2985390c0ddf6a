//! Resolution of the database location from the environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Overrides the full database file path.
pub const DB_PATH_VAR: &str = "MOONLIGHT_DB_PATH";

/// Overrides just the data directory; the default file name is kept.
pub const DATA_DIR_VAR: &str = "MOONLIGHT_DATA_DIR";

const DB_FILE_NAME: &str = "moonlight.db";

/// Resolved database location. The data directory is created on
/// construction so the open sequence never races directory creation.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
   data_dir: PathBuf,
   database_path: PathBuf,
}

impl DatabaseSettings {
   /// Resolve the database location from the environment.
   ///
   /// Precedence: `MOONLIGHT_DB_PATH` (full file path), then
   /// `MOONLIGHT_DATA_DIR` (directory, default file name), then a `data/`
   /// directory under the project root.
   pub fn from_env() -> Result<Self> {
      let database_path = match env::var(DB_PATH_VAR) {
         Ok(path) => PathBuf::from(path),
         Err(_) => {
            let data_dir = env::var(DATA_DIR_VAR)
               .map(PathBuf::from)
               .unwrap_or_else(|_| project_root().join("data"));
            data_dir.join(DB_FILE_NAME)
         }
      };

      Self::at_path(database_path)
   }

   /// Build settings for an explicit database file path, creating the parent
   /// directory if missing.
   pub fn at_path(database_path: impl Into<PathBuf>) -> Result<Self> {
      let database_path = database_path.into();
      let data_dir = database_path
         .parent()
         .filter(|parent| !parent.as_os_str().is_empty())
         .map(Path::to_path_buf)
         .unwrap_or_else(|| PathBuf::from("."));

      fs::create_dir_all(&data_dir)?;

      Ok(Self {
         data_dir,
         database_path,
      })
   }

   /// The resolved database file path.
   pub fn database_path(&self) -> &Path {
      &self.database_path
   }

   /// The directory holding the database file and its WAL sidecar.
   pub fn data_dir(&self) -> &Path {
      &self.data_dir
   }
}

/// Nearest ancestor of the working directory that looks like a project root
/// (contains a `Cargo.toml` or a `.git` directory); the working directory
/// itself when no ancestor qualifies.
fn project_root() -> PathBuf {
   let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
   let mut dir = cwd.as_path();

   loop {
      if dir.join("Cargo.toml").exists() || dir.join(".git").exists() {
         return dir.to_path_buf();
      }
      match dir.parent() {
         Some(parent) => dir = parent,
         None => return cwd,
      }
   }
}
