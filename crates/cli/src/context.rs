//! Application context - wires store, directory and configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumsy_engine::{AccountDirectory, EngineConfig, FileDirectory, StaticDirectory, Sumsy};
use sumsy_store::SqliteTable;

/// Database file inside the data directory
pub const DATABASE_FILE: &str = "sumsy.db";

pub struct AppContext {
    pub sumsy: Sumsy,
    database_path: PathBuf,
}

impl AppContext {
    pub fn new(
        data_path: impl AsRef<Path>,
        config_path: Option<&Path>,
        directory_path: Option<&Path>,
    ) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref();
        std::fs::create_dir_all(data_path)?;
        let database_path = data_path.join(DATABASE_FILE);

        let config = match config_path {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        let directory: Arc<dyn AccountDirectory> = match directory_path {
            Some(path) => Arc::new(FileDirectory::new(path)),
            None => Arc::new(StaticDirectory::default()),
        };
        let table = Arc::new(SqliteTable::open(&database_path)?);

        tracing::debug!(database = %database_path.display(), "Opened store");
        Ok(Self {
            sumsy: Sumsy::new(table, directory, config),
            database_path,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}
