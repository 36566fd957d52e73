//! Settings read through the `config` crate.
//!
//! Values come from an optional settings file (any format `config` detects from
//! the extension) overridden by `LOOKUP_*` environment variables, e.g.
//! `LOOKUP_DATABASE=lookups.db` or `LOOKUP_LOG_FILTER=lookup_values=debug`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::{Config, Environment, File};
use rusqlite::Connection;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{LookupError, Result};
use crate::registry::LookupRegistry;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// SQLite database file; in-memory when absent.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    pub log_filter: String,
    /// Whether registration preloads caches from their stores.
    pub preload: bool,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            preload: true,
        }
    }
}
impl Settings {
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?
            .set_default("preload", true)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("LOOKUP"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Opens the configured database with the busy timeout applied. The connection
    /// is shared by every store provisioned from it.
    pub fn open_connection(&self) -> Result<Arc<Mutex<Connection>>> {
        let connection = match &self.database {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        connection.busy_timeout(Duration::from_millis(self.busy_timeout_ms))?;
        Ok(Arc::new(Mutex::new(connection)))
    }

    pub fn registry(&self) -> LookupRegistry {
        if self.preload {
            LookupRegistry::new()
        } else {
            LookupRegistry::without_preload()
        }
    }

    /// Installs a fmt subscriber filtered by `log_filter`. Returns `false` when a
    /// global subscriber was already installed.
    pub fn init_tracing(&self) -> Result<bool> {
        let filter = EnvFilter::try_new(&self.log_filter)
            .map_err(|e| LookupError::Config(format!("invalid log filter: {}", e)))?;
        Ok(tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok())
    }
}
