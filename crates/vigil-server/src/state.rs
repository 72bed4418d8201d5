use crate::config::{StorageBackend, StorageConfig};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use vigil_notify::channels::websocket::SessionHub;
use vigil_storage::{AlertRepository, MemoryStore, MetricStore, SqliteStore, UserDirectory};

/// The configured store. Both backends implement every storage boundary, so
/// one instance serves as repository, metric store and user directory.
#[derive(Clone)]
pub enum Store {
    Sqlite(Arc<SqliteStore>),
    Memory(Arc<MemoryStore>),
}

impl Store {
    pub fn open(config: &StorageConfig) -> anyhow::Result<Self> {
        match config.backend {
            StorageBackend::Sqlite => {
                let store = SqliteStore::open(Path::new(&config.data_dir))?;
                tracing::info!(data_dir = %config.data_dir, "SQLite store opened");
                Ok(Store::Sqlite(Arc::new(store)))
            }
            StorageBackend::Memory => {
                let retention = chrono::Duration::days(i64::from(config.retention_days));
                tracing::info!("In-memory store selected, data is lost on restart");
                Ok(Store::Memory(Arc::new(MemoryStore::new(retention))))
            }
        }
    }

    pub fn alerts(&self) -> Arc<dyn AlertRepository> {
        match self {
            Store::Sqlite(s) => s.clone(),
            Store::Memory(s) => s.clone(),
        }
    }

    pub fn metrics(&self) -> Arc<dyn MetricStore> {
        match self {
            Store::Sqlite(s) => s.clone(),
            Store::Memory(s) => s.clone(),
        }
    }

    pub fn users(&self) -> Arc<dyn UserDirectory> {
        match self {
            Store::Sqlite(s) => s.clone(),
            Store::Memory(s) => s.clone(),
        }
    }

    pub fn set_email(&self, user_id: &str, email: &str) -> anyhow::Result<()> {
        match self {
            Store::Sqlite(s) => s.set_email(user_id, email)?,
            Store::Memory(s) => s.set_email(user_id, email),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<dyn MetricStore>,
    pub hub: Arc<SessionHub>,
    pub engine_enabled: bool,
    pub start_time: DateTime<Utc>,
}
