//! Storage boundaries consumed by the alert engine, with a SQLite and an
//! in-memory implementation.
//!
//! The engine never owns alert definitions or metric points. It reads them
//! through [`AlertRepository`] and [`MetricStore`], resolves owner addresses
//! through [`UserDirectory`], and writes back only the last-triggered
//! timestamp of an alert.

pub mod error;
pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_common::types::{Aggregate, Aggregation, AlertDefinition, MetricPoint};

pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Source of alert definitions.
///
/// Implementations must be safe to share across tasks because the scheduler
/// and the seeding path hold the same instance.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Returns every alert whose active flag is set, in a stable load order.
    async fn list_active_alerts(&self) -> Result<Vec<AlertDefinition>>;

    /// Persists the engine-owned state of `alert`, which is only its
    /// last-triggered timestamp.
    async fn save(&self, alert: &AlertDefinition) -> Result<()>;

    /// Inserts a new definition. Returns `false` when the id already exists.
    async fn insert(&self, alert: &AlertDefinition) -> Result<bool>;
}

/// Time-series metric source.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Aggregates the points of `metric_name` with `start <= timestamp <= end`.
    /// An empty range is [`Aggregate::NoData`], never an error.
    async fn aggregate(
        &self,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Aggregation,
    ) -> Result<Aggregate>;

    /// Appends points produced by the telemetry pipeline.
    async fn record(&self, points: &[MetricPoint]) -> Result<()>;

    /// Deletes points older than `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Resolves the delivery address of an alert owner.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_email(&self, user_id: &str) -> Result<Option<String>>;
}
