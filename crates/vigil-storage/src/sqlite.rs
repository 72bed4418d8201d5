use crate::error::{Result, StorageError};
use crate::{AlertRepository, MetricStore, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use vigil_common::types::{
    Aggregate, Aggregation, AlertDefinition, ConditionConfig, MetricPoint, NotificationConfig,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_definitions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    condition_json TEXT NOT NULL,
    notification_json TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    last_triggered_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_alert_definitions_active
    ON alert_definitions(active);

CREATE TABLE IF NOT EXISTS metric_points (
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metric_points_name_time
    ON metric_points(metric_name, timestamp);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT
);
";

const DB_FILE: &str = "vigil.db";

/// SQLite-backed alert repository, metric store and user directory.
///
/// A single WAL-mode connection guarded by a mutex. Queries are short and
/// never held across an await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

struct AlertRow {
    id: String,
    user_id: String,
    name: String,
    condition_json: String,
    notification_json: String,
    active: bool,
    last_triggered_ms: Option<i64>,
}

impl SqliteStore {
    /// Opens (or creates) `vigil.db` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::info!("SQLite store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces the address of a user.
    pub fn set_email(&self, user_id: &str, email: &str) -> Result<()> {
        self.lock().execute(
            "INSERT INTO users (id, email) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email",
            params![user_id, email],
        )?;
        Ok(())
    }

    /// Loads a single definition regardless of its active flag.
    pub fn get_alert(&self, id: &str) -> Result<Option<AlertDefinition>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, user_id, name, condition_json, notification_json, active, last_triggered_at
                 FROM alert_definitions WHERE id = ?1",
                params![id],
                read_alert_row,
            )
            .optional()?;
        row.map(decode_alert).transpose()
    }
}

fn read_alert_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        condition_json: row.get(3)?,
        notification_json: row.get(4)?,
        active: row.get(5)?,
        last_triggered_ms: row.get(6)?,
    })
}

fn decode_alert(row: AlertRow) -> Result<AlertDefinition> {
    let condition: ConditionConfig = serde_json::from_str(&row.condition_json)?;
    let notification: NotificationConfig = serde_json::from_str(&row.notification_json)?;
    Ok(AlertDefinition {
        id: row.id,
        user_id: row.user_id,
        name: row.name,
        condition,
        notification,
        active: row.active,
        last_triggered_at: row
            .last_triggered_ms
            .and_then(DateTime::from_timestamp_millis),
    })
}

fn aggregate_sql(function: Aggregation) -> &'static str {
    match function {
        Aggregation::Avg => {
            "SELECT AVG(value), COUNT(value) FROM metric_points
             WHERE metric_name = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        }
        Aggregation::Sum => {
            "SELECT SUM(value), COUNT(value) FROM metric_points
             WHERE metric_name = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        }
        Aggregation::Max => {
            "SELECT MAX(value), COUNT(value) FROM metric_points
             WHERE metric_name = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        }
        Aggregation::Min => {
            "SELECT MIN(value), COUNT(value) FROM metric_points
             WHERE metric_name = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        }
        Aggregation::Count => {
            "SELECT CAST(COUNT(value) AS REAL), COUNT(value) FROM metric_points
             WHERE metric_name = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        }
    }
}

#[async_trait]
impl AlertRepository for SqliteStore {
    async fn list_active_alerts(&self) -> Result<Vec<AlertDefinition>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, name, condition_json, notification_json, active, last_triggered_at
             FROM alert_definitions WHERE active = 1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], read_alert_row)?;

        let mut alerts = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.id.clone();
            // One undecodable row must not hide the others.
            match decode_alert(row) {
                Ok(alert) => alerts.push(alert),
                Err(e) => {
                    tracing::warn!(alert_id = %id, error = %e, "Skipping undecodable alert definition");
                }
            }
        }
        Ok(alerts)
    }

    async fn save(&self, alert: &AlertDefinition) -> Result<()> {
        let updated = self.lock().execute(
            "UPDATE alert_definitions SET last_triggered_at = ?2 WHERE id = ?1",
            params![
                &alert.id,
                alert.last_triggered_at.map(|t| t.timestamp_millis())
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "alert_definition",
                id: alert.id.clone(),
            });
        }
        Ok(())
    }

    async fn insert(&self, alert: &AlertDefinition) -> Result<bool> {
        let condition_json = serde_json::to_string(&alert.condition)?;
        let notification_json = serde_json::to_string(&alert.notification)?;
        let inserted = self.lock().execute(
            "INSERT OR IGNORE INTO alert_definitions
                (id, user_id, name, condition_json, notification_json, active, last_triggered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &alert.id,
                &alert.user_id,
                &alert.name,
                condition_json,
                notification_json,
                alert.active,
                alert.last_triggered_at.map(|t| t.timestamp_millis()),
            ],
        )?;
        Ok(inserted == 1)
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn aggregate(
        &self,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Aggregation,
    ) -> Result<Aggregate> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(aggregate_sql(function))?;
        let (value, count): (Option<f64>, i64) = stmt.query_row(
            params![metric_name, start.timestamp_millis(), end.timestamp_millis()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(match value {
            Some(v) if count > 0 => Aggregate::Value(v),
            _ => Aggregate::NoData,
        })
    }

    async fn record(&self, points: &[MetricPoint]) -> Result<()> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metric_points (metric_name, value, timestamp) VALUES (?1, ?2, ?3)",
            )?;
            for point in points {
                stmt.execute(params![
                    &point.metric_name,
                    point.value,
                    point.timestamp.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let removed = self.lock().execute(
            "DELETE FROM metric_points WHERE timestamp < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(removed as u64)
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn get_email(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.lock();
        let email: Option<Option<String>> = conn
            .query_row(
                "SELECT email FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(email.flatten().filter(|e| !e.trim().is_empty()))
    }
}
