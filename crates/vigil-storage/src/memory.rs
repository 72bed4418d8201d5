use crate::error::{Result, StorageError};
use crate::{AlertRepository, MetricStore, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use vigil_common::types::{Aggregate, Aggregation, AlertDefinition, MetricPoint};

/// In-process implementation of every storage boundary.
///
/// Metric points are kept per metric name and evicted once they fall behind
/// the retention window of the newest point written.
pub struct MemoryStore {
    retention: Duration,
    alerts: Mutex<Vec<AlertDefinition>>,
    metrics: Mutex<HashMap<String, VecDeque<MetricPoint>>>,
    emails: Mutex<HashMap<String, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            alerts: Mutex::new(Vec::new()),
            metrics: Mutex::new(HashMap::new()),
            emails: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_email(&self, user_id: &str, email: &str) {
        lock(&self.emails).insert(user_id.to_string(), email.to_string());
    }

    /// Returns a snapshot of one definition, active or not.
    pub fn alert(&self, id: &str) -> Option<AlertDefinition> {
        lock(&self.alerts).iter().find(|a| a.id == id).cloned()
    }

    pub fn point_count(&self, metric_name: &str) -> usize {
        lock(&self.metrics).get(metric_name).map_or(0, VecDeque::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn list_active_alerts(&self) -> Result<Vec<AlertDefinition>> {
        Ok(lock(&self.alerts)
            .iter()
            .filter(|a| a.active)
            .cloned()
            .collect())
    }

    async fn save(&self, alert: &AlertDefinition) -> Result<()> {
        let mut alerts = lock(&self.alerts);
        let stored = alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "alert_definition",
                id: alert.id.clone(),
            })?;
        stored.last_triggered_at = alert.last_triggered_at;
        Ok(())
    }

    async fn insert(&self, alert: &AlertDefinition) -> Result<bool> {
        let mut alerts = lock(&self.alerts);
        if alerts.iter().any(|a| a.id == alert.id) {
            return Ok(false);
        }
        alerts.push(alert.clone());
        Ok(true)
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn aggregate(
        &self,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Aggregation,
    ) -> Result<Aggregate> {
        let metrics = lock(&self.metrics);
        let values: Vec<f64> = metrics
            .get(metric_name)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .map(|p| p.value)
                    .collect()
            })
            .unwrap_or_default();
        Ok(function.apply(&values))
    }

    async fn record(&self, points: &[MetricPoint]) -> Result<()> {
        let mut metrics = lock(&self.metrics);
        for point in points {
            let series = metrics.entry(point.metric_name.clone()).or_default();
            series.push_back(point.clone());
        }
        for series in metrics.values_mut() {
            if let Some(newest) = series.iter().map(|p| p.timestamp).max() {
                let cutoff = newest - self.retention;
                series.retain(|p| p.timestamp >= cutoff);
            }
        }
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut metrics = lock(&self.metrics);
        let mut removed = 0u64;
        for series in metrics.values_mut() {
            let before = series.len();
            series.retain(|p| p.timestamp >= cutoff);
            removed += (before - series.len()) as u64;
        }
        metrics.retain(|_, series| !series.is_empty());
        Ok(removed)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_email(&self, user_id: &str) -> Result<Option<String>> {
        Ok(lock(&self.emails).get(user_id).cloned())
    }
}
