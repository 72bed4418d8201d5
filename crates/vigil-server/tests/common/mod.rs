#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vigil_common::types::{
    Aggregate, Aggregation, AlertDefinition, AlertTrigger, ChannelKind, ConditionConfig,
    MetricPoint, NotificationConfig,
};
use vigil_notify::{Delivery, NotificationChannel, NotifyError};
use vigil_storage::{AlertRepository, MemoryStore, MetricStore, StorageError};

pub fn cpu_alert(id: &str, channels: &[ChannelKind]) -> AlertDefinition {
    AlertDefinition {
        id: id.to_string(),
        user_id: "user-1".into(),
        name: "High CPU".into(),
        condition: ConditionConfig {
            metric: Some("cpu_usage".into()),
            operator: Some("greater_than".into()),
            threshold: Some(80.0),
            aggregation: Some("avg".into()),
            time_window_minutes: 5,
            cooldown_minutes: 15,
        },
        notification: NotificationConfig {
            channels: channels.to_vec(),
            ..NotificationConfig::default()
        },
        active: true,
        last_triggered_at: None,
    }
}

/// Records `values` for `metric`, one every 30s going back from `now`.
pub async fn record_series(store: &MemoryStore, metric: &str, values: &[f64], now: DateTime<Utc>) {
    let points: Vec<MetricPoint> = values
        .iter()
        .enumerate()
        .map(|(i, v)| MetricPoint {
            metric_name: metric.to_string(),
            value: *v,
            timestamp: now - Duration::seconds(30 * (i as i64 + 1)),
        })
        .collect();
    store.record(&points).await.unwrap();
}

/// Channel that keeps every trigger it receives, optionally failing each time.
pub struct RecordingChannel {
    kind: ChannelKind,
    fail: bool,
    pub received: Arc<Mutex<Vec<AlertTrigger>>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind, fail: bool) -> (Self, Arc<Mutex<Vec<AlertTrigger>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                kind,
                fail,
                received: received.clone(),
            },
            received,
        )
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(
        &self,
        trigger: &AlertTrigger,
        _config: &NotificationConfig,
    ) -> vigil_notify::Result<Delivery> {
        self.received.lock().unwrap().push(trigger.clone());
        if self.fail {
            return Err(NotifyError::ApiError {
                service: self.kind.to_string(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(Delivery::Delivered)
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }
}

/// Repository that cannot be reached.
pub struct UnreachableRepository;

#[async_trait]
impl AlertRepository for UnreachableRepository {
    async fn list_active_alerts(&self) -> vigil_storage::Result<Vec<AlertDefinition>> {
        Err(StorageError::Unavailable("database is down".into()))
    }

    async fn save(&self, _alert: &AlertDefinition) -> vigil_storage::Result<()> {
        Err(StorageError::Unavailable("database is down".into()))
    }

    async fn insert(&self, _alert: &AlertDefinition) -> vigil_storage::Result<bool> {
        Err(StorageError::Unavailable("database is down".into()))
    }
}

/// Wraps a repository and counts how many cycles loaded alerts.
pub struct CountingRepository {
    pub inner: Arc<MemoryStore>,
    pub loads: AtomicUsize,
}

impl CountingRepository {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertRepository for CountingRepository {
    async fn list_active_alerts(&self) -> vigil_storage::Result<Vec<AlertDefinition>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_active_alerts().await
    }

    async fn save(&self, alert: &AlertDefinition) -> vigil_storage::Result<()> {
        self.inner.save(alert).await
    }

    async fn insert(&self, alert: &AlertDefinition) -> vigil_storage::Result<bool> {
        self.inner.insert(alert).await
    }
}

/// Metric store that panics when asked about one particular metric.
pub struct PanickingMetrics {
    pub inner: Arc<MemoryStore>,
    pub poisoned_metric: &'static str,
}

#[async_trait]
impl MetricStore for PanickingMetrics {
    async fn aggregate(
        &self,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Aggregation,
    ) -> vigil_storage::Result<Aggregate> {
        if metric_name == self.poisoned_metric {
            panic!("corrupt series for {metric_name}");
        }
        self.inner.aggregate(metric_name, start, end, function).await
    }

    async fn record(&self, points: &[MetricPoint]) -> vigil_storage::Result<()> {
        self.inner.record(points).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> vigil_storage::Result<u64> {
        self.inner.purge_before(cutoff).await
    }
}
