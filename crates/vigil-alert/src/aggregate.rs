use crate::error::AlertError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vigil_common::types::{Aggregate, AlertCondition, ConfigError};
use vigil_storage::MetricStore;

/// Computes the trailing-window aggregate an alert condition asks for.
#[derive(Clone)]
pub struct MetricAggregator {
    store: Arc<dyn MetricStore>,
}

impl MetricAggregator {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Aggregates `condition.metric` over `[now - window, now]`.
    ///
    /// An empty window is `Ok(Aggregate::NoData)`. Store failures come back
    /// as [`AlertError::MetricStore`], which the scheduler treats as
    /// retryable. A window reaching before the earliest representable time
    /// is [`AlertError::Condition`].
    pub async fn aggregate_window(
        &self,
        condition: &AlertCondition,
        now: DateTime<Utc>,
    ) -> Result<Aggregate, AlertError> {
        let start = now.checked_sub_signed(condition.window).ok_or_else(|| {
            ConfigError::WindowOutOfRange(condition.window.num_minutes())
        })?;
        self.store
            .aggregate(&condition.metric, start, now, condition.aggregation)
            .await
            .map_err(|source| AlertError::MetricStore {
                metric: condition.metric.clone(),
                source,
            })
    }
}
