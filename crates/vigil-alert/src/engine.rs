use crate::aggregate::MetricAggregator;
use crate::condition;
use crate::error::AlertError;
use crate::severity::SeverityTiers;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use vigil_common::types::{
    Aggregate, AlertCondition, AlertDefinition, AlertTrigger, ConfigError,
};
use vigil_storage::MetricStore;

/// Why an alert produced no decision this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InvalidCondition(ConfigError),
    NoData,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidCondition(e) => write!(f, "invalid condition: {e}"),
            SkipReason::NoData => write!(f, "no data in window"),
        }
    }
}

/// A condition that held and is past its cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub condition: AlertCondition,
    pub value: f64,
}

/// Outcome of evaluating one alert definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Skipped(SkipReason),
    NotTriggered { value: f64 },
    /// The condition held but the previous trigger is still inside the cooldown.
    Suppressed { value: f64, eligible_at: DateTime<Utc> },
    Triggered(Firing),
}

impl Evaluation {
    pub fn label(&self) -> &'static str {
        match self {
            Evaluation::Skipped(_) => "skipped",
            Evaluation::NotTriggered { .. } => "not_triggered",
            Evaluation::Suppressed { .. } => "suppressed",
            Evaluation::Triggered(_) => "triggered",
        }
    }
}

/// `true` when no trigger happened yet or `cooldown` has fully passed since
/// `last_triggered_at`.
pub fn cooldown_elapsed(
    last_triggered_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_triggered_at {
        None => true,
        Some(last) => now - last >= cooldown,
    }
}

/// Evaluates single alert definitions against the metric store.
pub struct AlertEngine {
    aggregator: MetricAggregator,
    tiers: SeverityTiers,
}

impl AlertEngine {
    pub fn new(metrics: Arc<dyn MetricStore>, tiers: SeverityTiers) -> Result<Self, AlertError> {
        tiers.validate()?;
        Ok(Self {
            aggregator: MetricAggregator::new(metrics),
            tiers,
        })
    }

    pub fn tiers(&self) -> &SeverityTiers {
        &self.tiers
    }

    /// Runs aggregate → compare → cooldown for `alert` at `now`.
    ///
    /// Does not mutate the alert: on [`Evaluation::Triggered`] the caller
    /// records the trigger time and builds the notification with
    /// [`AlertEngine::build_trigger`].
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::MetricStore`] when the metric store fails.
    pub async fn evaluate(
        &self,
        alert: &AlertDefinition,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, AlertError> {
        let condition = match alert.condition.validate() {
            Ok(condition) => condition,
            Err(e) => return Ok(Evaluation::Skipped(SkipReason::InvalidCondition(e))),
        };

        let value = match self.aggregator.aggregate_window(&condition, now).await {
            Ok(Aggregate::Value(v)) => v,
            Ok(Aggregate::NoData) => return Ok(Evaluation::Skipped(SkipReason::NoData)),
            Err(AlertError::Condition(e)) => {
                return Ok(Evaluation::Skipped(SkipReason::InvalidCondition(e)))
            }
            Err(e) => return Err(e),
        };

        if !condition::evaluate(value, condition.threshold, condition.operator) {
            return Ok(Evaluation::NotTriggered { value });
        }

        if !cooldown_elapsed(alert.last_triggered_at, condition.cooldown, now) {
            let eligible_at = alert.last_triggered_at.map_or(now, |last| {
                last.checked_add_signed(condition.cooldown)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
            return Ok(Evaluation::Suppressed { value, eligible_at });
        }

        Ok(Evaluation::Triggered(Firing { condition, value }))
    }

    /// Grades the firing value and assembles the trigger handed to the
    /// notification channels.
    pub fn build_trigger(
        &self,
        alert: &AlertDefinition,
        firing: &Firing,
        now: DateTime<Utc>,
    ) -> AlertTrigger {
        let cond = &firing.condition;
        let severity = self.tiers.classify(firing.value, cond.threshold);
        let message = format!(
            "{name}: {agg}({metric}) over the last {window}m is {value:.2}, {phrase} threshold {threshold:.2}",
            name = alert.display_name(),
            agg = cond.aggregation,
            metric = cond.metric,
            window = cond.window.num_minutes(),
            value = firing.value,
            phrase = cond.operator.phrase(),
            threshold = cond.threshold,
        );

        AlertTrigger {
            id: vigil_common::id::next_id(),
            alert_id: alert.id.clone(),
            alert_name: alert.display_name().to_string(),
            user_id: alert.user_id.clone(),
            metric_name: cond.metric.clone(),
            aggregation: cond.aggregation,
            value: firing.value,
            threshold: cond.threshold,
            operator: cond.operator,
            severity,
            message,
            triggered_at: now,
        }
    }
}
