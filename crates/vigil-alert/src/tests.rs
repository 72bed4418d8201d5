use crate::condition::{evaluate, evaluate_named};
use crate::engine::{cooldown_elapsed, AlertEngine, Evaluation, SkipReason};
use crate::severity::{excess_pct, SeverityTiers};
use crate::AlertError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use vigil_common::types::{
    Aggregate, Aggregation, AlertDefinition, CompareOp, ConditionConfig, ConfigError, MetricPoint,
    NotificationConfig, Severity,
};
use vigil_storage::{MemoryStore, MetricStore, StorageError};

const SAMPLES: [f64; 11] = [
    -1000.0, -80.0, -0.5, 0.0, 0.0004, 1e-3, 0.5, 79.9995, 80.0, 80.5, 1e9,
];

fn cpu_alert() -> AlertDefinition {
    AlertDefinition {
        id: "cpu-high".into(),
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
        notification: NotificationConfig::default(),
        active: true,
        last_triggered_at: None,
    }
}

async fn store_with(values: &[f64], now: DateTime<Utc>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    let points: Vec<MetricPoint> = values
        .iter()
        .enumerate()
        .map(|(i, v)| MetricPoint {
            metric_name: "cpu_usage".into(),
            value: *v,
            timestamp: now - Duration::seconds(30 * (i as i64 + 1)),
        })
        .collect();
    store.record(&points).await.unwrap();
    store
}

struct FailingMetrics;

#[async_trait]
impl MetricStore for FailingMetrics {
    async fn aggregate(
        &self,
        _metric_name: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _function: Aggregation,
    ) -> vigil_storage::Result<Aggregate> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn record(&self, _points: &[MetricPoint]) -> vigil_storage::Result<()> {
        Ok(())
    }

    async fn purge_before(&self, _cutoff: DateTime<Utc>) -> vigil_storage::Result<u64> {
        Ok(0)
    }
}

// ── Condition evaluation ──

#[test]
fn ordering_operators_match_native_comparison() {
    for observed in SAMPLES {
        for threshold in SAMPLES {
            assert_eq!(
                evaluate(observed, threshold, CompareOp::GreaterThan),
                observed > threshold
            );
            assert_eq!(
                evaluate(observed, threshold, CompareOp::LessThan),
                observed < threshold
            );
        }
    }
}

#[test]
fn equals_is_reflexive_and_not_equals_is_its_complement() {
    for x in SAMPLES {
        assert!(evaluate(x, x, CompareOp::Equals), "{x} should equal itself");
        for y in SAMPLES {
            assert_eq!(
                evaluate(x, y, CompareOp::NotEquals),
                !evaluate(x, y, CompareOp::Equals)
            );
        }
    }
}

#[test]
fn equals_uses_tolerance() {
    assert!(evaluate(80.0009, 80.0, CompareOp::Equals));
    assert!(!evaluate(80.002, 80.0, CompareOp::Equals));
    assert!(evaluate(80.002, 80.0, CompareOp::NotEquals));
}

#[test]
fn unknown_operator_never_triggers() {
    assert!(!evaluate_named(1e9, 0.0, "greater_or_maybe"));
    assert!(evaluate_named(1e9, 0.0, "greater_than"));
    assert!(evaluate_named(1.0, 2.0, "lt"));
}

// ── Severity ──

#[test]
fn severity_tiers_at_defaults() {
    let tiers = SeverityTiers::default();
    assert_eq!(tiers.classify(85.0, 80.0), Severity::Low); // 6.25%
    assert_eq!(tiers.classify(88.0, 80.0), Severity::Medium); // 10%
    assert_eq!(tiers.classify(100.0, 80.0), Severity::High); // 25%
    assert_eq!(tiers.classify(130.0, 80.0), Severity::Critical); // 62.5%
    assert_eq!(tiers.classify(20.0, 80.0), Severity::Critical); // 75% under
}

#[test]
fn zero_threshold_is_top_tier() {
    let tiers = SeverityTiers::default();
    for observed in [-5.0, 1e-9, 0.5, 42.0] {
        assert_eq!(tiers.classify(observed, 0.0), Severity::Critical);
    }
    assert_eq!(excess_pct(7.0, 0.0), 100.0);
}

#[test]
fn severity_is_monotonic_in_deviation() {
    let tiers = SeverityTiers::default();
    for threshold in [-50.0, 0.0, 1.0, 80.0] {
        let mut previous = Severity::Low;
        for step in 0..200 {
            let observed = threshold + f64::from(step) * 0.5;
            let severity = tiers.classify(observed, threshold);
            assert!(
                severity >= previous,
                "severity dropped at observed={observed} threshold={threshold}"
            );
            previous = severity;
        }
    }
}

#[test]
fn tier_validation() {
    assert!(SeverityTiers::default().validate().is_ok());
    let unordered = SeverityTiers {
        medium_pct: 30.0,
        high_pct: 20.0,
        critical_pct: 50.0,
    };
    assert!(matches!(
        unordered.validate(),
        Err(AlertError::InvalidTiers(_))
    ));
    let negative = SeverityTiers {
        medium_pct: -1.0,
        ..SeverityTiers::default()
    };
    assert!(negative.validate().is_err());
}

// ── Cooldown ──

#[test]
fn cooldown_window() {
    let now = Utc::now();
    let cooldown = Duration::minutes(15);
    assert!(cooldown_elapsed(None, cooldown, now));
    assert!(!cooldown_elapsed(Some(now - Duration::minutes(5)), cooldown, now));
    assert!(cooldown_elapsed(Some(now - Duration::minutes(15)), cooldown, now));
    assert!(cooldown_elapsed(Some(now), Duration::zero(), now));
}

// ── Engine ──

#[tokio::test]
async fn engine_triggers_with_low_severity_at_85() {
    let now = Utc::now();
    let store = store_with(&[80.0, 90.0, 85.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let alert = cpu_alert();

    let Evaluation::Triggered(firing) = engine.evaluate(&alert, now).await.unwrap() else {
        panic!("expected a trigger");
    };
    assert_eq!(firing.value, 85.0);

    let trigger = engine.build_trigger(&alert, &firing, now);
    assert_eq!(trigger.severity, Severity::Low);
    assert_eq!(trigger.alert_id, "cpu-high");
    assert_eq!(trigger.user_id, "user-1");
    assert_eq!(trigger.operator, CompareOp::GreaterThan);
    assert_eq!(trigger.triggered_at, now);
    assert!(trigger.message.contains("High CPU"));
    assert!(trigger.message.contains("85.00"));
}

#[tokio::test]
async fn engine_grades_130_as_critical() {
    let now = Utc::now();
    let store = store_with(&[120.0, 140.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let alert = cpu_alert();

    let Evaluation::Triggered(firing) = engine.evaluate(&alert, now).await.unwrap() else {
        panic!("expected a trigger");
    };
    assert_eq!(
        engine.build_trigger(&alert, &firing, now).severity,
        Severity::Critical
    );
}

#[tokio::test]
async fn engine_skips_on_empty_window() {
    let now = Utc::now();
    let engine = AlertEngine::new(Arc::new(MemoryStore::default()), SeverityTiers::default())
        .unwrap();
    assert_eq!(
        engine.evaluate(&cpu_alert(), now).await.unwrap(),
        Evaluation::Skipped(SkipReason::NoData)
    );
}

#[tokio::test]
async fn engine_skips_incomplete_condition() {
    let now = Utc::now();
    let store = store_with(&[95.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let mut alert = cpu_alert();
    alert.condition.threshold = None;

    assert_eq!(
        engine.evaluate(&alert, now).await.unwrap(),
        Evaluation::Skipped(SkipReason::InvalidCondition(ConfigError::MissingField(
            "threshold"
        )))
    );
}

#[tokio::test]
async fn engine_reports_not_triggered_below_threshold() {
    let now = Utc::now();
    let store = store_with(&[50.0, 60.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    assert_eq!(
        engine.evaluate(&cpu_alert(), now).await.unwrap(),
        Evaluation::NotTriggered { value: 55.0 }
    );
}

#[tokio::test]
async fn engine_suppresses_inside_cooldown() {
    let now = Utc::now();
    let store = store_with(&[95.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let mut alert = cpu_alert();
    let last = now - Duration::minutes(5);
    alert.last_triggered_at = Some(last);

    assert_eq!(
        engine.evaluate(&alert, now).await.unwrap(),
        Evaluation::Suppressed {
            value: 95.0,
            eligible_at: last + Duration::minutes(15),
        }
    );
}

#[tokio::test]
async fn engine_skips_window_before_earliest_time() {
    let engine = AlertEngine::new(Arc::new(MemoryStore::default()), SeverityTiers::default())
        .unwrap();
    let now = DateTime::<Utc>::MIN_UTC + Duration::minutes(1);

    assert_eq!(
        engine.evaluate(&cpu_alert(), now).await.unwrap(),
        Evaluation::Skipped(SkipReason::InvalidCondition(ConfigError::WindowOutOfRange(5)))
    );
}

#[tokio::test]
async fn engine_skips_oversized_window_instead_of_failing() {
    let now = Utc::now();
    let store = store_with(&[95.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let mut alert = cpu_alert();
    alert.condition.time_window_minutes = 10_000_000_000_000;

    assert_eq!(
        engine.evaluate(&alert, now).await.unwrap(),
        Evaluation::Skipped(SkipReason::InvalidCondition(ConfigError::WindowOutOfRange(
            10_000_000_000_000
        )))
    );
}

#[tokio::test]
async fn suppression_near_latest_time_saturates_eligible_at() {
    let now = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);
    let store = store_with(&[95.0], now).await;
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    let mut alert = cpu_alert();
    alert.last_triggered_at = Some(now - Duration::minutes(5));

    assert_eq!(
        engine.evaluate(&alert, now).await.unwrap(),
        Evaluation::Suppressed {
            value: 95.0,
            eligible_at: DateTime::<Utc>::MAX_UTC,
        }
    );
}

#[tokio::test]
async fn engine_ignores_points_outside_window() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::default());
    store
        .record(&[MetricPoint {
            metric_name: "cpu_usage".into(),
            value: 99.0,
            timestamp: now - Duration::minutes(6),
        }])
        .await
        .unwrap();
    let engine = AlertEngine::new(store, SeverityTiers::default()).unwrap();
    assert_eq!(
        engine.evaluate(&cpu_alert(), now).await.unwrap(),
        Evaluation::Skipped(SkipReason::NoData)
    );
}

#[tokio::test]
async fn engine_surfaces_store_failures() {
    let engine = AlertEngine::new(Arc::new(FailingMetrics), SeverityTiers::default()).unwrap();
    let err = engine.evaluate(&cpu_alert(), Utc::now()).await.unwrap_err();
    assert!(matches!(err, AlertError::MetricStore { ref metric, .. } if metric == "cpu_usage"));
}

#[test]
fn engine_rejects_invalid_tiers() {
    let tiers = SeverityTiers {
        medium_pct: f64::NAN,
        ..SeverityTiers::default()
    };
    assert!(AlertEngine::new(Arc::new(MemoryStore::default()), tiers).is_err());
}
