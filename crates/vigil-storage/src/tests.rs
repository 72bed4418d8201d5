use crate::{AlertRepository, MemoryStore, MetricStore, SqliteStore, StorageError, UserDirectory};
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use vigil_common::types::{
    Aggregate, Aggregation, AlertDefinition, ChannelKind, ConditionConfig, MetricPoint,
    NotificationConfig,
};

fn setup() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path()).unwrap();
    (dir, store)
}

fn point(metric: &str, value: f64, at: DateTime<Utc>) -> MetricPoint {
    MetricPoint {
        metric_name: metric.to_string(),
        value,
        timestamp: at,
    }
}

fn definition(id: &str, active: bool) -> AlertDefinition {
    AlertDefinition {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        name: format!("alert {id}"),
        condition: ConditionConfig {
            metric: Some("cpu_usage".into()),
            operator: Some("greater_than".into()),
            threshold: Some(80.0),
            aggregation: Some("avg".into()),
            time_window_minutes: 5,
            cooldown_minutes: 15,
        },
        notification: NotificationConfig {
            channels: vec![ChannelKind::Webhook],
            webhook_url: Some("https://hooks.example.com/a".into()),
            ..Default::default()
        },
        active,
        last_triggered_at: None,
    }
}

#[tokio::test]
async fn sqlite_aggregates_every_function() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store
        .record(&[
            point("cpu_usage", 80.0, now - Duration::minutes(3)),
            point("cpu_usage", 90.0, now - Duration::minutes(2)),
            point("cpu_usage", 85.0, now - Duration::minutes(1)),
            point("mem_usage", 10.0, now - Duration::minutes(1)),
        ])
        .await
        .unwrap();

    let start = now - Duration::minutes(5);
    let agg = |f: Aggregation| store.aggregate("cpu_usage", start, now, f);
    assert_eq!(agg(Aggregation::Avg).await.unwrap(), Aggregate::Value(85.0));
    assert_eq!(agg(Aggregation::Sum).await.unwrap(), Aggregate::Value(255.0));
    assert_eq!(agg(Aggregation::Max).await.unwrap(), Aggregate::Value(90.0));
    assert_eq!(agg(Aggregation::Min).await.unwrap(), Aggregate::Value(80.0));
    assert_eq!(agg(Aggregation::Count).await.unwrap(), Aggregate::Value(3.0));
}

#[tokio::test]
async fn sqlite_window_excludes_old_points() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store
        .record(&[
            point("cpu_usage", 500.0, now - Duration::minutes(30)),
            point("cpu_usage", 50.0, now - Duration::minutes(1)),
        ])
        .await
        .unwrap();

    let result = store
        .aggregate("cpu_usage", now - Duration::minutes(5), now, Aggregation::Max)
        .await
        .unwrap();
    assert_eq!(result, Aggregate::Value(50.0));
}

#[tokio::test]
async fn sqlite_empty_window_is_no_data_even_for_count() {
    let (_dir, store) = setup();
    let now = Utc::now();
    for function in [Aggregation::Avg, Aggregation::Count, Aggregation::Sum] {
        let result = store
            .aggregate("cpu_usage", now - Duration::minutes(5), now, function)
            .await
            .unwrap();
        assert_eq!(result, Aggregate::NoData, "{function} should be NoData");
    }
}

#[tokio::test]
async fn sqlite_lists_only_active_alerts_in_insert_order() {
    let (_dir, store) = setup();
    assert!(store.insert(&definition("b", true)).await.unwrap());
    assert!(store.insert(&definition("a", false)).await.unwrap());
    assert!(store.insert(&definition("c", true)).await.unwrap());
    assert!(!store.insert(&definition("b", true)).await.unwrap());

    let ids: Vec<String> = store
        .list_active_alerts()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec!["b", "c"]);

    let loaded = store.get_alert("b").unwrap().unwrap();
    assert_eq!(loaded, definition("b", true));
}

#[tokio::test]
async fn sqlite_save_only_touches_last_triggered() {
    let (_dir, store) = setup();
    store.insert(&definition("a", true)).await.unwrap();

    let mut edited = definition("a", true);
    edited.name = "renamed by the engine".into();
    let fired_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
    edited.last_triggered_at = Some(fired_at);
    store.save(&edited).await.unwrap();

    let stored = store.get_alert("a").unwrap().unwrap();
    assert_eq!(stored.last_triggered_at, Some(fired_at));
    assert_eq!(stored.name, "alert a");
}

#[tokio::test]
async fn sqlite_save_unknown_alert_is_not_found() {
    let (_dir, store) = setup();
    let err = store.save(&definition("ghost", true)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn sqlite_skips_undecodable_rows() {
    let (_dir, store) = setup();
    store.insert(&definition("good", true)).await.unwrap();
    store
        .lock()
        .execute(
            "INSERT INTO alert_definitions (id, user_id, condition_json, notification_json)
             VALUES ('bad', 'user-1', '{not json', '{}')",
            [],
        )
        .unwrap();

    let alerts = store.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, "good");
}

#[tokio::test]
async fn sqlite_user_directory() {
    let (_dir, store) = setup();
    assert_eq!(store.get_email("user-1").await.unwrap(), None);
    store.set_email("user-1", "ops@example.com").unwrap();
    assert_eq!(
        store.get_email("user-1").await.unwrap().as_deref(),
        Some("ops@example.com")
    );
    store.set_email("user-1", "  ").unwrap();
    assert_eq!(store.get_email("user-1").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_purges_old_points() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store
        .record(&[
            point("cpu_usage", 1.0, now - Duration::days(10)),
            point("cpu_usage", 2.0, now),
        ])
        .await
        .unwrap();
    let removed = store.purge_before(now - Duration::days(7)).await.unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn memory_store_matches_sqlite_semantics() {
    let store = MemoryStore::default();
    let now = Utc::now();
    store
        .record(&[
            point("cpu_usage", 80.0, now - Duration::minutes(2)),
            point("cpu_usage", 90.0, now - Duration::minutes(1)),
        ])
        .await
        .unwrap();

    let start = now - Duration::minutes(5);
    assert_eq!(
        store
            .aggregate("cpu_usage", start, now, Aggregation::Avg)
            .await
            .unwrap(),
        Aggregate::Value(85.0)
    );
    assert_eq!(
        store
            .aggregate("disk_usage", start, now, Aggregation::Count)
            .await
            .unwrap(),
        Aggregate::NoData
    );
}

#[tokio::test]
async fn memory_store_evicts_beyond_retention() {
    let store = MemoryStore::new(Duration::hours(1));
    let now = Utc::now();
    store
        .record(&[point("cpu_usage", 1.0, now - Duration::hours(2))])
        .await
        .unwrap();
    store.record(&[point("cpu_usage", 2.0, now)]).await.unwrap();
    assert_eq!(store.point_count("cpu_usage"), 1);
}

#[tokio::test]
async fn memory_store_repository_roundtrip() {
    let store = MemoryStore::default();
    store.insert(&definition("a", true)).await.unwrap();
    store.insert(&definition("b", false)).await.unwrap();

    let active = store.list_active_alerts().await.unwrap();
    assert_eq!(active.len(), 1);

    let mut fired = active[0].clone();
    fired.last_triggered_at = Some(Utc::now());
    store.save(&fired).await.unwrap();
    assert_eq!(
        store.alert("a").unwrap().last_triggered_at,
        fired.last_triggered_at
    );

    store.set_email("user-1", "ops@example.com");
    assert!(store.get_email("user-1").await.unwrap().is_some());
    assert!(store.get_email("user-2").await.unwrap().is_none());
}
