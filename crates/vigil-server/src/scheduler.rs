use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use vigil_alert::{AlertEngine, Evaluation, SeverityTiers, SkipReason};
use vigil_common::types::AlertDefinition;
use vigil_notify::{DispatchReport, NotificationDispatcher};
use vigil_storage::{AlertRepository, MetricStore};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub tiers: SeverityTiers,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            tiers: SeverityTiers::default(),
        }
    }
}

/// Tally of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub loaded: usize,
    pub triggered: usize,
    pub suppressed: usize,
    pub not_triggered: usize,
    pub skipped: usize,
    /// Alerts whose evaluation returned an error or panicked.
    pub failed: usize,
    pub notifications_delivered: usize,
    pub notifications_failed: usize,
}

enum AlertOutcome {
    Evaluated(Evaluation),
    Fired(DispatchReport),
}

/// Polls active alerts on a fixed interval and notifies on those that fire.
pub struct AlertScheduler {
    repository: Arc<dyn AlertRepository>,
    engine: AlertEngine,
    dispatcher: Arc<NotificationDispatcher>,
    poll_interval: Duration,
}

impl AlertScheduler {
    pub fn new(
        repository: Arc<dyn AlertRepository>,
        metrics: Arc<dyn MetricStore>,
        dispatcher: Arc<NotificationDispatcher>,
        settings: SchedulerSettings,
    ) -> Result<Self> {
        let engine = AlertEngine::new(metrics, settings.tiers)?;
        Ok(Self {
            repository,
            engine,
            dispatcher,
            poll_interval: settings.poll_interval,
        })
    }

    /// Spawns the polling loop. The first cycle runs immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        SchedulerHandle { stop_tx, task }
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs_f64(),
            channels = ?self.dispatcher.channel_kinds(),
            "Alert scheduler started"
        );

        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                // A dropped handle counts as a stop request.
                _ = stop.changed() => break,
                _ = tick.tick() => {}
            }

            match self.run_cycle(Utc::now()).await {
                Ok(report) => tracing::debug!(?report, "Alert cycle finished"),
                Err(e) => tracing::error!(error = %e, "Alert cycle aborted"),
            }
        }

        tracing::info!("Alert scheduler stopped");
    }

    /// Evaluates every active alert once, as of `now`.
    ///
    /// Alerts run one after another, each in its own task so that an error
    /// or panic stays with that alert.
    ///
    /// # Errors
    ///
    /// Fails only when the active alerts cannot be loaded. Nothing is
    /// evaluated in that case.
    pub async fn run_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> Result<CycleReport> {
        let alerts = self
            .repository
            .list_active_alerts()
            .await
            .context("failed to load active alerts")?;

        let mut report = CycleReport {
            loaded: alerts.len(),
            ..CycleReport::default()
        };

        for alert in alerts {
            let alert_id = alert.id.clone();
            let this = Arc::clone(self);
            let handle = tokio::spawn(async move { this.process_alert(alert, now).await });

            match handle.await {
                Ok(Ok(AlertOutcome::Fired(dispatch))) => {
                    report.triggered += 1;
                    report.notifications_delivered += dispatch.delivered();
                    report.notifications_failed += dispatch.failed();
                }
                Ok(Ok(AlertOutcome::Evaluated(evaluation))) => match evaluation {
                    Evaluation::Skipped(_) => report.skipped += 1,
                    Evaluation::NotTriggered { .. } => report.not_triggered += 1,
                    Evaluation::Suppressed { .. } => report.suppressed += 1,
                    Evaluation::Triggered(_) => report.triggered += 1,
                },
                Ok(Err(e)) => {
                    report.failed += 1;
                    let error = format!("{e:#}");
                    tracing::error!(alert_id = %alert_id, error = %error, "Alert evaluation failed");
                }
                Err(join_err) => {
                    report.failed += 1;
                    tracing::error!(alert_id = %alert_id, error = %join_err, "Alert evaluation panicked");
                }
            }
        }

        Ok(report)
    }

    async fn process_alert(
        &self,
        mut alert: AlertDefinition,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome> {
        let evaluation = self.engine.evaluate(&alert, now).await?;

        let firing = match evaluation {
            Evaluation::Triggered(firing) => firing,
            Evaluation::Skipped(SkipReason::InvalidCondition(ref e)) => {
                tracing::warn!(alert_id = %alert.id, error = %e, "Alert skipped: invalid condition");
                return Ok(AlertOutcome::Evaluated(evaluation));
            }
            Evaluation::Skipped(SkipReason::NoData) => {
                tracing::debug!(
                    alert_id = %alert.id,
                    metric = alert.condition.metric.as_deref().unwrap_or_default(),
                    "Alert skipped: no data in window"
                );
                return Ok(AlertOutcome::Evaluated(evaluation));
            }
            Evaluation::NotTriggered { value } => {
                tracing::debug!(alert_id = %alert.id, value, "Condition not met");
                return Ok(AlertOutcome::Evaluated(evaluation));
            }
            Evaluation::Suppressed { value, eligible_at } => {
                tracing::debug!(
                    alert_id = %alert.id,
                    value,
                    eligible_at = %eligible_at,
                    "Condition met inside cooldown, suppressed"
                );
                return Ok(AlertOutcome::Evaluated(evaluation));
            }
        };

        alert.last_triggered_at = Some(now);
        self.repository
            .save(&alert)
            .await
            .context("failed to record trigger time")?;

        let trigger = self.engine.build_trigger(&alert, &firing, now);
        tracing::info!(
            alert_id = %alert.id,
            trigger_id = %trigger.id,
            metric = %trigger.metric_name,
            value = trigger.value,
            threshold = trigger.threshold,
            severity = %trigger.severity,
            "Alert triggered"
        );

        let dispatch = self.dispatcher.dispatch(&trigger, &alert.notification).await;
        Ok(AlertOutcome::Fired(dispatch))
    }
}

/// Controls a running scheduler loop.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Asks the loop to exit. A cycle already in progress finishes first.
    pub fn stop(&self) {
        // Fails only when the loop has already exited.
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Alert scheduler task failed");
        }
    }
}
