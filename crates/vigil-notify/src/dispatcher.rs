use crate::{Delivery, NotificationChannel};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use vigil_common::types::{AlertTrigger, ChannelKind, NotificationConfig};

/// Per-channel result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<(ChannelKind, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, kind: ChannelKind) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Delivered))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ChannelOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Fans a trigger out to every channel the alert enables.
///
/// Channels run one after another and are isolated from each other: an
/// error or panic from one is recorded and logged, and the next channel
/// still runs.
#[derive(Default)]
pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel, replacing any earlier one of the same kind.
    pub fn register(&mut self, channel: Box<dyn NotificationChannel>) {
        let kind = channel.kind();
        self.channels.retain(|c| c.kind() != kind);
        tracing::info!(channel = %kind, "Notification channel registered");
        self.channels.push(channel);
    }

    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.channels.iter().any(|c| c.kind() == kind)
    }

    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.kind()).collect()
    }

    pub async fn dispatch(
        &self,
        trigger: &AlertTrigger,
        config: &NotificationConfig,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for kind in &config.channels {
            if report.outcome(*kind).is_some() {
                continue;
            }

            let Some(channel) = self.channels.iter().find(|c| c.kind() == *kind) else {
                tracing::warn!(
                    alert_id = %trigger.alert_id,
                    channel = %kind,
                    "Channel enabled on alert but not configured on this server"
                );
                report
                    .outcomes
                    .push((*kind, ChannelOutcome::Skipped("channel not configured".into())));
                continue;
            };

            let sent = AssertUnwindSafe(channel.send(trigger, config))
                .catch_unwind()
                .await;
            let outcome = match sent {
                Ok(Ok(Delivery::Delivered)) => {
                    tracing::info!(
                        alert_id = %trigger.alert_id,
                        trigger_id = %trigger.id,
                        channel = %kind,
                        severity = %trigger.severity,
                        "Notification sent"
                    );
                    ChannelOutcome::Delivered
                }
                Ok(Ok(Delivery::Skipped(reason))) => ChannelOutcome::Skipped(reason),
                Ok(Err(e)) => {
                    tracing::error!(
                        alert_id = %trigger.alert_id,
                        trigger_id = %trigger.id,
                        channel = %kind,
                        error = %e,
                        "Failed to send notification"
                    );
                    ChannelOutcome::Failed(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        alert_id = %trigger.alert_id,
                        trigger_id = %trigger.id,
                        channel = %kind,
                        panic = %message,
                        "Notification channel panicked"
                    );
                    ChannelOutcome::Failed(format!("channel panicked: {message}"))
                }
            };
            report.outcomes.push((*kind, outcome));
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
