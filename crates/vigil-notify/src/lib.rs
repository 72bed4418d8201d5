//! Notification fan-out for fired alerts.
//!
//! Every delivery mechanism implements [`NotificationChannel`] and is
//! registered once on the [`dispatcher::NotificationDispatcher`]. The
//! dispatcher calls each channel an alert enables, independently, and never
//! retries: a failed delivery is logged and the next evaluation cycle is the
//! only second chance.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod payload;


use async_trait::async_trait;
use vigil_common::types::{AlertTrigger, ChannelKind, NotificationConfig};

pub use dispatcher::{ChannelOutcome, DispatchReport, NotificationDispatcher};
pub use error::{NotifyError, Result};

/// What a channel did with a trigger when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nothing was sent, for a reason that is not an error (no address, no
    /// connected session, no URL).
    Skipped(String),
}

/// A delivery mechanism for alert triggers.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers `trigger` using the per-alert settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails. The dispatcher logs it and
    /// carries on with the remaining channels.
    async fn send(&self, trigger: &AlertTrigger, config: &NotificationConfig) -> Result<Delivery>;

    fn kind(&self) -> ChannelKind;
}
