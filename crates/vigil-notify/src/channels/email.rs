use crate::error::{NotifyError, Result};
use crate::{Delivery, NotificationChannel};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use vigil_common::types::{AlertTrigger, ChannelKind, NotificationConfig};
use vigil_storage::UserDirectory;

/// Outgoing mail transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// SMTP sender over a pooled async `lettre` transport.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        if smtp_host.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("smtp host is empty".into()));
        }
        from.parse::<Mailbox>()
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid from address '{from}': {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid recipient '{to}': {e}")))?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;
        Ok(())
    }
}

/// Emails the alert owner at the address the user directory holds for them.
pub struct EmailChannel {
    directory: Arc<dyn UserDirectory>,
    sender: Arc<dyn EmailSender>,
}

impl EmailChannel {
    pub fn new(directory: Arc<dyn UserDirectory>, sender: Arc<dyn EmailSender>) -> Self {
        Self { directory, sender }
    }

    pub fn subject(trigger: &AlertTrigger) -> String {
        format!(
            "[vigil][{}] {} - {}",
            trigger.severity, trigger.alert_name, trigger.metric_name
        )
    }

    pub fn render_html(trigger: &AlertTrigger) -> String {
        format!(
            "<h2>Alert: {name}</h2>\
             <p>{message}</p>\
             <table>\
             <tr><td>Severity</td><td>{severity}</td></tr>\
             <tr><td>Metric</td><td>{aggregation}({metric})</td></tr>\
             <tr><td>Value</td><td>{value:.2}</td></tr>\
             <tr><td>Condition</td><td>{operator} {threshold:.2}</td></tr>\
             <tr><td>Time</td><td>{time}</td></tr>\
             </table>",
            name = escape_html(&trigger.alert_name),
            message = escape_html(&trigger.message),
            severity = trigger.severity,
            aggregation = trigger.aggregation,
            metric = escape_html(&trigger.metric_name),
            value = trigger.value,
            operator = trigger.operator,
            threshold = trigger.threshold,
            time = trigger.triggered_at.to_rfc3339(),
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, trigger: &AlertTrigger, _config: &NotificationConfig) -> Result<Delivery> {
        let Some(address) = self.directory.get_email(&trigger.user_id).await? else {
            tracing::warn!(
                alert_id = %trigger.alert_id,
                user_id = %trigger.user_id,
                "No email address for alert owner, skipping email"
            );
            return Ok(Delivery::Skipped("owner has no email address".into()));
        };

        self.sender
            .send(&address, &Self::subject(trigger), &Self::render_html(trigger))
            .await?;
        Ok(Delivery::Delivered)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }
}
