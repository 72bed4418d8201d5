use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single sample produced by the telemetry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Alert severity tier, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Comparison applied between an aggregated value and the alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" => Ok(Self::GreaterThan),
            "less_than" | "lt" => Ok(Self::LessThan),
            "equals" | "eq" => Ok(Self::Equals),
            "not_equals" | "ne" => Ok(Self::NotEquals),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, "greater_than"),
            Self::LessThan => write!(f, "less_than"),
            Self::Equals => write!(f, "equals"),
            Self::NotEquals => write!(f, "not_equals"),
        }
    }
}

impl CompareOp {
    /// Short phrase used in alert messages ("cpu_usage is above 80.0").
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::GreaterThan => "above",
            Self::LessThan => "below",
            Self::Equals => "equal to",
            Self::NotEquals => "not equal to",
        }
    }
}

/// Aggregation function applied to the points inside an alert window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Avg,
    Sum,
    Max,
    Min,
    Count,
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" | "average" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "count" => Ok(Self::Count),
            _ => Err(format!("unknown aggregation: {s}")),
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Sum => write!(f, "sum"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Count => write!(f, "count"),
        }
    }
}

impl Aggregation {
    /// Reduces `values` to a single number. An empty slice yields
    /// [`Aggregate::NoData`], including for `Count`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_common::types::{Aggregate, Aggregation};
    ///
    /// assert_eq!(Aggregation::Avg.apply(&[80.0, 90.0]), Aggregate::Value(85.0));
    /// assert_eq!(Aggregation::Count.apply(&[]), Aggregate::NoData);
    /// ```
    pub fn apply(self, values: &[f64]) -> Aggregate {
        if values.is_empty() {
            return Aggregate::NoData;
        }
        let value = match self {
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Sum => values.iter().sum(),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Count => values.len() as f64,
        };
        Aggregate::Value(value)
    }
}

/// Result of a windowed aggregation. `NoData` is distinct from a zero value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Value(f64),
    NoData,
}

impl Aggregate {
    pub fn value(self) -> Option<f64> {
        match self {
            Aggregate::Value(v) => Some(v),
            Aggregate::NoData => None,
        }
    }
}

/// Notification delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Websocket,
    Webhook,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Websocket => write!(f, "websocket"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "websocket" => Ok(Self::Websocket),
            "webhook" => Ok(Self::Webhook),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

/// Upper bound for both the evaluation window and the cooldown (one year).
pub const MAX_CONDITION_MINUTES: i64 = 366 * 24 * 60;

fn default_window_minutes() -> i64 {
    5
}

fn default_cooldown_minutes() -> i64 {
    15
}

fn default_active() -> bool {
    true
}

/// Alert condition as stored by the owning user. Fields are optional because
/// the editing surface does not enforce completeness; [`ConditionConfig::validate`]
/// turns it into an [`AlertCondition`] the engine can evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub aggregation: Option<String>,
    #[serde(default = "default_window_minutes")]
    pub time_window_minutes: i64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            metric: None,
            operator: None,
            threshold: None,
            aggregation: None,
            time_window_minutes: default_window_minutes(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

/// Why a stored condition cannot be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("condition is missing '{0}'")]
    MissingField(&'static str),

    #[error("unknown compare operator '{0}'")]
    UnknownOperator(String),

    #[error("unknown aggregation '{0}'")]
    UnknownAggregation(String),

    #[error("time window must be > 0 minutes, got {0}")]
    InvalidWindow(i64),

    #[error("cooldown must be non-negative, got {0}")]
    NegativeCooldown(i64),

    #[error("time window of {0} minutes is out of range")]
    WindowOutOfRange(i64),

    #[error("cooldown of {0} minutes is out of range")]
    CooldownOutOfRange(i64),

    #[error("threshold must be a finite number, got {0}")]
    NonFiniteThreshold(f64),
}

impl ConditionConfig {
    pub fn validate(&self) -> Result<AlertCondition, ConfigError> {
        let metric = self
            .metric
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(ConfigError::MissingField("metric"))?;
        let operator = self
            .operator
            .as_deref()
            .ok_or(ConfigError::MissingField("operator"))?;
        let operator: CompareOp = operator
            .parse()
            .map_err(|_| ConfigError::UnknownOperator(operator.to_string()))?;
        let threshold = self.threshold.ok_or(ConfigError::MissingField("threshold"))?;
        if !threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold(threshold));
        }
        let aggregation = match self.aggregation.as_deref() {
            None => Aggregation::default(),
            Some(name) => name
                .parse()
                .map_err(|_| ConfigError::UnknownAggregation(name.to_string()))?,
        };
        if self.time_window_minutes <= 0 {
            return Err(ConfigError::InvalidWindow(self.time_window_minutes));
        }
        if self.cooldown_minutes < 0 {
            return Err(ConfigError::NegativeCooldown(self.cooldown_minutes));
        }
        let window = Some(self.time_window_minutes)
            .filter(|m| *m <= MAX_CONDITION_MINUTES)
            .and_then(Duration::try_minutes)
            .ok_or(ConfigError::WindowOutOfRange(self.time_window_minutes))?;
        let cooldown = Some(self.cooldown_minutes)
            .filter(|m| *m <= MAX_CONDITION_MINUTES)
            .and_then(Duration::try_minutes)
            .ok_or(ConfigError::CooldownOutOfRange(self.cooldown_minutes))?;

        Ok(AlertCondition {
            metric: metric.to_string(),
            operator,
            threshold,
            aggregation,
            window,
            cooldown,
        })
    }
}

/// A validated, evaluable alert condition.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCondition {
    pub metric: String,
    pub operator: CompareOp,
    pub threshold: f64,
    pub aggregation: Aggregation,
    pub window: Duration,
    pub cooldown: Duration,
}

/// Per-alert delivery preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub channels: Vec<ChannelKind>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Extra headers merged into the webhook request.
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,
}

impl NotificationConfig {
    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        self.channels.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub condition: ConditionConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl AlertDefinition {
    /// Name used in messages: the user-given name, else the metric, else the id.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.condition
            .metric
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.id)
    }
}

/// A fired alert, built during one evaluation pass and handed to the
/// notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertTrigger {
    pub id: String,
    pub alert_id: String,
    pub alert_name: String,
    pub user_id: String,
    pub metric_name: String,
    pub aggregation: Aggregation,
    pub value: f64,
    pub threshold: f64,
    pub operator: CompareOp,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}
