use serde_json::{json, Value};
use vigil_common::types::AlertTrigger;

/// Maximum number of bytes of a remote response kept in errors and logs.
pub const MAX_BODY_LENGTH: usize = 2000;

/// JSON document describing a trigger, shared by the webhook and websocket
/// channels.
pub fn trigger_payload(trigger: &AlertTrigger) -> Value {
    json!({
        "trigger_id": trigger.id,
        "alert_id": trigger.alert_id,
        "alert_name": trigger.alert_name,
        "user_id": trigger.user_id,
        "metric": trigger.metric_name,
        "aggregation": trigger.aggregation.to_string(),
        "value": trigger.value,
        "threshold": trigger.threshold,
        "operator": trigger.operator.to_string(),
        "severity": trigger.severity.to_string(),
        "message": trigger.message,
        "triggered_at": trigger.triggered_at.to_rfc3339(),
    })
}

/// Truncate `s` to at most `max` bytes on a char boundary.
pub fn truncate_string(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
