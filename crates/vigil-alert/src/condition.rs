use vigil_common::types::CompareOp;

/// Absolute tolerance used by `equals` / `not_equals`.
pub const EQUALITY_TOLERANCE: f64 = 1e-3;

/// Compares an observed aggregate with the alert threshold.
///
/// `equals` and `not_equals` are exact complements, both using
/// [`EQUALITY_TOLERANCE`].
///
/// # Examples
///
/// ```
/// use vigil_alert::condition::evaluate;
/// use vigil_common::types::CompareOp;
///
/// assert!(evaluate(85.0, 80.0, CompareOp::GreaterThan));
/// assert!(evaluate(80.0004, 80.0, CompareOp::Equals));
/// assert!(!evaluate(80.0004, 80.0, CompareOp::NotEquals));
/// ```
pub fn evaluate(observed: f64, threshold: f64, operator: CompareOp) -> bool {
    match operator {
        CompareOp::GreaterThan => observed > threshold,
        CompareOp::LessThan => observed < threshold,
        CompareOp::Equals => (observed - threshold).abs() < EQUALITY_TOLERANCE,
        CompareOp::NotEquals => !evaluate(observed, threshold, CompareOp::Equals),
    }
}

/// String-keyed variant of [`evaluate`]. Unknown operators never trigger.
pub fn evaluate_named(observed: f64, threshold: f64, operator: &str) -> bool {
    match operator.parse::<CompareOp>() {
        Ok(op) => evaluate(observed, threshold, op),
        Err(e) => {
            tracing::warn!(operator, error = %e, "Unknown operator, condition treated as not met");
            false
        }
    }
}
