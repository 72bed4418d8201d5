use vigil_common::types::ConfigError;
use vigil_storage::StorageError;

/// Failures while evaluating a single alert.
///
/// Configuration problems are reported as [`crate::Evaluation::Skipped`] by
/// [`crate::AlertEngine::evaluate`] so the caller can log and move on.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The metric store could not answer. Retried on the next cycle.
    #[error("Alert: metric store query for '{metric}' failed: {source}")]
    MetricStore {
        metric: String,
        #[source]
        source: StorageError,
    },

    /// The condition cannot be applied at the requested evaluation time.
    #[error("Alert: {0}")]
    Condition(#[from] ConfigError),

    /// Severity tiers are not ascending or not finite.
    #[error("Alert: invalid severity tiers: {0}")]
    InvalidTiers(String),
}
