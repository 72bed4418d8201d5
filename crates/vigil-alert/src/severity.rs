use crate::error::AlertError;
use serde::{Deserialize, Serialize};
use vigil_common::types::Severity;

fn default_medium_pct() -> f64 {
    10.0
}

fn default_high_pct() -> f64 {
    25.0
}

fn default_critical_pct() -> f64 {
    50.0
}

/// Percent-over-threshold boundaries for each tier above `low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityTiers {
    #[serde(default = "default_medium_pct")]
    pub medium_pct: f64,
    #[serde(default = "default_high_pct")]
    pub high_pct: f64,
    #[serde(default = "default_critical_pct")]
    pub critical_pct: f64,
}

impl Default for SeverityTiers {
    fn default() -> Self {
        Self {
            medium_pct: default_medium_pct(),
            high_pct: default_high_pct(),
            critical_pct: default_critical_pct(),
        }
    }
}

/// Deviation from `threshold` as a percentage of it. A zero threshold counts
/// as 100% so that any excursion from zero grades as far as possible.
pub fn excess_pct(observed: f64, threshold: f64) -> f64 {
    if threshold == 0.0 {
        return 100.0;
    }
    (observed - threshold).abs() / threshold.abs() * 100.0
}

impl SeverityTiers {
    pub fn validate(&self) -> Result<(), AlertError> {
        let tiers = [self.medium_pct, self.high_pct, self.critical_pct];
        if tiers.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(AlertError::InvalidTiers(format!(
                "tiers must be finite and non-negative: {tiers:?}"
            )));
        }
        if !(self.medium_pct <= self.high_pct && self.high_pct <= self.critical_pct) {
            return Err(AlertError::InvalidTiers(format!(
                "tiers must be non-decreasing: medium={} high={} critical={}",
                self.medium_pct, self.high_pct, self.critical_pct
            )));
        }
        Ok(())
    }

    /// Highest tier whose boundary the excess reaches; `low` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_alert::SeverityTiers;
    /// use vigil_common::types::Severity;
    ///
    /// let tiers = SeverityTiers::default();
    /// assert_eq!(tiers.classify(85.0, 80.0), Severity::Low);
    /// assert_eq!(tiers.classify(130.0, 80.0), Severity::Critical);
    /// assert_eq!(tiers.classify(3.0, 0.0), Severity::Critical);
    /// ```
    pub fn classify(&self, observed: f64, threshold: f64) -> Severity {
        let excess = excess_pct(observed, threshold);
        if excess >= self.critical_pct {
            Severity::Critical
        } else if excess >= self.high_pct {
            Severity::High
        } else if excess >= self.medium_pct {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}
