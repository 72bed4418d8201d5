//! Alert evaluation for metric threshold conditions.
//!
//! Each active alert is evaluated independently: the [`aggregate::MetricAggregator`]
//! reduces the alert's trailing window to one value, [`condition::evaluate`]
//! compares it to the threshold, the cooldown decides whether a firing
//! condition may notify again, and [`severity::SeverityTiers`] grades how far
//! the value overshot. [`engine::AlertEngine`] ties the steps together for a
//! single alert; the polling loop lives with the server.

pub mod aggregate;
pub mod condition;
pub mod engine;
pub mod error;
pub mod severity;

#[cfg(test)]
mod tests;

pub use engine::{cooldown_elapsed, AlertEngine, Evaluation, Firing, SkipReason};
pub use error::AlertError;
pub use severity::SeverityTiers;
