//! Shared domain types for the vigil alert engine: alert definitions,
//! metric points, triggers and the enums they are built from.

pub mod id;
pub mod types;
