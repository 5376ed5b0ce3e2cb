//! rg-pipe-types: Shared data types for the rg-pipe metrics aggregator.
//!
//! This crate contains pure data types (value changes, the per-entry
//! receiver configuration, duration parsing) shared by every rg-pipe crate.
//! It has no async runtime dependency, making it suitable as a foundation layer.

pub mod change;
pub mod config;
pub mod duration;

// Re-export commonly used types at the crate root for convenience
pub use change::{Change, Snapshot};
pub use config::{ReceiverConfig, POLL_INTERVAL_KEY, RECEIVER_KEY};
pub use duration::{parse_duration, DurationError};

/// Loosely-typed value produced by receivers and consumed by templates
pub use serde_json::Value;
