//! # Utility Modules
//!
//! Ambient support for the server.
//!
//! ## Components
//! - **Logging**: `tracing` subscriber setup
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
