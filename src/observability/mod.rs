//! Observability subsystem for quizapi
//!
//! - Structured logging through `tracing`
//! - Atomic operational counters, served at `/metrics`

mod logging;
mod metrics;

pub use logging::{init_logging, LoggingConfig};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
