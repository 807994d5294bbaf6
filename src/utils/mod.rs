//! Utility modules: logging, metrics, and chart generation

pub mod charts;
pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogLevel};
pub use metrics::{ClassMetrics, ConfusionMatrix, Metrics};
