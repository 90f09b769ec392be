use std::result;

use thiserror::Error;

/// Represents errors that can occur while registering metrics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricError {
    /// The metric declared an empty or blank name.
    #[error("invalid metric name declared: {0:?}")]
    InvalidName(String),
}

/// Alias for `Result` with `MetricError`.
pub type Result<T> = result::Result<T, MetricError>;
