use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;
use thiserror::Error;

use crate::core::metrics::MetricSnapshot;

/// Represents errors that can occur while delivering metrics to a transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The transport is currently unable to deliver batches.
    #[error("transport is currently unavailable")]
    Unavailable,
    /// The transport failed to deliver the batch.
    #[error("failed to deliver the metrics batch, {0}")]
    Delivery(String),
}

/// The `MetricTransport` trait moves sanitized metric batches off-process.
///
/// A transport may become unavailable at any time; the collector verifies
/// [MetricTransport::is_available] before each collection tick and skips the
/// tick entirely when the transport cannot accept a batch. Delivery and
/// retry behavior beyond a single attempt per tick belong to the transport
/// implementation.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait MetricTransport: Debug + Send + Sync {
    /// Verify if the transport is currently able to deliver batches.
    fn is_available(&self) -> bool;

    /// Deliver a batch of metric snapshots.
    ///
    /// # Arguments
    ///
    /// * `metrics` - The sanitized snapshots of the current collection tick.
    ///
    /// # Returns
    ///
    /// Returns an error when the batch couldn't be delivered.
    async fn send_metrics(&self, metrics: Vec<MetricSnapshot>) -> Result<(), TransportError>;
}
