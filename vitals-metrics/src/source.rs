use std::fmt::Debug;

/// The uniform polling contract of a measurement source.
///
/// Every source accumulates observations through its own write operations and
/// can always report a current scalar, regardless of the math behind it.
/// Implementations must be safe to read concurrently with their own updates.
pub trait MeasurementSource: Debug + Send + Sync {
    /// Verify if at least one observation has been recorded on this source.
    ///
    /// # Returns
    ///
    /// Returns `true` when the source has been used, otherwise `false`.
    fn is_used(&self) -> bool;

    /// The current scalar value of the source.
    fn value(&self) -> f64;
}
