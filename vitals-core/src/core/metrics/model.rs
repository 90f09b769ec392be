use derive_more::Display;
use serde::Serialize;

/// The kind of a registered metric, determining which measurement source
/// backs it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[display("counter")]
    Counter,
    #[display("meter")]
    Meter,
    #[display("histogram")]
    Histogram,
    #[display("gauge")]
    Gauge,
    /// The generic kind used by directly registered metrics.
    #[display("metric")]
    Metric,
}

/// A polled metric value.
///
/// [MetricValue::Number] with a NaN payload is the sentinel produced by
/// sources which haven't recorded any observation yet; such values never
/// leave the process.
#[derive(Debug, Display, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    #[display("{_0}")]
    Number(f64),
    #[display("{_0}")]
    Text(String),
    #[display("{_0}")]
    Bool(bool),
}

impl MetricValue {
    /// Verify if this value is allowed to cross the process boundary.
    ///
    /// # Returns
    ///
    /// Returns `true` for text, booleans and finite numbers, otherwise `false`.
    pub fn is_exportable(&self) -> bool {
        match self {
            MetricValue::Number(value) => value.is_finite(),
            MetricValue::Text(_) => true,
            MetricValue::Bool(_) => true,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// The sanitized snapshot of a metric as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    /// The unique name of the metric.
    pub name: String,
    /// The kind of the metric.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// The optional opaque identifier supplied at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The optional display unit of the metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Whether downstream storage should retain history for this metric.
    pub historic: bool,
    /// The value of the metric at collection time.
    pub value: MetricValue,
}
