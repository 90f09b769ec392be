use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, trace, warn};
use vitals_metrics::{Counter, Gauge, Histogram, MeasurementSource, Meter};

use crate::core::metrics::{
    MetricError, MetricKind, MetricSnapshot, MetricValue, Result, ValueProvider,
};

/// The measurement source variant owned by a metric record.
///
/// Each variant exposes the same polling behavior: sources which haven't
/// recorded any observation yet report the NaN sentinel, function-backed
/// records invoke the caller's accessor directly without any guard.
pub enum MetricSource {
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Gauge(Arc<Gauge>),
    Function(ValueProvider),
}

impl MetricSource {
    /// Compute the current value of the source.
    pub(crate) fn poll(&self) -> MetricValue {
        match self {
            MetricSource::Counter(counter) => Self::guarded(counter.as_ref()),
            MetricSource::Meter(meter) => Self::guarded(meter.as_ref()),
            MetricSource::Gauge(gauge) => Self::guarded(gauge.as_ref()),
            MetricSource::Histogram(histogram) => {
                if histogram.is_used() {
                    MetricValue::Number((histogram.value() * 100.0).round() / 100.0)
                } else {
                    MetricValue::Number(f64::NAN)
                }
            }
            MetricSource::Function(provider) => provider(),
        }
    }

    fn guarded(source: &dyn MeasurementSource) -> MetricValue {
        if source.is_used() {
            MetricValue::Number(source.value())
        } else {
            MetricValue::Number(f64::NAN)
        }
    }
}

impl Debug for MetricSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricSource::Counter(counter) => f.debug_tuple("Counter").field(counter).finish(),
            MetricSource::Meter(meter) => f.debug_tuple("Meter").field(meter).finish(),
            MetricSource::Histogram(histogram) => {
                f.debug_tuple("Histogram").field(histogram).finish()
            }
            MetricSource::Gauge(gauge) => f.debug_tuple("Gauge").field(gauge).finish(),
            MetricSource::Function(_) => f.write_str("Function"),
        }
    }
}

/// A registered metric, binding its identity and metadata to the owned
/// measurement source and the value of the last collection tick.
#[derive(Debug)]
pub struct MetricRecord {
    name: String,
    kind: MetricKind,
    id: Option<String>,
    unit: Option<String>,
    historic: bool,
    source: MetricSource,
    value: Option<MetricValue>,
}

impl MetricRecord {
    /// Create a new record for the given source, retaining history by
    /// default.
    pub fn new<T: Into<String>>(name: T, kind: MetricKind, source: MetricSource) -> Self {
        Self {
            name: name.into(),
            kind,
            id: None,
            unit: None,
            historic: true,
            source,
            value: None,
        }
    }

    /// Create a new function-backed record of the generic metric kind.
    pub fn function<T, F>(name: T, provider: F) -> Self
    where
        T: Into<String>,
        F: Fn() -> MetricValue + Send + Sync + 'static,
    {
        Self::new(
            name,
            MetricKind::Metric,
            MetricSource::Function(Box::new(provider)),
        )
    }

    pub(crate) fn from_parts(
        name: String,
        kind: MetricKind,
        id: Option<String>,
        unit: Option<String>,
        historic: bool,
        source: MetricSource,
    ) -> Self {
        Self {
            name,
            kind,
            id,
            unit,
            historic,
            source,
            value: None,
        }
    }

    /// Sets the opaque identifier passed through to the transport.
    pub fn with_id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display unit of the metric.
    pub fn with_unit<T: Into<String>>(mut self, unit: T) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets whether downstream storage should retain history for the metric.
    pub fn with_historic(mut self, historic: bool) -> Self {
        self.historic = historic;
        self
    }

    /// The unique name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of the metric.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// The value of the last collection tick, if any.
    pub fn value(&self) -> Option<&MetricValue> {
        self.value.as_ref()
    }

    /// Refresh the cached value from the source, isolating a panicking
    /// accessor to this record only. A record whose accessor panicked has no
    /// value until a later tick succeeds.
    pub(crate) fn refresh(&mut self) {
        match catch_unwind(AssertUnwindSafe(|| self.source.poll())) {
            Ok(value) => self.value = Some(value),
            Err(_) => {
                warn!("Metric {} panicked while computing its value", self.name);
                self.value = None;
            }
        }
    }

    /// The sanitized snapshot of this record, or [None] when the current
    /// value is absent or not exportable.
    pub fn snapshot(&self) -> Option<MetricSnapshot> {
        self.value
            .as_ref()
            .filter(|e| e.is_exportable())
            .map(|value| MetricSnapshot {
                name: self.name.clone(),
                kind: self.kind,
                id: self.id.clone(),
                unit: self.unit.clone(),
                historic: self.historic,
                value: value.clone(),
            })
    }
}

/// The name-keyed registry of all currently registered metrics.
///
/// The registry itself applies no locking; the metric service owns it
/// behind a mutex so registrations cannot interleave with an in-flight
/// collection tick.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: HashMap<String, MetricRecord>,
}

impl MetricRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the given record, replacing any existing record with the
    /// same name.
    ///
    /// # Returns
    ///
    /// Returns an error when the record declares an invalid name, in which
    /// case the registry remains untouched.
    pub fn insert(&mut self, record: MetricRecord) -> Result<()> {
        Self::validate(&record)?;

        if self.metrics.contains_key(record.name()) {
            debug!("Replacing existing metric {}", record.name());
        }

        trace!("Registering new metric {}", record.name());
        self.metrics.insert(record.name().to_string(), record);
        Ok(())
    }

    /// Remove the metric with the given name.
    ///
    /// # Returns
    ///
    /// Returns `true` when a metric was removed, otherwise `false`.
    pub fn remove(&mut self, name: &str) -> bool {
        self.metrics.remove(name).is_some()
    }

    /// Get the record registered under the given name.
    pub fn get(&self, name: &str) -> Option<&MetricRecord> {
        self.metrics.get(name)
    }

    /// Iterate over all registered records in undefined order.
    pub fn values(&self) -> impl Iterator<Item = &MetricRecord> {
        self.metrics.values()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut MetricRecord> {
        self.metrics.values_mut()
    }

    /// The number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Verify if the registry holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Remove all registered metrics.
    pub fn clear(&mut self) {
        self.metrics.clear();
    }

    /// Verify that the given name is allowed to identify a metric.
    ///
    /// # Returns
    ///
    /// Returns an error for an empty or blank name.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            error!("Invalid metric name declared: {:?}", name);
            return Err(MetricError::InvalidName(name.to_string()));
        }

        Ok(())
    }

    fn validate(record: &MetricRecord) -> Result<()> {
        Self::validate_name(record.name())
    }
}
