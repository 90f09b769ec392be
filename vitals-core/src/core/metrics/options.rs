use std::fmt::{Debug, Formatter};
use std::time::Duration;

use vitals_metrics::Measurement;

use crate::core::metrics::MetricValue;

/// A zero-argument accessor producing the current value of a
/// function-backed metric.
pub type ValueProvider = Box<dyn Fn() -> MetricValue + Send + Sync>;

/// The registration options of a counter, gauge or function-backed metric.
pub struct MetricOptions {
    pub(crate) name: String,
    pub(crate) id: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) historic: bool,
    pub(crate) value: Option<ValueProvider>,
}

impl MetricOptions {
    pub fn builder() -> MetricOptionsBuilder {
        MetricOptionsBuilder::builder()
    }

    /// The unique name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether downstream storage should retain history for the metric.
    pub fn historic(&self) -> bool {
        self.historic
    }
}

impl Debug for MetricOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricOptions")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("historic", &self.historic)
            .field("value", &self.value.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// Builder for creating `MetricOptions` instances.
#[derive(Default)]
pub struct MetricOptionsBuilder {
    name: Option<String>,
    id: Option<String>,
    unit: Option<String>,
    historic: Option<bool>,
    value: Option<ValueProvider>,
}

impl MetricOptionsBuilder {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the unique name of the metric.
    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the opaque identifier passed through to the transport.
    pub fn id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display unit of the metric.
    pub fn unit<T: Into<String>>(mut self, unit: T) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets whether downstream storage should retain history for the metric.
    pub fn historic(mut self, historic: bool) -> Self {
        self.historic = Some(historic);
        self
    }

    /// Sets the value accessor of the metric, turning the registration into
    /// a function-backed metric without an owned measurement source.
    pub fn value<F>(mut self, value: F) -> Self
    where
        F: Fn() -> MetricValue + Send + Sync + 'static,
    {
        self.value = Some(Box::new(value));
        self
    }

    /// Builds the `MetricOptions` instance.
    /// The name is validated at registration, not here.
    pub fn build(self) -> MetricOptions {
        MetricOptions {
            name: self.name.unwrap_or_default(),
            id: self.id,
            unit: self.unit,
            historic: self.historic.unwrap_or(true),
            value: self.value,
        }
    }
}

/// The registration options of a meter metric.
#[derive(Debug)]
pub struct MeterOptions {
    pub(crate) name: String,
    pub(crate) id: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) historic: bool,
    pub(crate) rate_unit: Duration,
    pub(crate) timeframe: Duration,
}

impl MeterOptions {
    pub fn builder() -> MeterOptionsBuilder {
        MeterOptionsBuilder::builder()
    }

    /// The unique name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for creating `MeterOptions` instances.
#[derive(Debug, Default)]
pub struct MeterOptionsBuilder {
    name: Option<String>,
    id: Option<String>,
    unit: Option<String>,
    historic: Option<bool>,
    rate_unit: Option<Duration>,
    timeframe: Option<Duration>,
}

impl MeterOptionsBuilder {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the unique name of the metric.
    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the opaque identifier passed through to the transport.
    pub fn id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display unit of the metric.
    pub fn unit<T: Into<String>>(mut self, unit: T) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets whether downstream storage should retain history for the metric.
    pub fn historic(mut self, historic: bool) -> Self {
        self.historic = Some(historic);
        self
    }

    /// Sets the rate unit the meter reports its occurrences per.
    pub fn rate_unit(mut self, rate_unit: Duration) -> Self {
        self.rate_unit = Some(rate_unit);
        self
    }

    /// Sets the rolling window the meter computes its rate over.
    pub fn timeframe(mut self, timeframe: Duration) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    /// Builds the `MeterOptions` instance, applying the meter source
    /// defaults for any tuning option which has not been set.
    pub fn build(self) -> MeterOptions {
        MeterOptions {
            name: self.name.unwrap_or_default(),
            id: self.id,
            unit: self.unit,
            historic: self.historic.unwrap_or(true),
            rate_unit: self.rate_unit.unwrap_or(Duration::ZERO),
            timeframe: self.timeframe.unwrap_or(Duration::ZERO),
        }
    }
}

/// The registration options of a histogram metric.
#[derive(Debug)]
pub struct HistogramOptions {
    pub(crate) name: String,
    pub(crate) id: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) historic: bool,
    pub(crate) measurement: Measurement,
    pub(crate) sample_size: usize,
}

impl HistogramOptions {
    pub fn builder() -> HistogramOptionsBuilder {
        HistogramOptionsBuilder::builder()
    }

    /// The unique name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The statistic the histogram reports.
    pub fn measurement(&self) -> Measurement {
        self.measurement
    }
}

/// Builder for creating `HistogramOptions` instances.
#[derive(Debug, Default)]
pub struct HistogramOptionsBuilder {
    name: Option<String>,
    id: Option<String>,
    unit: Option<String>,
    historic: Option<bool>,
    measurement: Option<Measurement>,
    sample_size: Option<usize>,
}

impl HistogramOptionsBuilder {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the unique name of the metric.
    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the opaque identifier passed through to the transport.
    pub fn id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display unit of the metric.
    pub fn unit<T: Into<String>>(mut self, unit: T) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets whether downstream storage should retain history for the metric.
    pub fn historic(mut self, historic: bool) -> Self {
        self.historic = Some(historic);
        self
    }

    /// Sets the statistic the histogram reports as its value.
    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.measurement = Some(measurement);
        self
    }

    /// Sets the number of observations the histogram retains.
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    /// Builds the `HistogramOptions` instance, reporting the mean over the
    /// default sample size when not configured otherwise.
    pub fn build(self) -> HistogramOptions {
        HistogramOptions {
            name: self.name.unwrap_or_default(),
            id: self.id,
            unit: self.unit,
            historic: self.historic.unwrap_or(true),
            measurement: self.measurement.unwrap_or_default(),
            sample_size: self.sample_size.unwrap_or(0),
        }
    }
}
