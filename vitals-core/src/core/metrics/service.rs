use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use log::{debug, info, trace, warn};
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use vitals_metrics::{Counter, Gauge, Histogram, Meter};

use crate::core::metrics::{
    HistogramOptions, MeterOptions, MetricKind, MetricOptions, MetricRecord, MetricRegistry,
    MetricSnapshot, MetricSource, Result,
};
use crate::core::transport::MetricTransport;

/// The default interval between two collection ticks.
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the state of the metric collector.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MetricState {
    #[display("idle")]
    Idle,
    #[display("collecting")]
    Collecting,
}

/// The metric service registers named measurement sources and periodically
/// exports their sanitized values to the configured transport.
///
/// Registration hands back the live measurement source, allowing the caller
/// to push updates directly; the service itself only ever reads source
/// values during a collection tick. Without a transport the service remains
/// idle for its entire lifetime and never collects.
#[derive(Debug)]
pub struct MetricService {
    inner: Arc<InnerMetricService>,
}

impl MetricService {
    pub fn builder() -> MetricServiceBuilder {
        MetricServiceBuilder::builder()
    }

    /// The current state of the metric collector.
    pub async fn state(&self) -> MetricState {
        self.inner.state().await
    }

    /// Start the periodic collection of metric values.
    ///
    /// Starting an already collecting or stopped service is a no-op, as is
    /// starting a service without a transport.
    pub async fn start(&self) {
        let state = self.inner.state().await;
        if state == MetricState::Collecting {
            debug!("Metric service is already collecting");
            return;
        }
        if self.inner.cancellation_token.is_cancelled() {
            debug!("Metric service has been stopped, ignoring start");
            return;
        }
        if self.inner.transport.is_none() {
            info!("No metric transport is available, metric collection remains idle");
            return;
        }

        debug!("Starting metric collection");
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.update_state(MetricState::Collecting).await;
            let mut interval = interval(inner.interval);
            loop {
                select! {
                    _ = inner.cancellation_token.cancelled() => break,
                    _ = interval.tick() => inner.collect().await,
                }
            }
            inner.update_state(MetricState::Idle).await;
            debug!("Metric collection loop ended");
        });
    }

    /// Stop the metric collector and discard all registered metrics.
    pub async fn stop(&self) {
        if !self.inner.cancellation_token.is_cancelled() {
            trace!("Stopping the metric service");
            self.inner.cancellation_token.cancel();
        }

        let mut registry = self.inner.registry.lock().await;
        registry.clear();
    }

    /// Register a new counter metric.
    ///
    /// # Returns
    ///
    /// Returns the counter handle for recording increments, or an error when
    /// the registration was rejected.
    pub async fn counter(&self, options: MetricOptions) -> Result<Arc<Counter>> {
        MetricRegistry::validate_name(&options.name)?;
        let counter = Arc::new(Counter::new());
        let record = MetricRecord::from_parts(
            options.name,
            MetricKind::Counter,
            options.id,
            options.unit,
            options.historic,
            MetricSource::Counter(counter.clone()),
        );
        self.inner.register(record).await?;

        Ok(counter)
    }

    /// Register a new meter metric.
    ///
    /// # Returns
    ///
    /// Returns the meter handle for recording occurrences, or an error when
    /// the registration was rejected.
    pub async fn meter(&self, options: MeterOptions) -> Result<Arc<Meter>> {
        MetricRegistry::validate_name(&options.name)?;
        let meter = Arc::new(Meter::with_config(options.rate_unit, options.timeframe));
        let record = MetricRecord::from_parts(
            options.name,
            MetricKind::Meter,
            options.id,
            options.unit,
            options.historic,
            MetricSource::Meter(meter.clone()),
        );
        self.inner.register(record).await?;

        Ok(meter)
    }

    /// Register a new histogram metric reporting the configured statistic,
    /// rounded to two decimals during collection.
    ///
    /// # Returns
    ///
    /// Returns the histogram handle for recording observations, or an error
    /// when the registration was rejected.
    pub async fn histogram(&self, options: HistogramOptions) -> Result<Arc<Histogram>> {
        MetricRegistry::validate_name(&options.name)?;
        let histogram = Arc::new(Histogram::with_config(
            options.measurement,
            options.sample_size,
        ));
        let record = MetricRecord::from_parts(
            options.name,
            MetricKind::Histogram,
            options.id,
            options.unit,
            options.historic,
            MetricSource::Histogram(histogram.clone()),
        );
        self.inner.register(record).await?;

        Ok(histogram)
    }

    /// Register a new gauge-style metric.
    ///
    /// When the options carry a value accessor, the metric is backed by the
    /// caller's function instead of an owned source and the caller is fully
    /// responsible for returning a valid value.
    ///
    /// # Returns
    ///
    /// Returns the gauge handle for storing observations, [None] for a
    /// function-backed registration, or an error when the registration was
    /// rejected.
    pub async fn metric(&self, options: MetricOptions) -> Result<Option<Arc<Gauge>>> {
        MetricRegistry::validate_name(&options.name)?;
        match options.value {
            Some(provider) => {
                let record = MetricRecord::from_parts(
                    options.name,
                    MetricKind::Gauge,
                    options.id,
                    options.unit,
                    options.historic,
                    MetricSource::Function(provider),
                );
                self.inner.register(record).await?;

                Ok(None)
            }
            None => {
                let gauge = Arc::new(Gauge::new());
                let record = MetricRecord::from_parts(
                    options.name,
                    MetricKind::Gauge,
                    options.id,
                    options.unit,
                    options.historic,
                    MetricSource::Gauge(gauge.clone()),
                );
                self.inner.register(record).await?;

                Ok(Some(gauge))
            }
        }
    }

    /// Register a pre-built metric record directly.
    pub async fn register(&self, record: MetricRecord) -> Result<()> {
        self.inner.register(record).await
    }

    /// Remove the metric with the given name.
    ///
    /// # Returns
    ///
    /// Returns `true` when the metric was removed, otherwise `false`.
    pub async fn delete_metric(&self, name: &str) -> bool {
        let mut registry = self.inner.registry.lock().await;
        let removed = registry.remove(name);
        if removed {
            debug!("Removed metric {}", name);
        }

        removed
    }

    /// The snapshots of the most recent collection tick, in undefined order.
    /// Metrics which haven't produced an exportable value yet are omitted.
    pub async fn metrics(&self) -> Vec<MetricSnapshot> {
        let registry = self.inner.registry.lock().await;
        registry.values().filter_map(MetricRecord::snapshot).collect()
    }
}

impl Drop for MetricService {
    fn drop(&mut self) {
        trace!("Dropping {:?}", self);
        self.inner.cancellation_token.cancel();
    }
}

/// Builder for creating `MetricService` instances.
#[derive(Debug, Default)]
pub struct MetricServiceBuilder {
    transport: Option<Arc<dyn MetricTransport>>,
    interval: Option<Duration>,
}

impl MetricServiceBuilder {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the transport the collected metric batches are exported to.
    pub fn transport(mut self, transport: Arc<dyn MetricTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the interval between two collection ticks.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Builds the `MetricService` instance.
    ///
    /// The transport is optional by design; a service without one remains
    /// idle and never exports.
    pub fn build(self) -> MetricService {
        MetricService {
            inner: Arc::new(InnerMetricService {
                transport: self.transport,
                interval: self
                    .interval
                    .filter(|e| !e.is_zero())
                    .unwrap_or(DEFAULT_COLLECT_INTERVAL),
                registry: Default::default(),
                state: Mutex::new(MetricState::Idle),
                cancellation_token: Default::default(),
            }),
        }
    }
}

#[derive(Debug)]
struct InnerMetricService {
    transport: Option<Arc<dyn MetricTransport>>,
    interval: Duration,
    registry: Mutex<MetricRegistry>,
    state: Mutex<MetricState>,
    cancellation_token: CancellationToken,
}

impl InnerMetricService {
    async fn state(&self) -> MetricState {
        *self.state.lock().await
    }

    async fn update_state(&self, state: MetricState) {
        let mut mutex = self.state.lock().await;
        *mutex = state;
        info!("Metric service state changed to {}", state);
    }

    async fn register(&self, record: MetricRecord) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.insert(record)
    }

    /// Execute a single collection tick.
    ///
    /// The tick is skipped wholesale when the transport is absent or
    /// unavailable; registered metrics are never touched in that case.
    async fn collect(&self) {
        let transport = match &self.transport {
            Some(transport) => transport,
            None => return,
        };
        if !transport.is_available() {
            debug!("Metric transport is unavailable, skipping collection tick");
            return;
        }

        trace!("Refreshing metric values");
        let metrics: Vec<MetricSnapshot>;
        {
            let mut registry = self.registry.lock().await;
            for record in registry.values_mut() {
                record.refresh();
            }
            metrics = registry.values().filter_map(MetricRecord::snapshot).collect();
        }

        trace!("Sending {} metrics to the transport", metrics.len());
        if let Err(e) = transport.send_metrics(metrics).await {
            warn!("Failed to send metrics to the transport, {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::metrics::{MetricError, MetricValue};
    use crate::core::transport::MockMetricTransport;
    use crate::{assert_timeout_eq, init_logger};

    use std::sync::mpsc::channel;
    use vitals_metrics::MeasurementSource;

    #[tokio::test]
    async fn test_counter() {
        init_logger!();
        let service = MetricService::builder().build();

        let counter = service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .expect("expected the counter to have been registered");
        counter.inc();

        let registry = service.inner.registry.lock().await;
        assert_eq!(1, registry.len());
        assert_eq!(
            MetricKind::Counter,
            registry.get("reqs").unwrap().kind()
        );
        assert_eq!(1, counter.count());
    }

    #[tokio::test]
    async fn test_meter() {
        init_logger!();
        let service = MetricService::builder().build();

        let meter = service
            .meter(
                MeterOptions::builder()
                    .name("volume")
                    .rate_unit(Duration::from_secs(1))
                    .timeframe(Duration::from_secs(10))
                    .build(),
            )
            .await
            .expect("expected the meter to have been registered");
        meter.mark_n(20);

        let registry = service.inner.registry.lock().await;
        assert_eq!(MetricKind::Meter, registry.get("volume").unwrap().kind());
        assert_eq!(2.0, meter.value());
    }

    #[tokio::test]
    async fn test_histogram() {
        init_logger!();
        let service = MetricService::builder().build();

        let histogram = service
            .histogram(HistogramOptions::builder().name("latency").build())
            .await
            .expect("expected the histogram to have been registered");
        histogram.observe(1.111);

        let registry = service.inner.registry.lock().await;
        assert_eq!(
            MetricKind::Histogram,
            registry.get("latency").unwrap().kind()
        );
        assert_eq!(1.111, histogram.value());
    }

    #[tokio::test]
    async fn test_metric_gauge_mode() {
        init_logger!();
        let service = MetricService::builder().build();

        let gauge = service
            .metric(MetricOptions::builder().name("threads").build())
            .await
            .expect("expected the metric to have been registered")
            .expect("expected a gauge handle to have been returned");
        gauge.set(8.0);

        let registry = service.inner.registry.lock().await;
        assert_eq!(MetricKind::Gauge, registry.get("threads").unwrap().kind());
        assert_eq!(8.0, gauge.get());
    }

    #[tokio::test]
    async fn test_metric_function_mode() {
        init_logger!();
        let service = MetricService::builder().build();

        let result = service
            .metric(
                MetricOptions::builder()
                    .name("uptime")
                    .value(|| MetricValue::from(42))
                    .build(),
            )
            .await
            .expect("expected the metric to have been registered");

        assert_eq!(
            true,
            result.is_none(),
            "expected no source handle for a function-backed metric"
        );
        let registry = service.inner.registry.lock().await;
        assert_eq!(MetricKind::Gauge, registry.get("uptime").unwrap().kind());
    }

    #[tokio::test]
    async fn test_register_invalid_name() {
        init_logger!();
        let service = MetricService::builder().build();

        let result = service
            .counter(MetricOptions::builder().build())
            .await;

        assert_eq!(
            MetricError::InvalidName(String::new()),
            result.unwrap_err()
        );
        let registry = service.inner.registry.lock().await;
        assert_eq!(
            true,
            registry.is_empty(),
            "expected no metric to have been registered"
        );
    }

    #[tokio::test]
    async fn test_register_replaces_on_name_collision() {
        init_logger!();
        let service = MetricService::builder().build();

        service
            .counter(MetricOptions::builder().name("cpu").build())
            .await
            .unwrap();
        service
            .metric(MetricOptions::builder().name("cpu").build())
            .await
            .unwrap();

        let registry = service.inner.registry.lock().await;
        assert_eq!(1, registry.len());
        assert_eq!(MetricKind::Gauge, registry.get("cpu").unwrap().kind());
    }

    #[tokio::test]
    async fn test_register_direct() {
        init_logger!();
        let service = MetricService::builder().build();

        service
            .register(MetricRecord::function("uptime", || MetricValue::from(42)))
            .await
            .expect("expected the record to have been registered");

        let registry = service.inner.registry.lock().await;
        assert_eq!(MetricKind::Metric, registry.get("uptime").unwrap().kind());
    }

    #[tokio::test]
    async fn test_delete_metric() {
        init_logger!();
        let service = MetricService::builder().build();
        service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();

        assert_eq!(true, service.delete_metric("reqs").await);
        assert_eq!(
            false,
            service.delete_metric("reqs").await,
            "expected the removal of an unknown metric to be a no-op"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_counter() {
        init_logger!();
        let (tx, rx) = channel();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(move |metrics| {
            tx.send(metrics).unwrap();
            Ok(())
        });
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .interval(Duration::from_millis(50))
            .build();

        let counter = service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();
        counter.inc();
        counter.inc();
        counter.inc();
        service.start().await;

        let metrics = rx
            .recv_timeout(Duration::from_millis(500))
            .expect("expected a batch to have been sent");
        let snapshot = metrics
            .into_iter()
            .find(|e| e.name == "reqs")
            .expect("expected the counter to be part of the batch");

        assert_eq!(MetricKind::Counter, snapshot.kind);
        assert_eq!(MetricValue::Number(3.0), snapshot.value);
        assert_eq!(true, snapshot.historic);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_function_metric() {
        init_logger!();
        let (tx, rx) = channel();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(move |metrics| {
            tx.send(metrics).unwrap();
            Ok(())
        });
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .interval(Duration::from_millis(50))
            .build();

        service
            .metric(
                MetricOptions::builder()
                    .name("uptime")
                    .value(|| MetricValue::from(42))
                    .build(),
            )
            .await
            .unwrap();
        service.start().await;

        let metrics = rx
            .recv_timeout(Duration::from_millis(500))
            .expect("expected a batch to have been sent");
        let snapshot = metrics
            .into_iter()
            .find(|e| e.name == "uptime")
            .expect("expected the function metric to be part of the batch");

        assert_eq!(MetricValue::Number(42.0), snapshot.value);
    }

    #[tokio::test]
    async fn test_collect_unused_sources_excluded() {
        init_logger!();
        let (tx, rx) = channel();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(move |metrics| {
            tx.send(metrics).unwrap();
            Ok(())
        });
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .build();

        service
            .histogram(HistogramOptions::builder().name("latency").build())
            .await
            .unwrap();
        service.inner.collect().await;

        let metrics = rx.recv().expect("expected a batch to have been sent");
        assert_eq!(
            0,
            metrics.len(),
            "expected a histogram without data to be excluded from the batch"
        );
    }

    #[tokio::test]
    async fn test_collect_isolates_panicking_metric() {
        init_logger!();
        let (tx, rx) = channel();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(move |metrics| {
            tx.send(metrics).unwrap();
            Ok(())
        });
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .build();

        service
            .metric(
                MetricOptions::builder()
                    .name("broken")
                    .value(|| panic!("lorem ipsum"))
                    .build(),
            )
            .await
            .unwrap();
        let counter = service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();
        counter.inc();
        service.inner.collect().await;

        let metrics = rx.recv().expect("expected a batch to have been sent");
        assert_eq!(
            vec!["reqs"],
            metrics.iter().map(|e| e.name.as_str()).collect::<Vec<&str>>(),
            "expected the panicking metric to be excluded without aborting the tick"
        );
    }

    #[tokio::test]
    async fn test_collect_transport_unavailable() {
        init_logger!();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(false);
        transport.expect_send_metrics().times(0);
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .build();

        let counter = service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();
        counter.inc();
        service.inner.collect().await;

        let registry = service.inner.registry.lock().await;
        assert_eq!(
            None,
            registry.get("reqs").unwrap().value(),
            "expected the tick to have been skipped without refreshing any metric"
        );
    }

    #[tokio::test]
    async fn test_start_without_transport() {
        init_logger!();
        let service = MetricService::builder()
            .interval(Duration::from_millis(10))
            .build();

        let counter = service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();
        counter.inc();
        service.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(MetricState::Idle, service.state().await);
        service.inner.collect().await;
        let registry = service.inner.registry.lock().await;
        assert_eq!(
            None,
            registry.get("reqs").unwrap().value(),
            "expected a manual tick to be a no-op without a transport"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop() {
        init_logger!();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(|_| Ok(()));
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .interval(Duration::from_millis(20))
            .build();

        service
            .counter(MetricOptions::builder().name("reqs").build())
            .await
            .unwrap();
        service.start().await;
        assert_timeout_eq!(
            Duration::from_millis(200),
            MetricState::Collecting,
            service.state().await
        );

        service.stop().await;

        assert_eq!(true, service.inner.cancellation_token.is_cancelled());
        assert_timeout_eq!(
            Duration::from_millis(500),
            MetricState::Idle,
            service.state().await
        );
        let registry = service.inner.registry.lock().await;
        assert_eq!(
            true,
            registry.is_empty(),
            "expected all metrics to have been discarded"
        );
        drop(registry);

        service.start().await;
        assert_eq!(
            MetricState::Idle,
            service.state().await,
            "expected a stopped service to ignore a new start"
        );
    }

    #[tokio::test]
    async fn test_metrics_enumeration() {
        init_logger!();
        let mut transport = MockMetricTransport::new();
        transport.expect_is_available().return_const(true);
        transport.expect_send_metrics().returning(|_| Ok(()));
        let service = MetricService::builder()
            .transport(Arc::new(transport))
            .build();

        let counter = service
            .counter(MetricOptions::builder().name("reqs").unit("calls").build())
            .await
            .unwrap();
        counter.inc();

        assert_eq!(
            true,
            service.metrics().await.is_empty(),
            "expected no snapshots before the first collection tick"
        );

        service.inner.collect().await;
        let metrics = service.metrics().await;

        assert_eq!(1, metrics.len());
        assert_eq!("reqs", metrics[0].name);
        assert_eq!(Some("calls".to_string()), metrics[0].unit);
    }
}
