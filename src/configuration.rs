use crate::{
    collector::{Exporter, HttpStartStopCollector, SumMode, ValueMetricsCollector},
    observation::ObservationError,
    store::MemoryStore,
};
use std::time::Duration;

/// A configuration builder for `Exporter` and `MemoryStore`.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub(crate) namespace: String,
    pub(crate) environment: String,
    pub(crate) sum_mode: SumMode,
    pub(crate) expiration: Duration,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            namespace: "firehose".to_owned(),
            environment: String::new(),
            sum_mode: SumMode::Exact,
            expiration: Duration::from_secs(600),
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration { Default::default() }

    /// Sets the metric namespace.
    ///
    /// Defaults to `firehose`.
    ///
    /// Every metric name starts with the namespace, followed by the collector's subsystem:
    /// `firehose_http_start_stop_request_total`.  An empty namespace is left out entirely.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_owned();
        self
    }

    /// Sets the environment.
    ///
    /// Defaults to an empty string.
    ///
    /// Attached to every value metric as the `environment` label.
    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_owned();
        self
    }

    /// Sets how summary sums are computed.
    ///
    /// Defaults to `SumMode::Exact`.
    ///
    /// `SumMode::Samples` estimates the sum from the quantile summary instead, as `Σ value·width`
    /// over its samples.  The estimate is off by however far folded observations sit from the
    /// sample that absorbed them.
    pub fn sum_mode(mut self, sum_mode: SumMode) -> Self {
        self.sum_mode = sum_mode;
        self
    }

    /// Sets how long a record stays in the store after it was received.
    ///
    /// Defaults to `10 minutes`.
    ///
    /// Value metrics that are not updated and HTTP start-stop records older than this are dropped
    /// the next time the store is read.
    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Creates a `MemoryStore` based on this configuration.
    pub fn build_store(&self) -> MemoryStore { MemoryStore::new(self.expiration) }

    /// Creates an `Exporter` with the value metrics and HTTP start-stop collectors.
    ///
    /// Fails if the namespace does not produce valid metric names.
    pub fn build(self) -> Result<Exporter, ObservationError> {
        let value_metrics = ValueMetricsCollector::new(&self.namespace, &self.environment)?;
        let http_start_stop = HttpStartStopCollector::new(&self.namespace, self.sum_mode)?;

        Ok(Exporter::new(vec![Box::new(value_metrics), Box::new(http_start_stop)]))
    }
}
