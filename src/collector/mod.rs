use crate::{
    observation::{Desc, Observation, ObservationError},
    store::Store,
};
use log::{debug, error};

pub mod http_start_stop;
pub mod value_metrics;

pub use self::{
    http_start_stop::{HttpStartStopCollector, SumMode},
    value_metrics::ValueMetricsCollector,
};

/// A source of observations, drawn from a `Store` on every collection cycle.
pub trait Collector {
    /// Describes the metrics this collector produces.
    fn describe(&self) -> Vec<Desc>;

    /// Runs one collection cycle against the given store.
    fn collect(&self, store: &dyn Store) -> Emission;
}

/// An observation that could not be constructed, and was left out of its cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Skipped {
    /// The record the observation was derived from.
    pub record: String,

    /// The metric the observation was meant for.
    pub metric: String,

    pub error: ObservationError,
}

/// The outcome of a single collection cycle.
#[derive(Debug, Default)]
pub struct Emission {
    pub observations: Vec<Observation>,
    pub skipped: Vec<Skipped>,

    /// Records filtered out before aggregation, such as HTTP start-stops with no application.
    pub discarded: u64,
}

impl Emission {
    /// Keeps a constructed observation, or records why it was skipped.
    ///
    /// `record` is only rendered on failure.
    pub(crate) fn push<F>(&mut self, result: Result<Observation, ObservationError>, metric: &str, record: F)
    where
        F: FnOnce() -> String,
    {
        match result {
            Ok(observation) => self.observations.push(observation),
            Err(error) => self.skipped.push(Skipped {
                record: record(),
                metric: metric.to_owned(),
                error,
            }),
        }
    }
}

/// The set of collectors exposed to a metrics consumer.
pub struct Exporter {
    collectors: Vec<Box<dyn Collector + Send + Sync>>,
}

impl Exporter {
    pub fn new(collectors: Vec<Box<dyn Collector + Send + Sync>>) -> Exporter { Exporter { collectors } }

    /// Describes every metric the collectors produce.
    pub fn describe(&self) -> Vec<Desc> { self.collectors.iter().flat_map(|c| c.describe()).collect() }

    /// Runs a collection cycle across all collectors.
    ///
    /// Observations that could not be constructed are logged and left out; they never fail the
    /// cycle.
    pub fn gather(&self, store: &dyn Store) -> Vec<Observation> {
        let mut observations = Vec::new();
        let mut skipped = 0;
        let mut discarded = 0;

        for collector in &self.collectors {
            let emission = collector.collect(store);
            for s in &emission.skipped {
                error!("metric `{}` from `{}` discarded: {}", s.metric, s.record, s.error);
            }

            skipped += emission.skipped.len();
            discarded += emission.discarded;
            observations.extend(emission.observations);
        }

        debug!(
            "collected {} observations ({} skipped, {} records discarded)",
            observations.len(),
            skipped,
            discarded
        );
        observations
    }
}
