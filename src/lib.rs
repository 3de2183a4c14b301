mod collector;
mod configuration;
mod data;
pub mod naming;
mod observation;
mod sink;
mod store;

pub use self::{
    collector::{Collector, Emission, Exporter, HttpStartStopCollector, Skipped, SumMode, ValueMetricsCollector},
    configuration::Configuration,
    data::{
        stream::{default_targets, DEFAULT_EPSILON},
        AggregationTree, Envelope, HttpStartStop, LeafKey, MethodStats, Sample, Stream, Target, ValueMetric,
        QUANTILES,
    },
    observation::{Desc, Observation, ObservationError, Summary, Value},
    sink::{Sink, SinkError},
    store::{MemoryStore, Store},
};
