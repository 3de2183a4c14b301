use serde::Serialize;
use std::collections::BTreeMap;

pub mod stream;
pub mod tree;

pub use self::{
    stream::{Sample, Stream, Target, QUANTILES},
    tree::{AggregationTree, LeafKey, MethodStats},
};

/// A scalar observation emitted by a firehose origin.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValueMetric {
    pub origin: String,
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
    pub name: String,
    pub value: f64,
    pub unit: String,

    /// Free-form tags, reported as additional labels in key order.
    pub tags: BTreeMap<String, String>,
}

impl ValueMetric {
    /// Identity under which a newer value replaces an older one.
    pub(crate) fn identity(&self) -> ValueMetricKey {
        ValueMetricKey {
            origin: self.origin.clone(),
            deployment: self.deployment.clone(),
            job: self.job.clone(),
            index: self.index.clone(),
            ip: self.ip.clone(),
            name: self.name.clone(),
            tags: self.tags.clone(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct ValueMetricKey {
    origin: String,
    deployment: String,
    job: String,
    index: String,
    ip: String,
    name: String,
    tags: BTreeMap<String, String>,
}

/// A completed HTTP request, as observed by the router or the application.
///
/// Durations are in nanoseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HttpStartStop {
    /// Owning application.  Empty for platform-internal traffic, which is never aggregated.
    pub application_id: String,
    pub instance_id: String,
    pub uri: String,
    pub method: String,
    pub status_code: i32,
    pub content_length: i64,
    pub client_duration: i64,
    pub server_duration: i64,
}

/// A single unit of telemetry off the firehose.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Envelope {
    ValueMetric(ValueMetric),
    HttpStartStop(HttpStartStop),
}

impl From<ValueMetric> for Envelope {
    fn from(metric: ValueMetric) -> Envelope { Envelope::ValueMetric(metric) }
}

impl From<HttpStartStop> for Envelope {
    fn from(record: HttpStartStop) -> Envelope { Envelope::HttpStartStop(record) }
}
