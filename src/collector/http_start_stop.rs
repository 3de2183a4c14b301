use super::{Collector, Emission};
use crate::{
    data::{AggregationTree, LeafKey, Stream, QUANTILES},
    naming::build_fq_name,
    observation::{Desc, Observation, ObservationError, Summary},
    store::Store,
};

pub(crate) const SUBSYSTEM: &str = "http_start_stop";

const LABELS: [&str; 4] = ["application_id", "instance_id", "uri", "method"];

/// How the `sum` of a reported summary is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SumMode {
    /// The exact sum of every observation, tracked alongside the quantile summary.
    Exact,

    /// An estimate from the samples retained by the quantile summary, weighting each sample's value
    /// by its width (`Σ value·width`).
    ///
    /// Every observation is counted once, at the value of the sample it was folded into, so the
    /// estimate tracks the exact sum rather than shrinking as samples are merged.
    Samples,
}

impl Default for SumMode {
    fn default() -> SumMode { SumMode::Exact }
}

/// Reports HTTP request totals, response sizes and durations per application, instance, uri and
/// method.
pub struct HttpStartStopCollector {
    sum_mode: SumMode,
    request_total: Desc,
    response_size_bytes: Desc,
    client_request_duration: Desc,
    server_request_duration: Desc,
}

impl HttpStartStopCollector {
    pub fn new(namespace: &str, sum_mode: SumMode) -> Result<HttpStartStopCollector, ObservationError> {
        let labels = || LABELS.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let summary = |name: &str, help: &str| Desc::new(build_fq_name(namespace, SUBSYSTEM, name), help, labels(), vec![]);

        let mut request_total_labels = labels();
        request_total_labels.push("status_code".to_owned());

        Ok(HttpStartStopCollector {
            sum_mode,
            request_total: Desc::new(
                build_fq_name(namespace, SUBSYSTEM, "request_total"),
                "Cloud Foundry Firehose http start stop total requests.",
                request_total_labels,
                vec![],
            )?,
            response_size_bytes: summary(
                "response_size_bytes",
                "Cloud Foundry Firehose http start stop request size in bytes.",
            )?,
            client_request_duration: summary(
                "client_request_duration_nanoseconds",
                "Cloud Foundry Firehose http start stop client request duration in nanoseconds.",
            )?,
            server_request_duration: summary(
                "server_request_duration_nanoseconds",
                "Cloud Foundry Firehose http start stop server request duration in nanoseconds.",
            )?,
        })
    }

    /// Turns an aggregated batch into observations.
    ///
    /// Each leaf yields a response size, client duration and server duration summary, plus one
    /// request counter per status code seen.
    pub fn emit(&self, tree: AggregationTree) -> Emission {
        let mut emission = Emission {
            discarded: tree.discarded(),
            ..Default::default()
        };

        for (key, mut stats) in tree {
            let labels = key.label_values();
            self.summarize(&mut emission, &key, &labels, &self.response_size_bytes, stats.content_length());
            self.summarize(&mut emission, &key, &labels, &self.client_request_duration, stats.client_duration());
            self.summarize(&mut emission, &key, &labels, &self.server_request_duration, stats.server_duration());

            for (status_code, total) in stats.status_codes() {
                let mut labels = labels.clone();
                labels.push(status_code.to_string());
                let result = Observation::counter(&self.request_total, *total as f64, labels);
                emission.push(result, self.request_total.fq_name(), || key.to_string());
            }
        }

        emission
    }

    fn summarize(&self, emission: &mut Emission, key: &LeafKey, labels: &[String], desc: &Desc, stream: &mut Stream) {
        let quantiles = QUANTILES.iter().map(|q| (*q, stream.query(*q))).collect();
        let sum = match self.sum_mode {
            SumMode::Exact => stream.sum(),
            SumMode::Samples => stream.approximate_sum(),
        };
        let summary = Summary {
            count: stream.count(),
            sum,
            quantiles,
        };

        let result = Observation::summary(desc, summary, labels.to_vec());
        emission.push(result, desc.fq_name(), || key.to_string());
    }
}

impl Collector for HttpStartStopCollector {
    fn describe(&self) -> Vec<Desc> {
        vec![
            self.request_total.clone(),
            self.response_size_bytes.clone(),
            self.client_request_duration.clone(),
            self.server_request_duration.clone(),
        ]
    }

    fn collect(&self, store: &dyn Store) -> Emission {
        let records = store.http_start_stops();
        self.emit(AggregationTree::aggregate(&records))
    }
}
