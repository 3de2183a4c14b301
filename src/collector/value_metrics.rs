use super::{Collector, Emission};
use crate::{
    data::ValueMetric,
    naming::{build_fq_name, normalize_name},
    observation::{Desc, Observation, ObservationError},
    store::Store,
};

pub(crate) const SUBSYSTEM: &str = "value_metrics";

const LABELS: [&str; 6] = [
    "origin",
    "bosh_deployment",
    "bosh_job_name",
    "bosh_job_id",
    "bosh_job_ip",
    "unit",
];

/// Reports every value metric as a gauge.
///
/// The metric name is derived from the origin and name of each value metric, so descriptors are
/// built per record and a record whose names or tags clash is skipped on its own.
pub struct ValueMetricsCollector {
    namespace: String,
    environment: String,
    collector_desc: Desc,
}

impl ValueMetricsCollector {
    pub fn new(namespace: &str, environment: &str) -> Result<ValueMetricsCollector, ObservationError> {
        let collector_desc = Desc::new(
            build_fq_name(namespace, SUBSYSTEM, "collector"),
            "Cloud Foundry Firehose value metrics collector.",
            vec![],
            vec![("environment".to_owned(), environment.to_owned())],
        )?;

        Ok(ValueMetricsCollector {
            namespace: namespace.to_owned(),
            environment: environment.to_owned(),
            collector_desc,
        })
    }

    /// Turns a batch of value metrics into gauges.
    pub fn emit(&self, metrics: &[ValueMetric]) -> Emission {
        let mut emission = Emission::default();
        for metric in metrics {
            let fq_name = self.fq_name(metric);
            let result = self.observe(&fq_name, metric);
            emission.push(result, &fq_name, || format!("{}/{}", metric.origin, metric.name));
        }
        emission
    }

    fn fq_name(&self, metric: &ValueMetric) -> String {
        let name = format!("{}_{}", normalize_name(&metric.origin), normalize_name(&metric.name));
        build_fq_name(&self.namespace, SUBSYSTEM, &name)
    }

    fn observe(&self, fq_name: &str, metric: &ValueMetric) -> Result<Observation, ObservationError> {
        let mut label_names: Vec<String> = LABELS.iter().map(|s| s.to_string()).collect();
        let mut label_values = vec![
            metric.origin.clone(),
            metric.deployment.clone(),
            metric.job.clone(),
            metric.index.clone(),
            metric.ip.clone(),
            metric.unit.clone(),
        ];
        for (key, value) in &metric.tags {
            label_names.push(normalize_name(key));
            label_values.push(value.clone());
        }

        // Only the metric name is normalized; help is free-form and shows the record as received.
        let desc = Desc::new(
            fq_name,
            format!("Cloud Foundry Firehose '{}' value metric from '{}'.", metric.name, metric.origin),
            label_names,
            vec![("environment".to_owned(), self.environment.clone())],
        )?;

        Observation::gauge(&desc, metric.value, label_values)
    }
}

impl Collector for ValueMetricsCollector {
    fn describe(&self) -> Vec<Desc> { vec![self.collector_desc.clone()] }

    fn collect(&self, store: &dyn Store) -> Emission { self.emit(&store.value_metrics()) }
}
