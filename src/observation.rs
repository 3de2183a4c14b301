use crate::naming::{is_valid_label_name, is_valid_metric_name};
use fnv::FnvBuildHasher;
use hashbrown::HashSet;
use serde::Serialize;
use thiserror::Error;

/// Errors while describing or constructing an observation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ObservationError {
    /// The fully-qualified metric name is not a valid metric name.
    #[error("`{0}` is not a valid metric name")]
    InvalidMetricName(String),

    /// A label name is empty, contains illegal characters, or is reserved.
    #[error("`{0}` is not a valid label name")]
    InvalidLabelName(String),

    /// The same label name was given more than once, across const and variable labels.
    #[error("duplicate label name `{0}`")]
    DuplicateLabelName(String),

    /// The number of label values given does not match the number of variable labels.
    #[error("expected {expected} label values, got {actual}")]
    LabelCardinality { expected: usize, actual: usize },
}

/// Describes a metric: its name, help text and label names.
///
/// Building a `Desc` validates the metric and label names, so any observation constructed from
/// it only has to check the number of label values.
#[derive(Clone, Debug, PartialEq)]
pub struct Desc {
    fq_name: String,
    help: String,
    const_labels: Vec<(String, String)>,
    variable_labels: Vec<String>,
}

impl Desc {
    pub fn new<N, H>(
        fq_name: N, help: H, variable_labels: Vec<String>, const_labels: Vec<(String, String)>,
    ) -> Result<Desc, ObservationError>
    where
        N: Into<String>,
        H: Into<String>,
    {
        let fq_name = fq_name.into();
        if !is_valid_metric_name(&fq_name) {
            return Err(ObservationError::InvalidMetricName(fq_name));
        }

        {
            let mut seen = HashSet::with_hasher(FnvBuildHasher::default());
            let names = const_labels.iter().map(|(name, _)| name).chain(variable_labels.iter());
            for name in names {
                if !is_valid_label_name(name) {
                    return Err(ObservationError::InvalidLabelName(name.clone()));
                }
                if !seen.insert(name.as_str()) {
                    return Err(ObservationError::DuplicateLabelName(name.clone()));
                }
            }
        }

        Ok(Desc {
            fq_name,
            help: help.into(),
            const_labels,
            variable_labels,
        })
    }

    pub fn fq_name(&self) -> &str { &self.fq_name }

    pub fn help(&self) -> &str { &self.help }

    pub fn const_labels(&self) -> &[(String, String)] { &self.const_labels }

    pub fn variable_labels(&self) -> &[String] { &self.variable_labels }
}

/// The measured value of an observation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// A monotonically increasing total.
    Counter(f64),

    /// A point-in-time value.
    Gauge(f64),

    /// A distribution, summarized by its count, sum and a set of quantiles.
    Summary(Summary),
}

/// A summarized distribution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,

    /// `(quantile, value)` pairs, in ascending quantile order.
    pub quantiles: Vec<(f64, f64)>,
}

/// A single labeled data point, ready to be handed to an exposition format.
///
/// Const labels of the describing `Desc` come first in `label_names`, followed by its variable
/// labels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Observation {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub label_values: Vec<String>,
    pub value: Value,
}

impl Observation {
    pub fn counter(desc: &Desc, value: f64, label_values: Vec<String>) -> Result<Observation, ObservationError> {
        Observation::new(desc, Value::Counter(value), label_values)
    }

    pub fn gauge(desc: &Desc, value: f64, label_values: Vec<String>) -> Result<Observation, ObservationError> {
        Observation::new(desc, Value::Gauge(value), label_values)
    }

    pub fn summary(desc: &Desc, summary: Summary, label_values: Vec<String>) -> Result<Observation, ObservationError> {
        Observation::new(desc, Value::Summary(summary), label_values)
    }

    fn new(desc: &Desc, value: Value, label_values: Vec<String>) -> Result<Observation, ObservationError> {
        if label_values.len() != desc.variable_labels.len() {
            return Err(ObservationError::LabelCardinality {
                expected: desc.variable_labels.len(),
                actual: label_values.len(),
            });
        }

        let label_count = desc.const_labels.len() + desc.variable_labels.len();
        let mut label_names = Vec::with_capacity(label_count);
        let mut values = Vec::with_capacity(label_count);
        for (name, value) in &desc.const_labels {
            label_names.push(name.clone());
            values.push(value.clone());
        }
        label_names.extend(desc.variable_labels.iter().cloned());
        values.extend(label_values);

        Ok(Observation {
            name: desc.fq_name.clone(),
            help: desc.help.clone(),
            label_names,
            label_values: values,
            value,
        })
    }

    /// Gets the value of the given label, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.label_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.label_values[i].as_str())
    }
}
