use super::{stream::Stream, HttpStartStop};
use fnv::FnvBuildHasher;
use hashbrown::{hash_map, HashMap, HashSet};
use std::fmt::{self, Display};

/// The `(application, instance, uri, method)` tuple a leaf is aggregated under.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafKey {
    pub application_id: String,
    pub instance_id: String,
    pub uri: String,
    pub method: String,
}

impl LeafKey {
    pub(crate) fn label_values(&self) -> Vec<String> {
        vec![
            self.application_id.clone(),
            self.instance_id.clone(),
            self.uri.clone(),
            self.method.clone(),
        ]
    }
}

impl<'a> From<&'a HttpStartStop> for LeafKey {
    fn from(record: &'a HttpStartStop) -> LeafKey {
        LeafKey {
            application_id: record.application_id.clone(),
            instance_id: record.instance_id.clone(),
            uri: record.uri.clone(),
            method: record.method.clone(),
        }
    }
}

impl Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}",
            self.application_id, self.instance_id, self.method, self.uri
        )
    }
}

/// Aggregated statistics for a single leaf.
#[derive(Clone, Debug, Default)]
pub struct MethodStats {
    status_codes: HashMap<i32, u64, FnvBuildHasher>,
    content_length: Stream,
    client_duration: Stream,
    server_duration: Stream,
}

impl MethodStats {
    pub fn new() -> MethodStats { Default::default() }

    fn record(&mut self, record: &HttpStartStop) {
        *self.status_codes.entry(record.status_code).or_insert(0) += 1;
        self.content_length.insert(record.content_length as f64);
        self.client_duration.insert(record.client_duration as f64);
        self.server_duration.insert(record.server_duration as f64);
    }

    /// Number of requests seen per status code.
    pub fn status_codes(&self) -> &HashMap<i32, u64, FnvBuildHasher> { &self.status_codes }

    /// Total number of requests aggregated into this leaf.
    pub fn requests(&self) -> u64 { self.status_codes.values().sum() }

    pub fn content_length(&mut self) -> &mut Stream { &mut self.content_length }

    pub fn client_duration(&mut self) -> &mut Stream { &mut self.client_duration }

    pub fn server_duration(&mut self) -> &mut Stream { &mut self.server_duration }
}

/// HTTP start-stop records aggregated by application, instance, uri and method.
///
/// The hierarchy is flattened into a single map keyed by the full tuple.  A tree only ever lives
/// for one collection cycle: it is built from a batch of records and consumed when emitted.
#[derive(Debug, Default)]
pub struct AggregationTree {
    leaves: HashMap<LeafKey, MethodStats, FnvBuildHasher>,
    discarded: u64,
}

impl AggregationTree {
    /// Aggregates a batch of records in a single pass.
    ///
    /// Records without an application id are skipped, and only counted towards `discarded`.
    pub fn aggregate(records: &[HttpStartStop]) -> AggregationTree {
        let mut tree = AggregationTree::default();
        for record in records {
            tree.insert(record);
        }
        tree
    }

    fn insert(&mut self, record: &HttpStartStop) {
        if record.application_id.is_empty() {
            self.discarded += 1;
            return;
        }

        self.leaves
            .entry(LeafKey::from(record))
            .or_insert_with(MethodStats::new)
            .record(record);
    }

    /// Number of distinct leaves.
    pub fn len(&self) -> usize { self.leaves.len() }

    pub fn is_empty(&self) -> bool { self.leaves.is_empty() }

    /// Number of records skipped for lacking an application id.
    pub fn discarded(&self) -> u64 { self.discarded }

    pub fn get(&self, key: &LeafKey) -> Option<&MethodStats> { self.leaves.get(key) }

    pub fn get_mut(&mut self, key: &LeafKey) -> Option<&mut MethodStats> { self.leaves.get_mut(key) }

    pub fn iter(&self) -> hash_map::Iter<'_, LeafKey, MethodStats> { self.leaves.iter() }

    /// Distinct application ids present in the tree, sorted.
    pub fn applications(&self) -> Vec<&str> {
        let mut applications = self
            .leaves
            .keys()
            .map(|key| key.application_id.as_str())
            .collect::<HashSet<_, FnvBuildHasher>>()
            .into_iter()
            .collect::<Vec<_>>();
        applications.sort_unstable();
        applications
    }
}

impl IntoIterator for AggregationTree {
    type IntoIter = hash_map::IntoIter<LeafKey, MethodStats>;
    type Item = (LeafKey, MethodStats);

    fn into_iter(self) -> Self::IntoIter { self.leaves.into_iter() }
}
