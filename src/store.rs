use crate::{
    data::{Envelope, HttpStartStop, ValueMetric, ValueMetricKey},
    sink::{Arrival, Sink},
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use log::trace;
use parking_lot::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of the records a collection cycle works on.
///
/// Every call must return a consistent snapshot, even if records are being ingested
/// concurrently.
pub trait Store {
    /// Current value metrics.
    fn value_metrics(&self) -> Vec<ValueMetric>;

    /// Current HTTP start-stop records.
    fn http_start_stops(&self) -> Vec<HttpStartStop>;
}

#[derive(Default)]
struct State {
    value_metrics: HashMap<ValueMetricKey, (Instant, ValueMetric), FnvBuildHasher>,
    http_start_stops: Vec<(Instant, HttpStartStop)>,
}

impl State {
    fn ingest(&mut self, at: Instant, envelope: Envelope) {
        match envelope {
            Envelope::ValueMetric(metric) => {
                let _ = self.value_metrics.insert(metric.identity(), (at, metric));
            },
            Envelope::HttpStartStop(record) => self.http_start_stops.push((at, record)),
        }
    }

    fn prune(&mut self, now: Instant, expiration: Duration) {
        let expired = |at: &Instant| now.saturating_duration_since(*at) > expiration;

        let value_metrics = self.value_metrics.len();
        self.value_metrics.retain(|_, (at, _)| !expired(at));
        let http_start_stops = self.http_start_stops.len();
        self.http_start_stops.retain(|(at, _)| !expired(at));

        let pruned = (value_metrics - self.value_metrics.len()) + (http_start_stops - self.http_start_stops.len());
        if pruned > 0 {
            trace!("pruned {} expired records", pruned);
        }
    }
}

/// An in-memory `Store` fed by `Sink`s.
///
/// Value metrics are kept per identity (origin, deployment, job, index, ip, name and tags), with a
/// newer value replacing an older one.  HTTP start-stop records are all kept.  Anything that has
/// not been seen within the expiration window is dropped.
pub struct MemoryStore {
    data_tx: Sender<Arrival>,
    data_rx: Receiver<Arrival>,
    expiration: Duration,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store whose records expire after `expiration`.
    pub fn new(expiration: Duration) -> MemoryStore {
        let (data_tx, data_rx) = unbounded();

        MemoryStore {
            data_tx,
            data_rx,
            expiration,
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a `Sink` bound to this store.
    pub fn sink(&self) -> Sink { Sink::new(self.data_tx.clone()) }

    /// Number of envelopes sent but not yet picked up.
    pub fn pending(&self) -> usize { self.data_rx.len() }

    /// Picks up pending envelopes and drops anything expired as of `now`.
    pub fn prune_at(&self, now: Instant) { let _ = self.refresh(now); }

    fn refresh(&self, now: Instant) -> MutexGuard<'_, State> {
        let mut state = self.state.lock();
        for (at, envelope) in self.data_rx.try_iter() {
            state.ingest(at, envelope);
        }
        state.prune(now, self.expiration);
        state
    }
}

impl Store for MemoryStore {
    fn value_metrics(&self) -> Vec<ValueMetric> {
        self.refresh(Instant::now())
            .value_metrics
            .values()
            .map(|(_, metric)| metric.clone())
            .collect()
    }

    fn http_start_stops(&self) -> Vec<HttpStartStop> {
        self.refresh(Instant::now())
            .http_start_stops
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, Store};
    use crate::data::{HttpStartStop, ValueMetric};
    use std::time::{Duration, Instant};

    fn memory(value: f64) -> ValueMetric {
        ValueMetric {
            origin: "doppler".to_owned(),
            name: "memory".to_owned(),
            value,
            ..Default::default()
        }
    }

    #[test]
    fn test_store_latest_value_wins() {
        let store = MemoryStore::new(Duration::from_secs(600));
        let sink = store.sink();
        sink.send_value_metric(memory(1.0)).unwrap();
        sink.send_value_metric(memory(2.0)).unwrap();
        assert_eq!(store.pending(), 2);

        let metrics = store.value_metrics();
        assert_eq!(store.pending(), 0);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value, 2.0);

        // Reads are snapshots and don't consume anything.
        assert_eq!(store.value_metrics().len(), 1);
    }

    #[test]
    fn test_store_keeps_every_http_start_stop() {
        let store = MemoryStore::new(Duration::from_secs(600));
        let sink = store.sink();
        let other = sink.clone();
        for _ in 0..3 {
            sink.send_http_start_stop(HttpStartStop::default()).unwrap();
        }
        other.send_http_start_stop(HttpStartStop::default()).unwrap();

        assert_eq!(store.http_start_stops().len(), 4);
        assert!(store.value_metrics().is_empty());
    }

    #[test]
    fn test_store_expiration() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let sink = store.sink();
        sink.send_value_metric(memory(1.0)).unwrap();
        sink.send_http_start_stop(HttpStartStop::default()).unwrap();

        store.prune_at(Instant::now());
        assert_eq!(store.value_metrics().len(), 1);
        assert_eq!(store.http_start_stops().len(), 1);

        store.prune_at(Instant::now() + Duration::from_secs(120));
        assert!(store.value_metrics().is_empty());
        assert!(store.http_start_stops().is_empty());
    }

    #[test]
    fn test_sink_disconnected() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let sink = store.sink();
        drop(store);
        assert!(sink.send_value_metric(memory(1.0)).is_err());
    }
}
