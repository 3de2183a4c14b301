use crate::data::{Envelope, HttpStartStop, ValueMetric};
use crossbeam_channel::Sender;
use std::time::Instant;
use thiserror::Error;

/// An envelope along with the time it was handed to a `Sink`.
pub(crate) type Arrival = (Instant, Envelope);

/// Errors while sending envelopes.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The store this sink feeds has been dropped.
    #[error("store is no longer receiving envelopes")]
    Disconnected,
}

/// Handle for feeding firehose envelopes into a `MemoryStore`.
///
/// `Sink` is cloneable, so every firehose consumer can hold its own.  Sending never blocks; the
/// store picks up everything sent so far whenever it is read.
#[derive(Clone)]
pub struct Sink {
    data_tx: Sender<Arrival>,
}

impl Sink {
    pub(crate) fn new(data_tx: Sender<Arrival>) -> Sink { Sink { data_tx } }

    /// Sends an envelope to the store.
    pub fn send(&self, envelope: Envelope) -> Result<(), SinkError> {
        self.data_tx
            .send((Instant::now(), envelope))
            .map_err(|_| SinkError::Disconnected)
    }

    /// Sends a value metric to the store.
    pub fn send_value_metric(&self, metric: ValueMetric) -> Result<(), SinkError> { self.send(metric.into()) }

    /// Sends an HTTP start-stop record to the store.
    pub fn send_http_start_stop(&self, record: HttpStartStop) -> Result<(), SinkError> { self.send(record.into()) }
}
