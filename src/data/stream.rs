//! Bounded-memory streaming quantile estimation.
//!
//! `Stream` is a targeted quantile summary in the style of Cormode, Korn, Muthukrishnan and
//! Srivastava ("Effective Computation of Biased Quantiles over Data Streams"), itself a refinement
//! of the Greenwald-Khanna summary.  Rather than keeping every observation, it keeps an ordered
//! list of samples, each carrying the minimum rank increment over its predecessor (`width`) and
//! the maximum uncertainty of its rank (`delta`).  Samples are merged together whenever the
//! combined uncertainty still satisfies the error bound of every targeted quantile at that rank.
use serde::Serialize;
use std::mem;

/// Number of raw observations buffered before they are merged into the summary.
const BUFFER_CAPACITY: usize = 500;

/// Error tolerance applied to each of the default targets.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// Quantiles every default stream is targeted at.
///
/// These are part of the exposed contract: summaries are always reported at exactly these
/// quantiles.
pub const QUANTILES: [f64; 3] = [0.50, 0.90, 0.99];

/// A quantile the stream must answer, along with its permitted rank error.
///
/// A query for `quantile` over `n` observations returns a value whose rank is within
/// `(quantile - epsilon) * n` and `(quantile + epsilon) * n`.  `quantile` must lie strictly
/// between 0 and 1, and `epsilon` must be positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub quantile: f64,
    pub epsilon: f64,
}

impl Target {
    pub fn new(quantile: f64, epsilon: f64) -> Target {
        debug_assert!(quantile > 0.0 && quantile < 1.0, "target quantile must be within (0, 1)");
        debug_assert!(epsilon > 0.0, "target epsilon must be positive");
        Target { quantile, epsilon }
    }
}

/// A single entry of the compressed summary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sample {
    /// The observed value.
    pub value: f64,

    /// Rank increment over the preceding sample, i.e. how many observations this sample stands for.
    pub width: f64,

    /// Maximum uncertainty of this sample's rank.
    pub delta: f64,
}

/// A streaming quantile summary.
#[derive(Clone, Debug)]
pub struct Stream {
    targets: Vec<Target>,
    buffer: Vec<f64>,
    sorted: bool,
    summary: Vec<Sample>,
    // Observations merged into `summary`, as a float since it is only ever used in rank math.
    merged: f64,
    count: u64,
    sum: f64,
}

impl Default for Stream {
    fn default() -> Stream { Stream::targeted(&default_targets()) }
}

/// The fixed targets used for every reported summary: `QUANTILES`, each at `DEFAULT_EPSILON`.
pub fn default_targets() -> Vec<Target> {
    QUANTILES
        .iter()
        .map(|q| Target::new(*q, DEFAULT_EPSILON))
        .collect()
}

impl Stream {
    /// Creates an empty stream targeted at the given quantiles.
    pub fn targeted(targets: &[Target]) -> Stream {
        Stream {
            targets: targets.to_vec(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            sorted: true,
            summary: Vec::new(),
            merged: 0.0,
            count: 0,
            sum: 0.0,
        }
    }

    /// Records a single observation.
    pub fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        self.sorted = false;
        self.count += 1;
        self.sum += value;

        if self.buffer.len() >= BUFFER_CAPACITY {
            self.flush();
        }
    }

    /// Estimates the value at the given quantile.
    ///
    /// Returns `0.0` if nothing has been inserted.  Any buffered observations are merged into the
    /// summary first, which is why this needs `&mut self`; the answer itself only depends on what
    /// has been inserted.
    pub fn query(&mut self, quantile: f64) -> f64 {
        if self.summary.is_empty() {
            // Nothing has been merged yet, so the buffer holds every observation and we can
            // answer exactly.
            if self.buffer.is_empty() {
                return 0.0;
            }

            self.sort_buffer();
            let mut i = (self.buffer.len() as f64 * quantile) as usize;
            if i > 0 {
                i -= 1;
            }
            return self.buffer[i.min(self.buffer.len() - 1)];
        }

        self.flush();

        let rank = (quantile * self.merged).ceil();
        let threshold = rank + (self.invariant(rank) / 2.0).ceil();

        let mut previous = self.summary[0];
        let mut r = 0.0;
        for current in &self.summary[1..] {
            r += previous.width;
            if r + current.width + current.delta > threshold {
                return previous.value;
            }
            previous = *current;
        }

        previous.value
    }

    /// Total number of observations inserted.
    pub fn count(&self) -> u64 { self.count }

    /// Exact sum of all observations inserted.
    pub fn sum(&self) -> f64 { self.sum }

    /// Whether nothing has been inserted yet.
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// The current summary, in ascending value order.
    ///
    /// If nothing has been merged yet, every buffered observation is returned as a sample of width
    /// one.  Otherwise the buffer is merged and the summary compressed first.
    pub fn samples(&mut self) -> Vec<Sample> {
        if self.summary.is_empty() {
            self.sort_buffer();
            return self
                .buffer
                .iter()
                .map(|value| Sample {
                    value: *value,
                    width: 1.0,
                    delta: 0.0,
                })
                .collect();
        }

        self.flush();
        self.compress();
        self.summary.clone()
    }

    /// Estimates the sum of all observations from the retained samples.
    ///
    /// This is an approximation: each sample contributes its value once per observation it stands
    /// for, so values folded into a neighbour during compression are counted at the neighbour's
    /// value.  Use `sum` for the exact figure.
    pub fn approximate_sum(&mut self) -> f64 {
        self.samples()
            .iter()
            .map(|sample| sample.value * sample.width)
            .sum()
    }

    fn sort_buffer(&mut self) {
        if !self.sorted {
            self.buffer.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        self.sort_buffer();
        let buffer = mem::take(&mut self.buffer);
        self.merge(&buffer);

        // Hand the allocation back so the next batch doesn't have to grow it again.
        self.buffer = buffer;
        self.buffer.clear();
    }

    /// Merges a sorted run of observations into the summary.
    ///
    /// A value inserted ahead of an existing sample can rank no higher than that sample could, so
    /// it inherits the sample's uncertainty.  A new minimum or maximum has an exact rank.
    fn merge(&mut self, values: &[f64]) {
        let mut i = 0;

        for value in values {
            let mut inserted = false;
            while i < self.summary.len() {
                let current = self.summary[i];
                if current.value > *value {
                    let delta = if i == 0 {
                        0.0
                    } else {
                        current.width + current.delta - 1.0
                    };
                    self.summary.insert(
                        i,
                        Sample {
                            value: *value,
                            width: 1.0,
                            delta,
                        },
                    );
                    i += 1;
                    inserted = true;
                    break;
                }
                i += 1;
            }

            if !inserted {
                self.summary.push(Sample {
                    value: *value,
                    width: 1.0,
                    delta: 0.0,
                });
                i += 1;
            }

            self.merged += 1.0;
        }

        self.compress();
    }

    /// Folds samples into their right-hand neighbour while the error bound allows it.
    ///
    /// The first sample is never folded, so the minimum stays in the summary with an exact rank.
    fn compress(&mut self) {
        if self.summary.len() < 3 {
            return;
        }

        let mut xi = self.summary.len() - 1;
        let mut x = self.summary[xi];
        let mut r = self.merged - 1.0 - x.width;

        let mut i = xi;
        while i > 1 {
            i -= 1;
            let current = self.summary[i];
            if current.width + x.width + x.delta <= self.invariant(r) {
                x.width += current.width;
                self.summary[xi] = x;
                self.summary.remove(i);
                xi -= 1;
            } else {
                x = current;
                xi = i;
            }
            r -= current.width;
        }
    }

    /// The tightest allowed uncertainty at rank `r` across all targets.
    fn invariant(&self, r: f64) -> f64 {
        let n = self.merged;
        self.targets.iter().fold(f64::MAX, |allowed, target| {
            let f = if target.quantile * n <= r {
                2.0 * target.epsilon * r / target.quantile
            } else {
                2.0 * target.epsilon * (n - r) / (1.0 - target.quantile)
            };
            allowed.min(f)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{default_targets, Stream, Target, BUFFER_CAPACITY, DEFAULT_EPSILON, QUANTILES};
    use proptest::prelude::*;

    // Checks that `got` falls within the values ranked `(q - eps) * n` and `(q + eps) * n` of the
    // sorted input.  Queries round the target rank up, so one rank of slack is allowed either side.
    fn within_rank_bounds(sorted: &[f64], quantile: f64, epsilon: f64, got: f64) -> bool {
        let n = sorted.len() as f64;
        let lower = (((quantile - epsilon) * n) as usize).saturating_sub(1).max(1);
        let upper = (((quantile + epsilon) * n).ceil() as usize + 1).min(sorted.len());
        sorted[lower - 1] <= got && got <= sorted[upper - 1]
    }

    // Feeds `values` through a default stream, then checks every reported quantile against the
    // rank bounds and the summary against the GK space bound plus one unmerged buffer.
    fn assert_accurate_and_bounded(values: &[f64]) {
        let mut stream = Stream::default();
        for v in values {
            stream.insert(*v);
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        for q in &QUANTILES {
            let got = stream.query(*q);
            assert!(
                within_rank_bounds(&sorted, *q, DEFAULT_EPSILON, got),
                "q={} got {} outside of rank bounds",
                q,
                got
            );
        }

        let n = values.len() as f64;
        let limit = 2.0 / DEFAULT_EPSILON * (DEFAULT_EPSILON * n).log2() + BUFFER_CAPACITY as f64;
        let samples = stream.samples();
        assert!(
            (samples.len() as f64) < limit,
            "summary grew to {} samples, limit {}",
            samples.len(),
            limit
        );
        assert_eq!(samples.iter().map(|s| s.width).sum::<f64>(), n);
    }

    #[test]
    fn test_stream_empty() {
        let mut stream = Stream::default();
        assert!(stream.is_empty());
        assert_eq!(stream.count(), 0);
        assert_eq!(stream.sum(), 0.0);
        for q in &QUANTILES {
            assert_eq!(stream.query(*q), 0.0);
        }
        assert!(stream.samples().is_empty());
        assert_eq!(stream.approximate_sum(), 0.0);
    }

    #[test]
    fn test_stream_small_sample_exact() {
        let mut stream = Stream::default();
        for v in (1..=10).rev() {
            stream.insert(v as f64);
        }

        assert_eq!(stream.count(), 10);
        assert_eq!(stream.sum(), 55.0);
        assert_eq!(stream.query(0.50), 5.0);
        assert_eq!(stream.query(0.90), 9.0);
        assert_eq!(stream.query(0.99), 9.0);
        assert_eq!(stream.query(0.01), 1.0);

        let samples = stream.samples();
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[9].value, 10.0);
        assert_eq!(stream.approximate_sum(), 55.0);
    }

    #[test]
    fn test_stream_single_value() {
        let mut stream = Stream::default();
        stream.insert(42.0);
        for q in &QUANTILES {
            assert_eq!(stream.query(*q), 42.0);
        }
    }

    #[test]
    fn test_stream_count_survives_compression() {
        let mut stream = Stream::default();
        for i in 0..10_000u64 {
            stream.insert((i % 977) as f64);
        }

        assert_eq!(stream.count(), 10_000);
        let samples = stream.samples();
        assert!(samples.len() < 5_000, "summary was not compressed: {} samples", samples.len());

        let covered: f64 = samples.iter().map(|s| s.width).sum();
        assert_eq!(covered, 10_000.0);
        assert_eq!(stream.count(), 10_000);
    }

    #[test]
    fn test_stream_large_permutation_accuracy() {
        // 100_003 is prime, so striding by 7919 visits every value in 0..100_003 exactly once.
        const N: u64 = 100_003;
        let mut stream = Stream::default();
        for i in 0..N {
            stream.insert(((i * 7919) % N) as f64);
        }

        let sorted: Vec<f64> = (0..N).map(|v| v as f64).collect();
        for q in &QUANTILES {
            let got = stream.query(*q);
            assert!(
                within_rank_bounds(&sorted, *q, DEFAULT_EPSILON, got),
                "q={} got {} outside of rank bounds",
                q,
                got
            );
        }

        assert_eq!(stream.sum(), sorted.iter().sum::<f64>());
        let approximate = stream.approximate_sum();
        let exact = stream.sum();
        assert!((approximate - exact).abs() / exact < 0.10);
    }

    #[test]
    fn test_stream_ascending_input_stays_bounded() {
        let values: Vec<f64> = (0..100_000).map(|v| v as f64).collect();
        assert_accurate_and_bounded(&values);
    }

    #[test]
    fn test_stream_descending_input_stays_bounded() {
        let values: Vec<f64> = (0..100_000).rev().map(|v| v as f64).collect();
        assert_accurate_and_bounded(&values);

        let values: Vec<f64> = (0..1_000_000).rev().map(|v| v as f64).collect();
        assert_accurate_and_bounded(&values);
    }

    #[test]
    fn test_stream_repeated_values_stay_bounded() {
        let values: Vec<f64> = (0..100_000u64).map(|i| (i % 977) as f64).collect();
        assert_accurate_and_bounded(&values);

        // Runs of duplicates, arriving in descending order.
        let values: Vec<f64> = (0..100_000u64).rev().map(|i| (i / 50) as f64).collect();
        assert_accurate_and_bounded(&values);

        let values: Vec<f64> = (0..100_000u64).map(|i| (i % 5) as f64).collect();
        assert_accurate_and_bounded(&values);
    }

    #[test]
    fn test_stream_queries_are_repeatable() {
        let mut a = Stream::default();
        let mut b = Stream::default();
        for i in 0..2_500u64 {
            let v = ((i * 31) % 1_013) as f64;
            a.insert(v);
            b.insert(v);
        }

        for q in &QUANTILES {
            let first = a.query(*q);
            assert_eq!(first, a.query(*q));
            assert_eq!(first, b.query(*q));
        }
    }

    #[test]
    fn test_stream_custom_targets() {
        let mut stream = Stream::targeted(&[Target::new(0.25, 0.05)]);
        for i in 1..=1_000 {
            stream.insert(i as f64);
        }
        let sorted: Vec<f64> = (1..=1_000).map(|v| v as f64).collect();
        assert!(within_rank_bounds(&sorted, 0.25, 0.05, stream.query(0.25)));
    }

    #[test]
    fn test_default_targets() {
        let targets = default_targets();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0], Target::new(0.50, 0.01));
        assert_eq!(targets[2].quantile, 0.99);
    }

    proptest! {
        #[test]
        fn test_stream_rank_error_bound(
            mut values in prop::collection::vec(0u32..5_000, 1..3_000),
            order in 0u8..3,
        ) {
            match order {
                1 => values.sort_unstable(),
                2 => values.sort_unstable_by(|a, b| b.cmp(a)),
                _ => {}
            }

            let mut stream = Stream::default();
            for v in &values {
                stream.insert(*v as f64);
            }

            let mut sorted: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            sorted.sort_by(f64::total_cmp);

            for q in &QUANTILES {
                let got = stream.query(*q);
                prop_assert!(within_rank_bounds(&sorted, *q, DEFAULT_EPSILON, got), "q={} got {}", q, got);
            }
        }

        #[test]
        fn test_stream_count_matches_inserts(values in prop::collection::vec(any::<i32>(), 0..2_000)) {
            let mut stream = Stream::default();
            for v in &values {
                stream.insert(*v as f64);
            }
            let _ = stream.query(0.5);
            prop_assert_eq!(stream.count(), values.len() as u64);
        }
    }
}
