use crate::call::CallError;
use crate::constants::QUANTILES;
use crate::report::ErrorSummary;
use crate::sink::StatsSink;
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// Latencies are tracked in microseconds between 1µs and 60s at three
// significant figures, which keeps quantile recovery well inside 1%
// relative error over that range.
const LATENCY_MIN_MICROS: u64 = 1;
const LATENCY_MAX_MICROS: u64 = 60_000_000;
const LATENCY_SIGFIGS: u8 = 3;

/// Samples collected by a single worker.
///
/// A state is owned and mutated by exactly one worker for the duration of
/// the run; [`merge`](BenchmarkState::merge) consumes the source, so a
/// merged state cannot be written to again.
pub struct BenchmarkState {
    total_requests: u64,
    latency: Histogram<u64>,
    errors: BTreeMap<String, u64>,
    stream_sent: u64,
    stream_received: u64,
    sink: Arc<dyn StatsSink>,
}

impl BenchmarkState {
    pub fn new(sink: Arc<dyn StatsSink>) -> Self {
        Self {
            total_requests: 0,
            latency: Histogram::new_with_bounds(
                LATENCY_MIN_MICROS,
                LATENCY_MAX_MICROS,
                LATENCY_SIGFIGS,
            )
            .expect("static histogram bounds"),
            errors: BTreeMap::new(),
            stream_sent: 0,
            stream_received: 0,
            sink,
        }
    }

    pub fn record_latency(&mut self, latency: Duration) {
        self.total_requests += 1;
        let micros = (latency.as_micros() as u64).max(LATENCY_MIN_MICROS);
        self.latency.saturating_record(micros);

        self.sink.timing("latency", latency);
        self.sink.incr("success");
        #[cfg(feature = "metrics")]
        {
            metrics::histogram!("volley_call_latency").record(latency.as_secs_f64());
            metrics::counter!("volley_call_success").increment(1);
        }
    }

    pub fn record_error(&mut self, err: &CallError) {
        self.total_requests += 1;
        let category = err.category();
        *self.errors.entry(category).or_insert(0) += 1;

        self.sink.incr("error");
        #[cfg(feature = "metrics")]
        metrics::counter!("volley_call_error").increment(1);
    }

    pub fn record_stream_messages(&mut self, sent: u64, received: u64) {
        self.stream_sent += sent;
        self.stream_received += received;
    }

    /// Folds another worker's samples into this one. Associative and
    /// commutative over the histogram, error map, counters, and total.
    pub fn merge(&mut self, other: BenchmarkState) {
        self.total_requests += other.total_requests;
        self.latency
            .add(&other.latency)
            .expect("histograms share bounds");
        for (category, count) in other.errors {
            *self.errors.entry(category).or_insert(0) += count;
        }
        self.stream_sent += other.stream_sent;
        self.stream_received += other.stream_received;
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }

    pub fn stream_messages(&self) -> (u64, u64) {
        (self.stream_sent, self.stream_received)
    }

    /// Latency at each reported quantile, in fixed quantile order.
    pub fn latencies(&self) -> Vec<(f64, Duration)> {
        QUANTILES
            .iter()
            .map(|&q| {
                let micros = self.latency.value_at_quantile(q);
                (q, Duration::from_micros(micros))
            })
            .collect()
    }

    /// `None` when the run saw no errors, so the report omits the block
    /// entirely.
    pub fn error_summary(&self) -> Option<ErrorSummary> {
        let total_errors = self.total_errors();
        if total_errors == 0 {
            return None;
        }
        let error_rate = if self.total_requests > 0 {
            total_errors as f64 / self.total_requests as f64
        } else {
            0.0
        };
        Some(ErrorSummary {
            total_errors,
            error_rate,
            errors_count: self.errors.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NoopSink;

    fn new_state() -> BenchmarkState {
        BenchmarkState::new(Arc::new(NoopSink))
    }

    #[test]
    fn quantiles_recover_recorded_latencies() {
        let mut state = new_state();
        for ms in 1..=100u64 {
            state.record_latency(Duration::from_millis(ms));
        }

        let latencies = state.latencies();
        assert_eq!(latencies.len(), QUANTILES.len());

        let p50 = latencies[0].1.as_secs_f64();
        assert!((p50 - 0.050).abs() / 0.050 < 0.01, "p50 was {p50}");

        let p100 = latencies[6].1;
        assert!(p100 >= Duration::from_millis(99) && p100 <= Duration::from_millis(101));
    }

    #[test]
    fn errors_count_toward_total_requests() {
        let mut state = new_state();
        state.record_latency(Duration::from_millis(1));
        state.record_error(&CallError::Timeout);
        state.record_error(&CallError::Timeout);
        state.record_error(&CallError::Other("boom".to_string()));

        assert_eq!(state.total_requests(), 4);
        assert_eq!(state.total_errors(), 3);

        let summary = state.error_summary().unwrap();
        assert_eq!(summary.total_errors, 3);
        assert!((summary.error_rate - 0.75).abs() < 1e-9);
        assert_eq!(summary.errors_count["timeout"], 2);
        assert_eq!(summary.errors_count["boom"], 1);
    }

    #[test]
    fn no_errors_means_no_summary() {
        let mut state = new_state();
        state.record_latency(Duration::from_millis(1));
        assert!(state.error_summary().is_none());
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        fn seed(latency_ms: u64, errors: u64) -> BenchmarkState {
            let mut state = new_state();
            state.record_latency(Duration::from_millis(latency_ms));
            for _ in 0..errors {
                state.record_error(&CallError::Timeout);
            }
            state.record_stream_messages(latency_ms, errors);
            state
        }

        fn snapshot(state: &BenchmarkState) -> (u64, u64, Vec<(f64, Duration)>, (u64, u64)) {
            (
                state.total_requests(),
                state.total_errors(),
                state.latencies(),
                state.stream_messages(),
            )
        }

        // (a ⊎ b) ⊎ c
        let mut left = seed(10, 1);
        left.merge(seed(20, 2));
        left.merge(seed(30, 0));

        // c ⊎ (b ⊎ a)
        let mut right = seed(30, 0);
        let mut inner = seed(20, 2);
        inner.merge(seed(10, 1));
        right.merge(inner);

        assert_eq!(snapshot(&left), snapshot(&right));
        assert_eq!(left.total_requests(), 6);
        assert_eq!(left.stream_messages(), (60, 3));
    }

    #[test]
    fn sink_sees_every_sample_and_error() {
        let sink = Arc::new(crate::sink::tests::RecordingSink::default());
        let mut state = BenchmarkState::new(sink.clone());
        state.record_latency(Duration::from_millis(5));
        state.record_error(&CallError::Timeout);

        let events = sink.events.lock().unwrap();
        assert_eq!(*events, vec!["latency", "success", "error"]);
    }
}
