use crate::duration::{parse_duration, ParseDurationError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("duration cannot be negative")]
    NegativeDuration,

    #[error("max requests cannot be negative")]
    NegativeMaxRequests,

    #[error(transparent)]
    InvalidDuration(#[from] ParseDurationError),
}

/// Configuration for one benchmark run.
///
/// A zero `max_requests` or `max_duration` means unbounded; when both are
/// zero the run is disabled and the engine returns without doing anything.
#[derive(Debug, Clone)]
pub struct BenchmarkOptions {
    /// Maximum number of calls to issue across all workers. Negative values
    /// are rejected by [`validate`](Self::validate).
    pub max_requests: i64,
    /// Wall-clock bound for the run.
    pub max_duration: Duration,
    /// Target request rate across all workers. Zero leaves the rate
    /// uncapped.
    pub rps: u32,
    /// Number of transports to open. Zero picks `2 × cpus`.
    pub connections: usize,
    /// In-flight calls per transport.
    pub concurrency: usize,
    /// Worker-thread budget. Zero observes the host parallelism.
    pub num_cpus: usize,
    /// Calls issued per transport before measurement starts.
    pub warmup_requests: usize,
    /// Dual-emit stats under a per-peer prefix.
    pub per_peer_stats: bool,
    /// Statsd endpoint; `None` or empty disables publishing.
    pub statsd_host_port: Option<String>,
    /// Report format: `""`/`"text"` or `"json"`. Anything else warns and
    /// falls back to text.
    pub format: String,
    /// Draw a progress bar to stderr while the run executes.
    pub progress_bar: bool,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            max_requests: 0,
            max_duration: Duration::ZERO,
            rps: 0,
            connections: 0,
            concurrency: 1,
            num_cpus: 0,
            warmup_requests: 10,
            per_peer_stats: false,
            statsd_host_port: None,
            format: String::new(),
            progress_bar: false,
        }
    }
}

impl BenchmarkOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_requests < 0 {
            return Err(OptionsError::NegativeMaxRequests);
        }
        Ok(())
    }

    /// Benchmarking is off by default; at least one bound has to be set for
    /// a run to start.
    pub fn enabled(&self) -> bool {
        self.max_duration != Duration::ZERO || self.max_requests != 0
    }

    /// The request budget after applying the RPS × duration cap. The cap
    /// only ever tightens the configured bound, which keeps progress
    /// reporting accurate when the rate limiter is what ends the run.
    pub fn effective_max_requests(&self) -> u64 {
        let mut max = self.max_requests.max(0) as u64;
        if self.rps > 0 && self.max_duration > Duration::ZERO {
            let cap = (f64::from(self.rps) * self.max_duration.as_secs_f64()) as u64;
            if cap < max || max == 0 {
                max = cap;
            }
        }
        max
    }

    pub fn num_connections(&self, cpus: usize) -> usize {
        if self.connections > 0 {
            return self.connections;
        }
        cpus * 2
    }

    /// The worker-thread budget reported for this run: the configured value
    /// if set, otherwise the host parallelism.
    pub fn resolve_cpus(&self) -> usize {
        if self.num_cpus > 0 {
            return self.num_cpus;
        }
        std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
    }
}

/// Parses a max-duration flag value. `std::time::Duration` is unsigned, so
/// a leading sign is rejected here, at the option boundary.
pub fn parse_max_duration(input: &str) -> Result<Duration, OptionsError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(OptionsError::NegativeDuration);
    }
    Ok(parse_duration(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_max_requests() {
        let opts = BenchmarkOptions {
            max_requests: -1,
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert_eq!(err.to_string(), "max requests cannot be negative");
    }

    #[test]
    fn rejects_negative_duration_input() {
        let err = parse_max_duration("-1s").unwrap_err();
        assert_eq!(err.to_string(), "duration cannot be negative");
        assert_eq!(parse_max_duration("1s").unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn disabled_unless_a_bound_is_set() {
        let opts = BenchmarkOptions::default();
        assert!(!opts.enabled());
        assert!(BenchmarkOptions {
            max_requests: 1,
            ..Default::default()
        }
        .enabled());
        assert!(BenchmarkOptions {
            max_duration: Duration::from_secs(1),
            ..Default::default()
        }
        .enabled());
    }

    #[test]
    fn rps_times_duration_caps_the_budget() {
        let mut opts = BenchmarkOptions {
            rps: 120,
            max_duration: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(opts.effective_max_requests(), 60);

        opts.max_requests = 100;
        assert_eq!(opts.effective_max_requests(), 60);

        opts.max_requests = 30;
        assert_eq!(opts.effective_max_requests(), 30);

        opts.rps = 0;
        assert_eq!(opts.effective_max_requests(), 30);
    }

    #[test]
    fn connection_count_defaults_to_twice_cpus() {
        let opts = BenchmarkOptions::default();
        assert_eq!(opts.num_connections(4), 8);

        let opts = BenchmarkOptions {
            connections: 3,
            ..Default::default()
        };
        assert_eq!(opts.num_connections(4), 3);
    }
}
