//! Progress display for interactive runs. The bar tracks either the
//! request budget or the run deadline, with requests taking precedence
//! when both bounds apply.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use volley_core::format_duration;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Requests,
    Duration,
}

/// What the bar counts and where it ends. `total` is a request count for
/// [`ProgressUnit::Requests`] and milliseconds for
/// [`ProgressUnit::Duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    pub unit: ProgressUnit,
    pub total: u64,
}

/// Picks the bar for a run. `max_requests` is the effective budget after
/// the RPS × duration cap, so a rate-limited timed run still gets a
/// request-count bar.
pub fn plan(max_requests: u64, max_duration: Duration) -> Option<ProgressPlan> {
    if max_requests > 0 {
        return Some(ProgressPlan {
            unit: ProgressUnit::Requests,
            total: max_requests,
        });
    }
    if max_duration > Duration::ZERO {
        return Some(ProgressPlan {
            unit: ProgressUnit::Duration,
            total: max_duration.as_millis() as u64,
        });
    }
    None
}

pub(crate) struct ProgressBar {
    plan: ProgressPlan,
    done: AtomicU64,
    started: Instant,
}

impl ProgressBar {
    pub fn new(plan: ProgressPlan) -> Self {
        Self {
            plan,
            done: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn inc(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    fn line(&self) -> String {
        match self.plan.unit {
            ProgressUnit::Requests => {
                let done = self.done.load(Ordering::Relaxed).min(self.plan.total);
                let percent = done as f64 / self.plan.total as f64 * 100.0;
                format!("{done} / {}  {percent:.2}%", self.plan.total)
            }
            ProgressUnit::Duration => {
                let elapsed = (self.started.elapsed().as_millis() as u64).min(self.plan.total);
                format!(
                    "{} / {}",
                    format_duration(Duration::from_millis(elapsed)),
                    format_duration(Duration::from_millis(self.plan.total))
                )
            }
        }
    }

    fn redraw(&self) {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{}", self.line());
        let _ = stderr.flush();
    }

    /// Draws the last state of the bar and releases the line.
    pub fn finish(&self) {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\r{}", self.line());
    }
}

pub(crate) async fn redraw_loop(bar: Arc<ProgressBar>) {
    let mut interval = tokio::time::interval(REDRAW_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        bar.redraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_core::BenchmarkOptions;

    #[test]
    fn bounded_requests_take_precedence() {
        let plan = plan(100, Duration::from_secs(100)).unwrap();
        assert_eq!(plan.unit, ProgressUnit::Requests);
        assert_eq!(plan.total, 100);
    }

    #[test]
    fn rps_capped_run_counts_requests() {
        let opts = BenchmarkOptions {
            rps: 120,
            max_duration: Duration::from_millis(500),
            ..Default::default()
        };
        let plan = plan(opts.effective_max_requests(), opts.max_duration).unwrap();
        assert_eq!(plan.unit, ProgressUnit::Requests);
        assert_eq!(plan.total, 60);
    }

    #[test]
    fn unbounded_requests_fall_back_to_duration() {
        let plan = plan(0, Duration::from_millis(500)).unwrap();
        assert_eq!(plan.unit, ProgressUnit::Duration);
        assert_eq!(plan.total, 500);
    }

    #[test]
    fn no_bounds_means_no_bar() {
        assert!(plan(0, Duration::ZERO).is_none());
    }

    #[test]
    fn request_line_shows_completion() {
        let bar = ProgressBar::new(ProgressPlan {
            unit: ProgressUnit::Requests,
            total: 100,
        });
        for _ in 0..50 {
            bar.inc();
        }
        assert_eq!(bar.line(), "50 / 100  50.00%");

        for _ in 0..100 {
            bar.inc();
        }
        assert_eq!(bar.line(), "100 / 100  100.00%");
    }
}
