use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Shared gate deciding whether a worker may issue one more call.
///
/// One `Run` is created per benchmark and referenced by every worker.
/// [`more`](Run::more) returns `true` at most `max_requests` times overall,
/// stops returning `true` once the deadline elapses or [`stop`](Run::stop)
/// has been called, and paces grants at `rps` when a rate is set.
pub struct Run {
    stopped: AtomicBool,
    remaining: Option<AtomicI64>,
    deadline: Option<Instant>,
    bucket: Option<DefaultDirectRateLimiter>,
}

impl Run {
    /// Zero values leave the corresponding bound unset.
    pub fn new(max_requests: u64, rps: u32, max_duration: Duration) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            remaining: (max_requests > 0).then(|| AtomicI64::new(max_requests as i64)),
            deadline: (max_duration > Duration::ZERO).then(|| Instant::now() + max_duration),
            bucket: NonZeroU32::new(rps).map(|rps| {
                RateLimiter::direct(Quota::per_second(rps).allow_burst(NonZeroU32::MIN))
            }),
        }
    }

    /// Grants one more call, blocking on the rate limiter when one is
    /// configured. Blocking is bounded by the run deadline. Exhaustion is
    /// `false`; this never errors.
    pub async fn more(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        if let Some(remaining) = &self.remaining {
            if remaining.load(Ordering::Relaxed) <= 0 {
                return false;
            }
        }

        if let Some(bucket) = &self.bucket {
            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = bucket.until_ready() => {}
                        _ = tokio::time::sleep_until(deadline) => return false,
                    }
                }
                None => bucket.until_ready().await,
            }
        }

        match &self.remaining {
            // The decrement is the gate: whichever callers observe a
            // positive previous value hold the last grants.
            Some(remaining) => remaining.fetch_sub(1, Ordering::Relaxed) > 0,
            None => true,
        }
    }

    /// Stops the run. Idempotent and safe to call from any worker; every
    /// subsequent [`more`](Run::more) returns `false`.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}
