// src/ingest/throttle.rs
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Minimum-spacing gate for outbound calls to a rate-limited API.
/// - First call always passes.
/// - Later calls wait until `min_interval` has elapsed since the last recorded call.
/// - State is updated explicitly via `record_call` once a request has finished,
///   whatever its outcome.
///
/// One instance is shared by every topic; it is not a per-key limiter.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// How long a call issued at `now` still has to wait. Does NOT mutate state.
    pub fn remaining(&self, now: Instant) -> Duration {
        let last = *self.last_call.lock().expect("throttle mutex poisoned");
        match last {
            None => Duration::ZERO,
            Some(ts) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(ts)),
        }
    }

    /// Suspend until the next call is allowed. Returns the time spent waiting.
    pub async fn wait(&self) -> Duration {
        let wait = self.remaining(Instant::now());
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling outbound call");
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Record that an outbound call finished at `now`.
    pub fn record_call(&self, now: Instant) {
        *self.last_call.lock().expect("throttle mutex poisoned") = Some(now);
    }

    pub fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock().expect("throttle mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_passes_immediately() {
        let t = Throttle::new(Duration::from_secs(8));
        assert_eq!(t.wait().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn inside_interval_waits_for_the_remainder() {
        let t = Throttle::new(Duration::from_secs(8));
        t.record_call(Instant::now());
        tokio::time::advance(Duration::from_secs(3)).await;

        let start = Instant::now();
        let waited = t.wait().await;
        assert_eq!(waited, Duration::from_secs(5));
        assert!(Instant::now() - start >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn after_interval_passes() {
        let t = Throttle::new(Duration::from_secs(8));
        t.record_call(Instant::now());
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(t.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn zero_interval_never_waits() {
        let t = Throttle::new(Duration::ZERO);
        t.record_call(Instant::now());
        assert_eq!(t.remaining(Instant::now()), Duration::ZERO);
    }
}
