//! Adaptive rate limiter with a circuit breaker, one instance per remote
//! service.
//!
//! The effective inter-call interval grows with consecutive failures and
//! shrinks with successes, further scaled by the moving-average response
//! time. Queued requests are served in priority order; every wake-up
//! re-applies the *current* interval, so failures that land while requests
//! are queued stretch the later dequeues. Repeated server-side failures open
//! the breaker, which rejects all throttle calls until a reset window
//! elapses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use redpen_core::CheckError;
use tracing::{debug, warn};

/// Limiter policy. All numeric values are defaults, not guaranteed behavior.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Minimum interval between calls when fully healthy.
    pub base_interval: Duration,
    /// Upper clamp for the computed interval.
    pub max_interval: Duration,
    /// Per-failure interval multiplier.
    pub backoff_multiplier: f64,
    /// Per-success interval multiplier, applied up to five times.
    pub recovery_factor: f64,
    /// Consecutive server-side failures that open the breaker.
    pub circuit_threshold: u32,
    /// How long the breaker stays open before resetting.
    pub circuit_reset: Duration,
    /// Requests at or above this priority may skip the queue when the
    /// interval has already elapsed.
    pub bypass_priority: u8,
    /// Ring size for the response-time moving average.
    pub response_history: usize,
    /// Average response time above this scales the interval up.
    pub slow_response: Duration,
    /// Average response time below this scales the interval down.
    pub fast_response: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            recovery_factor: 0.9,
            circuit_threshold: 5,
            circuit_reset: Duration::from_secs(30),
            bypass_priority: 8,
            response_history: 20,
            slow_response: Duration::from_millis(2000),
            fast_response: Duration::from_millis(300),
        }
    }
}

/// Service health as seen by the scheduler and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug)]
struct Ticket {
    priority: u8,
    seq: u64,
}

#[derive(Debug, Default)]
struct LimiterState {
    failure_count: u32,
    success_count: u32,
    circuit_open_since: Option<Instant>,
    last_call: Option<Instant>,
    response_times: VecDeque<Duration>,
    queue: Vec<Ticket>,
    next_seq: u64,
}

/// What a queued caller should do next.
#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Proceed,
    Wait(Duration),
    Reject,
}

/// Adaptive rate limiter / circuit breaker. `&self` methods over an internal
/// mutex so one instance can be shared across sessions.
pub struct AdaptiveLimiter {
    config: LimiterConfig,
    state: Mutex<LimiterState>,
}

impl AdaptiveLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Wait for clearance to issue a call. Resolves once it is this caller's
    /// turn and the current interval has elapsed; fails fast with
    /// [`CheckError::CircuitOpen`] while the breaker is open.
    pub async fn throttle(&self, priority: u8) -> Result<(), CheckError> {
        let seq = {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            self.maybe_reset_circuit(&mut state, now);
            if state.circuit_open_since.is_some() {
                return Err(CheckError::CircuitOpen);
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.queue.push(Ticket { priority, seq });
            seq
        };

        // The future can be dropped mid-wait (the caller timed out or was
        // superseded); the guard pulls the abandoned ticket out of the queue
        // so it cannot block later callers behind a head that never polls.
        let mut guard = QueueGuard { limiter: self, seq, armed: true };
        loop {
            let decision = {
                let mut state = self.state.lock().unwrap();
                self.poll(&mut state, seq, priority, Instant::now())
            };
            match decision {
                Decision::Proceed => {
                    guard.armed = false;
                    return Ok(());
                }
                Decision::Wait(d) => tokio::time::sleep(d).await,
                Decision::Reject => {
                    guard.armed = false;
                    return Err(CheckError::CircuitOpen);
                }
            }
        }
    }

    /// Record a completed call and its observed response time.
    ///
    /// Each success walks `failure_count` back down by one rather than
    /// clearing it, so recovery after a bad stretch is gradual.
    pub fn on_success(&self, response_time: Duration) {
        let mut state = self.state.lock().unwrap();
        state.failure_count = state.failure_count.saturating_sub(1);
        state.success_count += 1;
        state.response_times.push_back(response_time);
        while state.response_times.len() > self.config.response_history {
            state.response_times.pop_front();
        }
    }

    /// Record a failed call. Server-side failures count toward the breaker.
    pub fn on_failure(&self, server_side: bool) {
        let mut state = self.state.lock().unwrap();
        state.failure_count += 1;
        state.success_count = 0;
        if server_side && state.failure_count >= self.config.circuit_threshold {
            if state.circuit_open_since.is_none() {
                warn!(
                    failures = state.failure_count,
                    reset_secs = self.config.circuit_reset.as_secs(),
                    "circuit breaker opened"
                );
            }
            state.circuit_open_since = Some(Instant::now());
        }
    }

    pub fn health(&self) -> Health {
        let state = self.state.lock().unwrap();
        if state.circuit_open_since.is_some() {
            return Health::Unhealthy;
        }
        let degraded_failures = state.failure_count >= self.config.circuit_threshold.div_ceil(2);
        let slow = avg(&state.response_times)
            .map(|a| a >= self.config.slow_response)
            .unwrap_or(false);
        if degraded_failures || slow {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }

    /// The interval currently in force, recomputed from live counters.
    pub fn current_interval(&self) -> Duration {
        let state = self.state.lock().unwrap();
        self.interval(&state)
    }

    fn interval(&self, state: &LimiterState) -> Duration {
        let base = self.config.base_interval.as_secs_f64();
        let backoff = self.config.backoff_multiplier.powi(state.failure_count as i32);
        let recovery = self
            .config
            .recovery_factor
            .powi(state.success_count.min(5) as i32);
        let mut secs = base * backoff * recovery;

        if let Some(avg) = avg(&state.response_times) {
            if avg >= self.config.slow_response {
                secs *= 1.5;
            } else if avg <= self.config.fast_response {
                secs *= 0.75;
            }
        }

        Duration::from_secs_f64(secs)
            .clamp(self.config.base_interval, self.config.max_interval)
    }

    fn maybe_reset_circuit(&self, state: &mut LimiterState, now: Instant) {
        if let Some(opened) = state.circuit_open_since
            && now.duration_since(opened) >= self.config.circuit_reset
        {
            debug!("circuit breaker reset window elapsed, closing");
            state.failure_count = 0;
            state.success_count = 0;
            state.circuit_open_since = None;
        }
    }

    fn poll(&self, state: &mut LimiterState, seq: u64, priority: u8, now: Instant) -> Decision {
        self.maybe_reset_circuit(state, now);
        if state.circuit_open_since.is_some() {
            state.queue.retain(|t| t.seq != seq);
            return Decision::Reject;
        }

        // The interval is recomputed on every poll, so failures recorded
        // while this caller was queued lengthen its remaining wait.
        let interval = self.interval(state);
        let elapsed = match state.last_call {
            Some(last) => now.duration_since(last),
            None => interval,
        };

        if elapsed < interval {
            return Decision::Wait(interval - elapsed);
        }

        let head = state
            .queue
            .iter()
            .max_by_key(|t| (t.priority, std::cmp::Reverse(t.seq)))
            .map(|t| t.seq);
        let bypass = priority >= self.config.bypass_priority;
        if bypass || head == Some(seq) {
            state.queue.retain(|t| t.seq != seq);
            state.last_call = Some(now);
            Decision::Proceed
        } else {
            // Not our turn yet; poll again after the head's slot.
            Decision::Wait(interval.max(Duration::from_millis(10)))
        }
    }
}

/// Removes a queued ticket when its `throttle` future is dropped before
/// being served. Disarmed once `poll` has already taken the ticket out.
struct QueueGuard<'a> {
    limiter: &'a AdaptiveLimiter,
    seq: u64,
    armed: bool,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.limiter.state.lock() {
            state.queue.retain(|t| t.seq != self.seq);
        }
    }
}

fn avg(times: &VecDeque<Duration>) -> Option<Duration> {
    if times.is_empty() {
        return None;
    }
    Some(times.iter().sum::<Duration>() / times.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(config: LimiterConfig) -> AdaptiveLimiter {
        AdaptiveLimiter::new(config)
    }

    fn fast_config() -> LimiterConfig {
        LimiterConfig {
            base_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(500),
            ..LimiterConfig::default()
        }
    }

    #[test]
    fn interval_grows_with_failures() {
        let l = limiter(LimiterConfig::default());
        let healthy = l.current_interval();
        l.on_failure(true);
        l.on_failure(true);
        let degraded = l.current_interval();
        assert!(degraded >= healthy * 4, "two failures should quadruple the interval");
    }

    #[test]
    fn interval_clamped_to_max() {
        let l = limiter(LimiterConfig::default());
        for _ in 0..20 {
            l.on_failure(false);
        }
        assert_eq!(l.current_interval(), LimiterConfig::default().max_interval);
    }

    #[test]
    fn successes_recover_gradually() {
        let l = limiter(LimiterConfig::default());
        l.on_failure(true);
        l.on_failure(true);
        l.on_success(Duration::from_millis(500));
        // One success decrements failure_count by one, not to zero.
        let after_one = l.current_interval();
        l.on_success(Duration::from_millis(500));
        let after_two = l.current_interval();
        assert!(after_one > after_two);
        assert!(after_one > LimiterConfig::default().base_interval);
    }

    #[test]
    fn slow_responses_stretch_interval() {
        let cfg = LimiterConfig::default();
        let l = limiter(cfg.clone());
        // Keep one failure so the scaled interval sits above the base clamp.
        l.on_failure(false);
        let before = l.current_interval();
        for _ in 0..5 {
            l.on_success(Duration::from_secs(5));
        }
        // Successes decrement the failure count; rebuild it to isolate the
        // response-time effect.
        l.on_failure(false);
        l.on_failure(false);
        let l2 = limiter(cfg);
        l2.on_failure(false);
        l2.on_failure(false);
        assert!(l.current_interval() > l2.current_interval());
        let _ = before;
    }

    #[tokio::test]
    async fn circuit_trips_and_rejects_immediately() {
        let l = limiter(fast_config());
        for _ in 0..5 {
            l.on_failure(true);
        }
        assert_eq!(l.health(), Health::Unhealthy);
        let started = Instant::now();
        let res = l.throttle(5).await;
        assert_eq!(res, Err(CheckError::CircuitOpen));
        assert!(started.elapsed() < Duration::from_millis(50), "rejection must be immediate");
    }

    #[tokio::test]
    async fn circuit_closes_after_reset_window() {
        let l = limiter(LimiterConfig {
            circuit_reset: Duration::ZERO,
            ..fast_config()
        });
        for _ in 0..5 {
            l.on_failure(true);
        }
        // Zero reset window: the next throttle observes the elapsed window,
        // resets counters, and proceeds.
        assert!(l.throttle(5).await.is_ok());
        assert_eq!(l.health(), Health::Healthy);
        assert_eq!(l.current_interval(), l.config.base_interval);
    }

    #[test]
    fn client_side_failures_never_open_circuit() {
        let l = limiter(LimiterConfig::default());
        for _ in 0..10 {
            l.on_failure(false);
        }
        assert_ne!(l.health(), Health::Unhealthy);
    }

    #[test]
    fn health_degrades_on_partial_failures() {
        let l = limiter(LimiterConfig::default());
        assert_eq!(l.health(), Health::Healthy);
        l.on_failure(true);
        l.on_failure(true);
        l.on_failure(true);
        assert_eq!(l.health(), Health::Degraded);
    }

    #[test]
    fn queue_serves_highest_priority_first() {
        let l = limiter(fast_config());
        let mut state = l.state.lock().unwrap();
        let now = Instant::now();
        state.queue.push(Ticket { priority: 2, seq: 0 });
        state.queue.push(Ticket { priority: 6, seq: 1 });
        // Low-priority ticket is told to wait while the higher one is queued.
        assert!(matches!(l.poll(&mut state, 0, 2, now), Decision::Wait(_)));
        assert_eq!(l.poll(&mut state, 1, 6, now), Decision::Proceed);
    }

    #[test]
    fn queue_ties_break_by_arrival_order() {
        let l = limiter(fast_config());
        let mut state = l.state.lock().unwrap();
        let now = Instant::now();
        state.queue.push(Ticket { priority: 4, seq: 0 });
        state.queue.push(Ticket { priority: 4, seq: 1 });
        assert!(matches!(l.poll(&mut state, 1, 4, now), Decision::Wait(_)));
        assert_eq!(l.poll(&mut state, 0, 4, now), Decision::Proceed);
    }

    #[test]
    fn bypass_priority_skips_queue_when_interval_elapsed() {
        let l = limiter(fast_config());
        let mut state = l.state.lock().unwrap();
        let now = Instant::now();
        state.queue.push(Ticket { priority: 2, seq: 0 });
        state.queue.push(Ticket { priority: 9, seq: 1 });
        // Priority 9 >= bypass threshold 8: served despite not being polled
        // as queue head first.
        assert_eq!(l.poll(&mut state, 1, 9, now), Decision::Proceed);
    }

    #[test]
    fn dequeue_reapplies_current_interval() {
        let l = limiter(fast_config());
        let mut state = l.state.lock().unwrap();
        let now = Instant::now();
        state.queue.push(Ticket { priority: 5, seq: 0 });
        state.last_call = Some(now);
        let Decision::Wait(before) = l.poll(&mut state, 0, 5, now) else {
            panic!("expected wait right after a call");
        };
        // A burst of failures while queued lengthens the remaining wait.
        state.failure_count = 4;
        let Decision::Wait(after) = l.poll(&mut state, 0, 5, now) else {
            panic!("expected wait");
        };
        assert!(after > before * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_releases_its_queue_slot() {
        let l = limiter(LimiterConfig {
            base_interval: Duration::from_millis(100),
            ..fast_config()
        });
        l.throttle(5).await.unwrap();

        // Enqueue a waiter, park it in its sleep, then drop it.
        let mut waiting = Box::pin(l.throttle(5));
        assert!(futures::poll!(waiting.as_mut()).is_pending());
        drop(waiting);
        assert!(l.state.lock().unwrap().queue.is_empty());

        // A later caller must still be served rather than waiting behind the
        // abandoned ticket.
        tokio::time::timeout(Duration::from_secs(60), l.throttle(5))
            .await
            .expect("dropped waiter must not block the queue")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_waits_out_the_interval() {
        let l = limiter(LimiterConfig {
            base_interval: Duration::from_millis(100),
            ..fast_config()
        });
        l.throttle(5).await.unwrap();
        let started = tokio::time::Instant::now();
        l.throttle(5).await.unwrap();
        // Paused clock auto-advances through the sleep; the second call must
        // have slept at least one interval.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
