use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BreakerConfig;

/// Health classification of the guarded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failure threshold reached, calls fail fast for the open window.
    Open,
    /// Open window elapsed, probe traffic admitted until the verdict.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of the breaker for logs and admin endpoints.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    /// Remaining open time, if currently open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Three-state circuit breaker guarding a single upstream.
///
/// - Counts failures across every caller; one instance per client
/// - Opens once `failure_threshold` consecutive-window failures accumulate
/// - After `open_timeout` admits probes, closing again on
///   `recovery_threshold` successes
///
/// Half-open probes are tolerant: a single failed probe does not slam the
/// breaker shut again, the failure count has to climb back to the threshold.
/// Local model runners routinely drop one request while reloading weights,
/// and an eager reopen turns each of those into another full open window.
pub struct CircuitBreaker {
    cfg: BreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: BreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Whether calls must currently fail fast.
    ///
    /// In the open state an expired window flips the breaker to half-open,
    /// zeroes both counters and admits the caller as a probe. The check and
    /// the transition are one critical section, so exactly one snapshot of
    /// the transition is observed regardless of caller count.
    pub fn is_open(&self) -> bool {
        let mut st = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if st.state != CircuitState::Open {
            return false;
        }
        let elapsed = st
            .last_failure
            .map(|at| at.elapsed())
            .unwrap_or(self.cfg.open_timeout);
        if elapsed < self.cfg.open_timeout {
            return true;
        }
        st.state = CircuitState::HalfOpen;
        st.failure_count = 0;
        st.success_count = 0;
        info!(state = %CircuitState::HalfOpen, "circuit breaker admitting probe traffic");
        false
    }

    /// Record a successful attempt. Always clears the failure count; in the
    /// half-open state it also advances recovery, closing the breaker once
    /// the recovery threshold is met.
    pub fn record_success(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.failure_count = 0;
            if st.state == CircuitState::HalfOpen {
                st.success_count = st.success_count.saturating_add(1);
                if st.success_count >= self.cfg.recovery_threshold {
                    st.state = CircuitState::Closed;
                    st.success_count = 0;
                    info!(state = %CircuitState::Closed, "circuit breaker recovered");
                }
            }
        }
    }

    /// Record a failed attempt. Reaching the failure threshold opens the
    /// breaker from either the closed or the half-open state and restarts
    /// the open window from now.
    pub fn record_failure(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.failure_count = st.failure_count.saturating_add(1);
            st.last_failure = Some(Instant::now());
            if st.failure_count >= self.cfg.failure_threshold && st.state != CircuitState::Open {
                let from = st.state;
                st.state = CircuitState::Open;
                st.success_count = 0;
                warn!(
                    failures = st.failure_count,
                    from = %from,
                    state = %CircuitState::Open,
                    "circuit breaker opened"
                );
            }
        }
    }

    /// Force the breaker back to closed with clean counters. Admin and test
    /// tooling only; production traffic recovers through the half-open path.
    pub fn reset(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.state = CircuitState::Closed;
            st.failure_count = 0;
            st.success_count = 0;
            st.last_failure = None;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
            .lock()
            .map(|st| st.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Remaining open time, if currently open.
    pub fn open_remaining(&self) -> Option<Duration> {
        let st = self.state.lock().ok()?;
        if st.state != CircuitState::Open {
            return None;
        }
        let elapsed = st.last_failure.map(|at| at.elapsed())?;
        self.cfg.open_timeout.checked_sub(elapsed)
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        if let Ok(st) = self.state.lock() {
            let open_remaining = match st.state {
                CircuitState::Open => st
                    .last_failure
                    .and_then(|at| self.cfg.open_timeout.checked_sub(at.elapsed())),
                _ => None,
            };
            BreakerSnapshot {
                state: st.state,
                failure_count: st.failure_count,
                success_count: st.success_count,
                failure_threshold: self.cfg.failure_threshold,
                open_remaining,
            }
        } else {
            BreakerSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                failure_threshold: self.cfg.failure_threshold,
                open_remaining: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fast_breaker(threshold: u32, window_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            BreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_open_timeout(Duration::from_millis(window_ms))
                .with_recovery_threshold(2),
        )
    }

    #[test]
    fn test_initial_state_is_closed() {
        let cb = CircuitBreaker::new(BreakerConfig::default());
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.open_remaining.is_none());
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let cb = fast_breaker(5, 50);
        for _ in 0..4 {
            cb.record_failure();
            assert!(!cb.is_open());
        }
        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.open_remaining().is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = fast_breaker(3, 50);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.snapshot().failure_count, 0);

        // The interrupted streak must not count toward opening.
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn test_half_open_after_window() {
        let cb = fast_breaker(2, 40);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        thread::sleep(Duration::from_millis(50));

        // First check after the window admits the probe and transitions.
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[test]
    fn test_recovery_needs_two_successes() {
        let cb = fast_breaker(2, 30);
        cb.record_failure();
        cb.record_failure();
        thread::sleep(Duration::from_millis(40));
        assert!(!cb.is_open());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_tolerates_single_failure() {
        let cb = fast_breaker(3, 30);
        for _ in 0..3 {
            cb.record_failure();
        }
        thread::sleep(Duration::from_millis(40));
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // One failed probe stays half-open; the count must climb back to
        // the threshold before the breaker reopens.
        cb.record_failure();
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn test_reopen_restarts_window() {
        let cb = fast_breaker(1, 40);
        cb.record_failure();
        assert!(cb.is_open());
        thread::sleep(Duration::from_millis(50));
        assert!(!cb.is_open());

        cb.record_failure();
        assert!(cb.is_open());
        // Window restarted; well before 40ms it must still be open.
        thread::sleep(Duration::from_millis(10));
        assert!(cb.is_open());
    }

    #[test]
    fn test_success_in_half_open_interleaved_with_failures() {
        let cb = fast_breaker(3, 30);
        for _ in 0..3 {
            cb.record_failure();
        }
        thread::sleep(Duration::from_millis(40));
        assert!(!cb.is_open());

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        // Success wiped the failure streak and counted toward recovery.
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 1);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_reset_clears_everything() {
        let cb = fast_breaker(1, 60_000);
        cb.record_failure();
        assert!(cb.is_open());

        cb.reset();
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn test_snapshot_reports_configuration() {
        let cb = fast_breaker(5, 50);
        cb.record_failure();
        cb.record_failure();

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 2);
        assert_eq!(snapshot.failure_threshold, 5);
        assert!(snapshot.open_remaining.is_none());
    }

    #[test]
    fn test_thread_safe_failure_counting() {
        use std::sync::Arc;

        let cb = Arc::new(fast_breaker(1000, 50));
        let mut handles = vec![];
        for _ in 0..10 {
            let cb = Arc::clone(&cb);
            handles.push(thread::spawn(move || {
                for _ in 0..5 {
                    cb.record_failure();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cb.snapshot().failure_count, 50);
        assert!(!cb.is_open());
    }

    #[test]
    fn test_single_transition_under_concurrent_checks() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let cb = Arc::new(fast_breaker(1, 20));
        cb.record_failure();
        assert!(cb.is_open());
        thread::sleep(Duration::from_millis(30));

        // Many racing checks; all must agree the breaker is no longer open
        // and the state must settle on half-open exactly once.
        let admitted = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let cb = Arc::clone(&cb);
            let admitted = Arc::clone(&admitted);
            handles.push(thread::spawn(move || {
                if !cb.is_open() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 8);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }
}
