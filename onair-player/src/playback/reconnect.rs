//! Reconnection scheduler
//!
//! Decides whether, when and how the engine retries a dropped stream:
//! incremental retries with exponential backoff, escalation to a full player
//! restart after repeated consecutive errors, and (optionally) a terminal
//! give-up after a hard maximum of attempts.
//!
//! Like the buffer health monitor this is a pure policy object. The engine
//! owns the timers and reports back what actually happened through
//! `record_attempt`, `record_success` and `reset_after_restart`.

use crate::config::ReconnectPolicy;
use std::time::Duration;
use tokio::time::Instant;

/// Retry bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Position in the current backoff cycle
    pub attempt_count: u32,
    /// Failures since the last sustained playback
    pub consecutive_error_count: u32,
    /// Attempts (incremental or restart) since the last success; compared
    /// against `give_up_after`. Survives restarts.
    pub total_attempts: u32,
    /// Backoff cycle exhausted; delay stays at `max_delay` until success
    pub pinned: bool,
    pub last_attempt: Option<Instant>,
    pub last_successful_reconnect: Option<Instant>,
}

/// Engine facts that can veto scheduling
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectGuards {
    pub user_stopped: bool,
    pub paused_for_foreground_content: bool,
    /// Paused by the user, an interruption or headphone removal
    pub deliberately_paused: bool,
    /// Terminal error surfaced; waiting for an explicit play
    pub exhausted: bool,
    /// Timer pending, probe running or attempt being issued
    pub reconnect_in_flight: bool,
    pub restart_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UserStopped,
    ForegroundContent,
    Paused,
    Exhausted,
    RestartInFlight,
    AlreadyInFlight,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::UserStopped => "user stopped playback",
            SkipReason::ForegroundContent => "paused for foreground content",
            SkipReason::Paused => "playback deliberately paused",
            SkipReason::Exhausted => "retries exhausted",
            SkipReason::RestartInFlight => "restart already in progress",
            SkipReason::AlreadyInFlight => "reconnect already in flight",
        };
        f.write_str(s)
    }
}

/// Scheduler verdict for one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    Skip(SkipReason),
    /// Incremental retry after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Tear down and rebuild the player
    Restart { consecutive_errors: u32 },
    /// Surface a terminal error and stop retrying
    GiveUp { total_attempts: u32 },
}

#[derive(Debug)]
pub struct ReconnectionScheduler {
    policy: ReconnectPolicy,
    state: RetryState,
}

impl ReconnectionScheduler {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: RetryState::default(),
        }
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Count one failure (stream drop, player fault, buffering timeout,
    /// failed probe). Returns the new consecutive error count.
    pub fn record_error(&mut self) -> u32 {
        self.state.consecutive_error_count = self.state.consecutive_error_count.saturating_add(1);
        self.state.consecutive_error_count
    }

    /// Decide what to do about the current failure
    pub fn schedule(&mut self, now: Instant, guards: ReconnectGuards) -> ScheduleDecision {
        if guards.user_stopped {
            return ScheduleDecision::Skip(SkipReason::UserStopped);
        }
        if guards.paused_for_foreground_content {
            return ScheduleDecision::Skip(SkipReason::ForegroundContent);
        }
        if guards.deliberately_paused {
            return ScheduleDecision::Skip(SkipReason::Paused);
        }
        if guards.exhausted {
            return ScheduleDecision::Skip(SkipReason::Exhausted);
        }
        if guards.restart_in_flight {
            return ScheduleDecision::Skip(SkipReason::RestartInFlight);
        }

        if let Some(limit) = self.policy.give_up_after {
            if self.state.total_attempts >= limit {
                return ScheduleDecision::GiveUp {
                    total_attempts: self.state.total_attempts,
                };
            }
        }

        // Escalation supersedes a pending incremental timer
        if self.state.consecutive_error_count > self.policy.restart_threshold {
            return ScheduleDecision::Restart {
                consecutive_errors: self.state.consecutive_error_count,
            };
        }

        if guards.reconnect_in_flight {
            return ScheduleDecision::Skip(SkipReason::AlreadyInFlight);
        }

        let (attempt, backoff) = self.next_backoff();
        let delay = backoff
            .max(remaining(now, self.state.last_successful_reconnect, self.policy.success_cooldown()))
            .max(remaining(now, self.state.last_attempt, self.policy.debounce()));

        ScheduleDecision::Retry { attempt, delay }
    }

    /// Advance the backoff cycle and return `(attempt, delay)`
    ///
    /// Delay is `initial * 2^attempt` clamped to `[min, max]`. Once the cycle
    /// reaches `max_retries` the counter resets and the delay stays pinned at
    /// `max` until the next success.
    pub fn next_backoff(&mut self) -> (u32, Duration) {
        let max_delay = self.policy.max_delay();

        if self.state.pinned || self.state.attempt_count >= self.policy.max_retries {
            self.state.pinned = true;
            self.state.attempt_count = 0;
            return (self.policy.max_retries, max_delay);
        }

        let factor = 1u32.checked_shl(self.state.attempt_count).unwrap_or(u32::MAX);
        let delay = self
            .policy
            .initial_delay()
            .saturating_mul(factor)
            .clamp(self.policy.min_delay(), max_delay);

        self.state.attempt_count += 1;
        (self.state.attempt_count, delay)
    }

    /// An attempt (incremental or restart) is being issued now
    pub fn record_attempt(&mut self, now: Instant) {
        self.state.last_attempt = Some(now);
        self.state.total_attempts = self.state.total_attempts.saturating_add(1);
    }

    /// Playback became ready. Returns true if this ended a recovery.
    pub fn record_success(&mut self, now: Instant) -> bool {
        let recovered = self.state.total_attempts > 0;
        if recovered {
            self.state.last_successful_reconnect = Some(now);
        }
        self.state.attempt_count = 0;
        self.state.consecutive_error_count = 0;
        self.state.total_attempts = 0;
        self.state.pinned = false;
        recovered
    }

    /// A full restart rebuilt the player: start the retry cycle over.
    /// `total_attempts` is kept so a hard maximum still applies.
    pub fn reset_after_restart(&mut self) {
        self.state.attempt_count = 0;
        self.state.consecutive_error_count = 0;
        self.state.pinned = false;
    }

    /// Explicit user play: forget everything except the cooldown timestamp
    pub fn reset(&mut self) {
        let last_success = self.state.last_successful_reconnect;
        self.state = RetryState {
            last_successful_reconnect: last_success,
            ..RetryState::default()
        };
    }
}

fn remaining(now: Instant, since: Option<Instant>, window: Duration) -> Duration {
    since
        .map(|t| window.saturating_sub(now.saturating_duration_since(t)))
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            success_cooldown_ms: 0,
            debounce_ms: 0,
            ..ReconnectPolicy::default()
        }
    }

    fn retry_delay(decision: ScheduleDecision) -> Duration {
        match decision {
            ScheduleDecision::Retry { delay, .. } => delay,
            other => panic!("Expected Retry, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_doubles_then_pins() {
        let mut s = ReconnectionScheduler::new(policy());
        let delays: Vec<u64> = (0..9).map(|_| s.next_backoff().1.as_millis() as u64).collect();
        assert_eq!(
            delays,
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000, 30_000]
        );
        assert!(s.state().pinned);
        assert_eq!(s.state().attempt_count, 0);
    }

    #[test]
    fn test_backoff_is_monotonic_and_clamped() {
        let p = ReconnectPolicy {
            initial_delay_ms: 100,
            min_delay_ms: 500,
            max_delay_ms: 5_000,
            max_retries: 8,
            ..policy()
        };
        let mut s = ReconnectionScheduler::new(p.clone());
        let mut previous = Duration::ZERO;
        for _ in 0..40 {
            let (_, delay) = s.next_backoff();
            assert!(delay >= p.min_delay());
            assert!(delay <= p.max_delay());
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(previous, p.max_delay());
    }

    #[test]
    fn test_huge_attempt_counts_do_not_overflow() {
        let p = ReconnectPolicy {
            max_retries: 100,
            ..policy()
        };
        let mut s = ReconnectionScheduler::new(p);
        for _ in 0..100 {
            let (_, delay) = s.next_backoff();
            assert!(delay <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_guards_abort_in_order() {
        let mut s = ReconnectionScheduler::new(policy());
        let now = Instant::now();
        for _ in 0..10 {
            s.record_error();
        }

        let guards = ReconnectGuards {
            user_stopped: true,
            paused_for_foreground_content: true,
            ..Default::default()
        };
        assert_eq!(
            s.schedule(now, guards),
            ScheduleDecision::Skip(SkipReason::UserStopped)
        );

        let guards = ReconnectGuards {
            paused_for_foreground_content: true,
            ..Default::default()
        };
        assert_eq!(
            s.schedule(now, guards),
            ScheduleDecision::Skip(SkipReason::ForegroundContent)
        );
    }

    #[test]
    fn test_escalation_supersedes_pending_retry() {
        let mut s = ReconnectionScheduler::new(policy());
        let now = Instant::now();
        let in_flight = ReconnectGuards {
            reconnect_in_flight: true,
            ..Default::default()
        };

        s.record_error();
        assert!(matches!(
            s.schedule(now, ReconnectGuards::default()),
            ScheduleDecision::Retry { attempt: 1, .. }
        ));

        // Errors 2 and 3 coalesce into the pending timer
        for _ in 0..2 {
            s.record_error();
            assert_eq!(
                s.schedule(now, in_flight),
                ScheduleDecision::Skip(SkipReason::AlreadyInFlight)
            );
        }

        // The 4th exceeds the threshold of 3
        assert_eq!(s.record_error(), 4);
        assert_eq!(
            s.schedule(now, in_flight),
            ScheduleDecision::Restart {
                consecutive_errors: 4
            }
        );
    }

    #[test]
    fn test_restart_in_flight_blocks_everything() {
        let mut s = ReconnectionScheduler::new(policy());
        for _ in 0..5 {
            s.record_error();
        }
        let guards = ReconnectGuards {
            restart_in_flight: true,
            ..Default::default()
        };
        assert_eq!(
            s.schedule(Instant::now(), guards),
            ScheduleDecision::Skip(SkipReason::RestartInFlight)
        );
    }

    #[test]
    fn test_give_up_after_hard_maximum() {
        let p = ReconnectPolicy {
            give_up_after: Some(3),
            ..policy()
        };
        let mut s = ReconnectionScheduler::new(p);
        let now = Instant::now();

        for _ in 0..3 {
            s.record_error();
            assert!(matches!(
                s.schedule(now, ReconnectGuards::default()),
                ScheduleDecision::Retry { .. }
            ));
            s.record_attempt(now);
            s.reset_after_restart();
        }

        s.record_error();
        assert_eq!(
            s.schedule(now, ReconnectGuards::default()),
            ScheduleDecision::GiveUp { total_attempts: 3 }
        );

        let exhausted = ReconnectGuards {
            exhausted: true,
            ..Default::default()
        };
        assert_eq!(
            s.schedule(now, exhausted),
            ScheduleDecision::Skip(SkipReason::Exhausted)
        );
    }

    #[test]
    fn test_debounce_pushes_delay_out() {
        let p = ReconnectPolicy {
            initial_delay_ms: 500,
            min_delay_ms: 500,
            debounce_ms: 2_000,
            ..policy()
        };
        let mut s = ReconnectionScheduler::new(p);
        let t0 = Instant::now();
        s.record_attempt(t0);

        s.record_error();
        let delay = retry_delay(s.schedule(t0 + Duration::from_millis(300), ReconnectGuards::default()));
        assert_eq!(delay, Duration::from_millis(1_700));
    }

    #[test]
    fn test_cooldown_after_success_pushes_delay_out() {
        let p = ReconnectPolicy {
            success_cooldown_ms: 10_000,
            ..policy()
        };
        let mut s = ReconnectionScheduler::new(p);
        let t0 = Instant::now();

        s.record_attempt(t0);
        assert!(s.record_success(t0 + Duration::from_secs(1)));

        s.record_error();
        let delay = retry_delay(s.schedule(t0 + Duration::from_secs(4), ReconnectGuards::default()));
        assert_eq!(delay, Duration::from_secs(7));
    }

    #[test]
    fn test_success_resets_counters() {
        let mut s = ReconnectionScheduler::new(policy());
        let now = Instant::now();
        for _ in 0..7 {
            s.next_backoff();
        }
        s.record_error();
        s.record_attempt(now);

        assert!(s.record_success(now));
        let state = s.state();
        assert_eq!(state.attempt_count, 0);
        assert_eq!(state.consecutive_error_count, 0);
        assert_eq!(state.total_attempts, 0);
        assert!(!state.pinned);

        // First ready signal without any attempt is not a recovery
        assert!(!s.record_success(now));
    }

    #[test]
    fn test_user_reset_keeps_cooldown_timestamp() {
        let mut s = ReconnectionScheduler::new(policy());
        let now = Instant::now();
        s.record_attempt(now);
        s.record_success(now);
        s.record_error();
        s.reset();
        assert_eq!(s.state().consecutive_error_count, 0);
        assert_eq!(s.state().last_successful_reconnect, Some(now));
        assert!(s.state().last_attempt.is_none());
    }
}
