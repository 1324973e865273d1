//! Buffer health monitor
//!
//! Tracks buffering episodes, scores network stability over a trailing
//! window and decides how long a buffering episode may last before the
//! engine gives up waiting and reconnects.
//!
//! The monitor is pure bookkeeping: it never touches timers or the player.
//! The engine feeds it timestamps and acts on the returned decisions, which
//! keeps every rule here testable without a runtime.

use crate::config::BufferPolicy;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum (and initial) buffer health
pub const MAX_BUFFER_HEALTH: u8 = 3;

/// Stability score floor
pub const MIN_STABILITY_SCORE: f64 = 0.1;

/// What the engine should do when a buffering episode starts
#[derive(Debug, Clone, PartialEq)]
pub enum BufferingAction {
    /// Episode already being tracked; health dropped but the running grace
    /// period continues
    AlreadyBuffering,
    /// Health is exhausted: reconnect now, no grace period
    EscalateNow,
    /// Wait, polling every `interval`, and show `message`
    ProgressiveCheck { interval: Duration, message: String },
}

/// Result of one progressive check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Buffering already resolved; stale check
    NotBuffering,
    /// Keep waiting; schedule another check
    StillWaiting { check: u32, message: String },
    /// Waited long enough; reconnect
    Escalate { checks: u32, elapsed: Duration },
}

/// Buffer health monitor
#[derive(Debug)]
pub struct BufferHealthMonitor {
    policy: BufferPolicy,
    health: u8,
    episode_start: Option<Instant>,
    checks_done: u32,
    /// (episode end, episode duration), oldest first
    window: VecDeque<(Instant, Duration)>,
    score: f64,
}

impl BufferHealthMonitor {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            health: MAX_BUFFER_HEALTH,
            episode_start: None,
            checks_done: 0,
            window: VecDeque::new(),
            score: 1.0,
        }
    }

    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn stability_score(&self) -> f64 {
        self.score
    }

    pub fn is_degraded(&self) -> bool {
        self.score < self.policy.degraded_threshold
    }

    pub fn is_buffering(&self) -> bool {
        self.episode_start.is_some()
    }

    /// Tiered grace period: longer on a stable network, shorter on a
    /// degraded one
    pub fn adaptive_timeout(&self) -> Duration {
        let ms = if self.score >= self.policy.stable_threshold {
            self.policy.stable_timeout_ms
        } else if self.score >= self.policy.degraded_threshold {
            self.policy.moderate_timeout_ms
        } else {
            self.policy.degraded_timeout_ms
        };
        Duration::from_millis(ms)
    }

    /// Player reported insufficient data. Every signal costs one health
    /// point; only the first one of an episode records its start.
    pub fn on_buffering_start(&mut self, now: Instant) -> BufferingAction {
        let already_buffering = self.episode_start.is_some();
        if !already_buffering {
            self.episode_start = Some(now);
            self.checks_done = 0;
        }
        self.health = self.health.saturating_sub(1);
        self.recompute_score(now);

        if self.health == 0 {
            BufferingAction::EscalateNow
        } else if already_buffering {
            BufferingAction::AlreadyBuffering
        } else {
            BufferingAction::ProgressiveCheck {
                interval: self.policy.check_interval(),
                message: "Buffering...".to_string(),
            }
        }
    }

    /// A progressive check timer fired
    pub fn on_progress_check(&mut self, now: Instant) -> CheckOutcome {
        let Some(start) = self.episode_start else {
            return CheckOutcome::NotBuffering;
        };

        self.checks_done += 1;
        let elapsed = now.saturating_duration_since(start);

        if self.checks_done >= self.policy.max_checks || elapsed >= self.adaptive_timeout() {
            return CheckOutcome::Escalate {
                checks: self.checks_done,
                elapsed,
            };
        }

        CheckOutcome::StillWaiting {
            check: self.checks_done,
            message: progress_message(self.checks_done, self.is_degraded()),
        }
    }

    /// Buffering cleared on its own. Returns the episode duration, or `None`
    /// if no episode was open.
    pub fn on_buffering_resolved(&mut self, now: Instant) -> Option<Duration> {
        let duration = self.close_episode(now)?;
        self.health = (self.health + 1).min(MAX_BUFFER_HEALTH);
        Some(duration)
    }

    /// The engine escalated this episode to a reconnect. The buffering time
    /// still counts against stability, but health is not restored.
    pub fn on_escalated(&mut self, now: Instant) -> Option<Duration> {
        self.close_episode(now)
    }

    /// Fresh connection after an explicit play or a player rebuild
    pub fn mark_healthy(&mut self) {
        self.health = MAX_BUFFER_HEALTH;
    }

    /// Forget any open episode (user stop, pause). History is kept.
    pub fn abandon_episode(&mut self) {
        self.episode_start = None;
        self.checks_done = 0;
    }

    fn close_episode(&mut self, now: Instant) -> Option<Duration> {
        let start = self.episode_start.take()?;
        self.checks_done = 0;
        let duration = now.saturating_duration_since(start);
        self.window.push_back((now, duration));
        self.recompute_score(now);
        Some(duration)
    }

    fn recompute_score(&mut self, now: Instant) {
        let window = self.policy.window();
        while let Some(&(at, _)) = self.window.front() {
            if now.saturating_duration_since(at) > window {
                self.window.pop_front();
            } else {
                break;
            }
        }

        let buffered: Duration = self.window.iter().map(|(_, d)| *d).sum();
        let ratio = buffered.as_secs_f64() / window.as_secs_f64().max(1.0);
        self.score = (1.0 - ratio).clamp(MIN_STABILITY_SCORE, 1.0);
    }
}

fn progress_message(check: u32, degraded: bool) -> String {
    match (check, degraded) {
        (1, false) => "Still buffering, waiting for the stream...".to_string(),
        (1, true) => "Slow network, still buffering...".to_string(),
        (2, _) => "Network is slow, hang on...".to_string(),
        _ => "Weak connection, trying to recover...".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> BufferHealthMonitor {
        BufferHealthMonitor::new(BufferPolicy::default())
    }

    #[test]
    fn test_starts_fully_healthy_and_stable() {
        let m = monitor();
        assert_eq!(m.health(), MAX_BUFFER_HEALTH);
        assert_eq!(m.stability_score(), 1.0);
        assert!(!m.is_degraded());
        assert_eq!(m.adaptive_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_short_blip_is_net_neutral() {
        let mut m = monitor();
        let t0 = Instant::now();

        let action = m.on_buffering_start(t0);
        assert!(matches!(action, BufferingAction::ProgressiveCheck { .. }));
        assert_eq!(m.health(), 2);

        let duration = m.on_buffering_resolved(t0 + Duration::from_millis(1500));
        assert_eq!(duration, Some(Duration::from_millis(1500)));
        assert_eq!(m.health(), 3);
        assert!(!m.is_buffering());
    }

    #[test]
    fn test_repeated_start_signals_drain_one_episode() {
        let mut m = monitor();
        let t0 = Instant::now();
        m.on_buffering_start(t0);
        assert_eq!(
            m.on_buffering_start(t0 + Duration::from_millis(100)),
            BufferingAction::AlreadyBuffering
        );
        assert_eq!(m.health(), 1);
        assert!(m.is_buffering());

        assert_eq!(
            m.on_buffering_start(t0 + Duration::from_millis(200)),
            BufferingAction::EscalateNow
        );
        assert_eq!(m.health(), 0);

        // Episode duration is measured from the first signal
        assert_eq!(
            m.on_escalated(t0 + Duration::from_secs(2)),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_exhausted_health_escalates_immediately() {
        let mut m = monitor();
        let mut now = Instant::now();

        // Two unresolved (escalated) episodes drain health to 1
        for _ in 0..2 {
            m.on_buffering_start(now);
            now += Duration::from_secs(1);
            m.on_escalated(now);
        }
        assert_eq!(m.health(), 1);

        assert_eq!(m.on_buffering_start(now), BufferingAction::EscalateNow);
        assert_eq!(m.health(), 0);

        // Floor holds
        m.on_escalated(now);
        assert_eq!(m.on_buffering_start(now), BufferingAction::EscalateNow);
        assert_eq!(m.health(), 0);
    }

    #[test]
    fn test_progressive_checks_escalate_after_bound() {
        let mut m = monitor();
        let t0 = Instant::now();
        m.on_buffering_start(t0);

        let first = m.on_progress_check(t0 + Duration::from_secs(3));
        assert!(matches!(first, CheckOutcome::StillWaiting { check: 1, .. }));
        let second = m.on_progress_check(t0 + Duration::from_secs(6));
        assert!(matches!(second, CheckOutcome::StillWaiting { check: 2, .. }));
        let third = m.on_progress_check(t0 + Duration::from_secs(9));
        assert!(matches!(third, CheckOutcome::Escalate { checks: 3, .. }));
    }

    #[test]
    fn test_adaptive_timeout_escalates_before_check_bound() {
        let policy = BufferPolicy {
            max_checks: 10,
            ..BufferPolicy::default()
        };
        let mut m = BufferHealthMonitor::new(policy);
        let t0 = Instant::now();
        m.on_buffering_start(t0);

        // Stable network: 15s grace
        let at_12 = m.on_progress_check(t0 + Duration::from_secs(12));
        assert!(matches!(at_12, CheckOutcome::StillWaiting { .. }));
        let at_15 = m.on_progress_check(t0 + Duration::from_secs(15));
        assert!(matches!(at_15, CheckOutcome::Escalate { .. }));
    }

    #[test]
    fn test_check_after_resolution_is_stale() {
        let mut m = monitor();
        let t0 = Instant::now();
        m.on_buffering_start(t0);
        m.on_buffering_resolved(t0 + Duration::from_secs(1));
        assert_eq!(
            m.on_progress_check(t0 + Duration::from_secs(3)),
            CheckOutcome::NotBuffering
        );
    }

    #[test]
    fn test_score_tiers_follow_buffered_time() {
        let mut m = monitor();
        let t0 = Instant::now();

        // 90s buffered out of a 300s window -> score 0.7 (moderate)
        m.on_buffering_start(t0);
        m.on_buffering_resolved(t0 + Duration::from_secs(90));
        assert!((m.stability_score() - 0.7).abs() < 1e-9);
        assert!(!m.is_degraded());
        assert_eq!(m.adaptive_timeout(), Duration::from_secs(10));

        // Another 60s -> 0.5 (degraded)
        let t1 = t0 + Duration::from_secs(100);
        m.on_buffering_start(t1);
        m.on_buffering_resolved(t1 + Duration::from_secs(60));
        assert!((m.stability_score() - 0.5).abs() < 1e-9);
        assert!(m.is_degraded());
        assert_eq!(m.adaptive_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_score_is_floored() {
        let mut m = monitor();
        let t0 = Instant::now();
        m.on_buffering_start(t0);
        m.on_buffering_resolved(t0 + Duration::from_secs(299));
        assert_eq!(m.stability_score(), MIN_STABILITY_SCORE);
    }

    #[test]
    fn test_old_episodes_are_pruned() {
        let mut m = monitor();
        let t0 = Instant::now();
        m.on_buffering_start(t0);
        m.on_buffering_resolved(t0 + Duration::from_secs(150));
        assert!(m.is_degraded());

        // Six minutes later the old episode falls out of the window
        let later = t0 + Duration::from_secs(150 + 360);
        m.on_buffering_start(later);
        assert_eq!(m.stability_score(), 1.0);
    }

    #[test]
    fn test_health_stays_in_range_and_moves_by_one() {
        let mut m = monitor();
        let mut now = Instant::now();
        // Deterministic pseudo-random start/resolve/escalate sequence
        let mut seed: u32 = 0x2545_f491;

        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let before = m.health() as i16;
            now += Duration::from_millis(250);

            match (seed >> 16) % 3 {
                0 => {
                    m.on_buffering_start(now);
                }
                1 => {
                    m.on_buffering_resolved(now);
                }
                _ => {
                    m.on_escalated(now);
                }
            }

            let after = m.health() as i16;
            assert!(after <= MAX_BUFFER_HEALTH as i16);
            assert!((after - before).abs() <= 1);
        }
    }
}
