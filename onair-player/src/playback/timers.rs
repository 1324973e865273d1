//! Cancellable engine timers
//!
//! Each timer is a spawned sleep that posts a `TimerFired` message back to
//! the engine's event loop, so firing is serialized with every other input.
//! Cancelling aborts the task and forgets its generation; a firing that was
//! already queued before the abort carries a stale generation and is
//! rejected by `accept`.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Timer slots owned by the engine (at most one pending per kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Backoff delay before an incremental reconnect
    Reconnect,
    /// Progressive check while buffering
    BufferCheck,
    /// Session heartbeat (repeating)
    Heartbeat,
    /// Pause between player teardown and rebuild
    RestartPause,
    /// Settle delay before resuming after foreground content
    ForegroundResume,
    /// Background time allowed before flushing the session
    BackgroundGrace,
}

impl TimerKind {
    pub const ALL: [TimerKind; 6] = [
        TimerKind::Reconnect,
        TimerKind::BufferCheck,
        TimerKind::Heartbeat,
        TimerKind::RestartPause,
        TimerKind::ForegroundResume,
        TimerKind::BackgroundGrace,
    ];
}

/// Message posted when a timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

struct Slot {
    generation: u64,
    repeating: bool,
    handle: JoinHandle<()>,
}

/// Owner of all engine timers. Dropping it aborts every pending timer.
pub struct Timers {
    tx: mpsc::UnboundedSender<TimerFired>,
    slots: HashMap<TimerKind, Slot>,
    next_generation: u64,
}

impl Timers {
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            slots: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arm a one-shot timer, replacing any pending timer of the same kind
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.arm(kind, delay, false);
    }

    /// Arm a repeating timer, replacing any pending timer of the same kind
    pub fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) {
        self.arm(kind, period, true);
    }

    /// Cancel a pending timer. Returns true if one was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.slots.remove(&kind) {
            Some(slot) => {
                slot.handle.abort();
                trace!("Cancelled {:?} timer (generation {})", kind, slot.generation);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn pending(&self) -> Vec<TimerKind> {
        TimerKind::ALL
            .into_iter()
            .filter(|kind| self.is_pending(*kind))
            .collect()
    }

    /// Validate a firing. One-shot timers are consumed; stale firings from
    /// cancelled or replaced timers return false.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        let Some(slot) = self.slots.get(&fired.kind) else {
            return false;
        };
        if slot.generation != fired.generation {
            return false;
        }
        if !slot.repeating {
            self.slots.remove(&fired.kind);
        }
        true
    }

    fn arm(&mut self, kind: TimerKind, period: Duration, repeating: bool) {
        self.cancel(kind);
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if tx.send(TimerFired { kind, generation }).is_err() || !repeating {
                    break;
                }
            }
        });

        self.slots.insert(
            kind,
            Slot {
                generation,
                repeating,
                handle,
            },
        );
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            slot.handle.abort();
        }
    }
}
