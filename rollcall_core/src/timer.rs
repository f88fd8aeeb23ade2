//! One-shot reveal timer with cancellation tokens.
//!
//! The timer never runs a callback.  It is polled with the current
//! [`Instant`]; once the deadline has passed, [`poll`](RevealTimer::poll)
//! hands back the token that was issued when it was armed, exactly once.
//! Re-arming or disarming invalidates any earlier token, so a late
//! `TimerElapsed(old_token)` can always be recognised as stale.

use std::time::{Duration, Instant};

/// Deceleration window between deciding the winner and revealing it.
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(1500);

/// Identifies one arming of a [`RevealTimer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    pub fn raw(&self) -> u64 { self.0 }
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    token:    TimerToken,
    deadline: Instant,
}

#[derive(Clone, Debug)]
pub struct RevealTimer {
    delay:      Duration,
    next_token: u64,
    armed:      Option<Armed>,
}

impl RevealTimer {
    pub fn new(delay: Duration) -> Self {
        RevealTimer { delay, next_token: 1, armed: None }
    }

    pub fn delay(&self) -> Duration { self.delay }

    /// Arm (or re-arm) the timer; any previously issued token becomes stale.
    pub fn arm(&mut self, now: Instant) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.armed = Some(Armed { token, deadline: now + self.delay });
        token
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Token of the outstanding arming, if any.
    pub fn current(&self) -> Option<TimerToken> {
        self.armed.map(|a| a.token)
    }

    /// Fire if due.  Returns the token at most once per arming.
    pub fn poll(&mut self, now: Instant) -> Option<TimerToken> {
        match self.armed {
            Some(a) if now >= a.deadline => {
                self.armed = None;
                Some(a.token)
            }
            _ => None,
        }
    }

    /// Time left before the armed deadline (zero once due).
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.armed.map(|a| a.deadline.saturating_duration_since(now))
    }
}

impl Default for RevealTimer {
    fn default() -> Self {
        RevealTimer::new(DEFAULT_REVEAL_DELAY)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
