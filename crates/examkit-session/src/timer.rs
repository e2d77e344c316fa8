//! The exam countdown.
//!
//! A purely cooperative one-second countdown. It holds no scoring logic and
//! performs no I/O; the session layer turns its `Expired` signal into the
//! submit transition. Expiry is reported exactly once; a tick arriving
//! after expiry is a no-op.

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The countdown is still running; this many seconds remain.
    Running(u64),
    /// The countdown just reached zero. Reported exactly once.
    Expired,
    /// The countdown reached zero on an earlier tick.
    AlreadyExpired,
}

/// A one-second countdown from an exam's duration.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    expired: bool,
}

impl Countdown {
    /// Start a countdown with `seconds` on the clock.
    pub fn new(seconds: u64) -> Self {
        Self {
            remaining: seconds,
            expired: false,
        }
    }

    /// Start a countdown from an exam duration in minutes.
    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(minutes as u64 * 60)
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> Tick {
        if self.expired {
            return Tick::AlreadyExpired;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    /// Seconds left on the clock.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Whether the clock is inside the final-minutes warning window.
    pub fn is_warning(&self) -> bool {
        !self.expired && self.remaining < 300
    }
}
