//! Fixed-window lockout policy for brute-force protection
//!
//! Failures are counted per device. Reaching `max_attempts` locks the gate
//! for `lockout_duration`, after which the counter starts over:
//!
//! - 1 to `max_attempts - 1` failures: rejected, attempts remaining reported
//! - `max_attempts` failures: locked until `now + lockout_duration`
//! - lockout elapsed: back to zero
//! - any authorized login: back to zero
//!
//! Every function here is pure. Timestamps are Unix epoch milliseconds.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::state::LockoutState;
use crate::{DEFAULT_LOCKOUT_SECS, DEFAULT_MAX_ATTEMPTS};

/// Lockout policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lockout
    max_attempts: u32,
    /// How long a lockout lasts
    lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::from_secs(DEFAULT_LOCKOUT_SECS),
        }
    }
}

/// Snapshot of the gate as a caller would display it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockoutStatus {
    /// Attempts are accepted
    Open {
        failed_attempts: u32,
        attempts_remaining: u32,
    },
    /// Attempts are refused until `remaining` elapses
    Locked { remaining: Duration },
}

impl LockoutStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutStatus::Locked { .. })
    }
}

impl fmt::Display for LockoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockoutStatus::Open {
                attempts_remaining, ..
            } => write!(f, "open ({} attempts remaining)", attempts_remaining),
            LockoutStatus::Locked { remaining } => {
                write!(f, "locked ({} remaining)", format_remaining(*remaining))
            }
        }
    }
}

impl LockoutPolicy {
    /// Create a policy, rejecting parameters that would never lock or never unlock
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if lockout_duration.is_zero() {
            return Err(Error::InvalidPolicy(
                "lockout_duration must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            lockout_duration,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }

    fn lockout_millis(&self) -> u64 {
        u64::try_from(self.lockout_duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// True iff a lockout is recorded and `now` is before its end
    pub fn is_locked(&self, state: &LockoutState, now: u64) -> bool {
        matches!(state.locked_until, Some(until) if now < until)
    }

    /// Time left on the lockout, zero once it has elapsed
    pub fn remaining_lockout(&self, state: &LockoutState, now: u64) -> Duration {
        state
            .locked_until
            .map(|until| Duration::from_millis(until.saturating_sub(now)))
            .unwrap_or(Duration::ZERO)
    }

    /// Record one failed attempt
    pub fn on_failure(&self, state: &LockoutState, now: u64) -> LockoutState {
        let failed_attempts = state.failed_attempts.saturating_add(1);
        let locked_until = if failed_attempts >= self.max_attempts {
            Some(now.saturating_add(self.lockout_millis()))
        } else {
            None
        };

        LockoutState {
            failed_attempts,
            locked_until,
        }
    }

    /// Record an authorized login
    pub fn on_success(&self, _state: &LockoutState) -> LockoutState {
        LockoutState::ZERO
    }

    /// Clear a lockout that has run out; any other state is returned as-is
    pub fn on_expiry(&self, state: &LockoutState, now: u64) -> LockoutState {
        if state.locked_until.is_some() && !self.is_locked(state, now) {
            LockoutState::ZERO
        } else {
            *state
        }
    }

    /// Failures left before the next one locks the gate
    pub fn attempts_remaining(&self, state: &LockoutState) -> u32 {
        self.max_attempts.saturating_sub(state.failed_attempts)
    }

    /// Current status with lazy expiry applied
    pub fn status(&self, state: &LockoutState, now: u64) -> LockoutStatus {
        if self.is_locked(state, now) {
            return LockoutStatus::Locked {
                remaining: self.remaining_lockout(state, now),
            };
        }

        let state = self.on_expiry(state, now);
        LockoutStatus::Open {
            failed_attempts: state.failed_attempts,
            attempts_remaining: self.attempts_remaining(&state),
        }
    }

    /// Restore the invariant that a recorded lockout implies a full counter
    ///
    /// A record written under a smaller `max_attempts` keeps its lockout.
    pub fn normalize(&self, state: &LockoutState) -> LockoutState {
        match state.locked_until {
            Some(_) if state.failed_attempts < self.max_attempts => LockoutState {
                failed_attempts: self.max_attempts,
                locked_until: state.locked_until,
            },
            _ => *state,
        }
    }
}

/// Countdown text for a remaining lockout, `mm:ss` or `h:mm:ss`
///
/// Partial seconds round up, so a live lockout never shows `00:00`.
pub fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }

    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
