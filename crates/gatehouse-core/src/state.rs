//! Persisted lockout record

use crate::error::{Error, Result};

/// Attempt counter and lockout expiry for one device
///
/// `locked_until` is a Unix timestamp in milliseconds. A present value that
/// lies in the past is logically expired even before anything clears it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LockoutState {
    /// Consecutive failures since the last success or expiry
    pub failed_attempts: u32,

    /// Moment the lockout ends; `None` when not locked
    pub locked_until: Option<u64>,
}

impl LockoutState {
    /// The reset state: no failures, no lockout
    pub const ZERO: Self = Self {
        failed_attempts: 0,
        locked_until: None,
    };

    /// Create a state with the given counter and no lockout
    pub fn with_attempts(failed_attempts: u32) -> Self {
        Self {
            failed_attempts,
            locked_until: None,
        }
    }

    /// True if this is the reset state
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Rebuild a state from its two persisted string values
    ///
    /// A missing counter reads as zero. Values must be plain decimal
    /// integers; anything else is reported rather than guessed at.
    pub fn from_persisted(
        attempts_key: &str,
        attempts: Option<&str>,
        locked_until_key: &str,
        locked_until: Option<&str>,
    ) -> Result<Self> {
        let failed_attempts = match attempts {
            Some(raw) => parse_decimal(attempts_key, raw)?,
            None => 0,
        };
        let locked_until = locked_until
            .map(|raw| parse_decimal(locked_until_key, raw))
            .transpose()?;

        Ok(Self {
            failed_attempts,
            locked_until,
        })
    }

    /// Persisted form of the counter
    pub fn attempts_value(&self) -> String {
        self.failed_attempts.to_string()
    }

    /// Persisted form of the expiry, if any
    pub fn locked_until_value(&self) -> Option<String> {
        self.locked_until.map(|ts| ts.to_string())
    }
}

fn parse_decimal<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt(key, raw));
    }
    trimmed.parse().map_err(|_| corrupt(key, raw))
}

fn corrupt(key: &str, raw: &str) -> Error {
    Error::CorruptRecord {
        key: key.to_string(),
        value: raw.to_string(),
    }
}
