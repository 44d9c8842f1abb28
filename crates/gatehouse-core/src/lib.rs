//! Gatehouse Core - Lockout state and brute-force policy
//!
//! This crate holds the pure half of the admin login gate:
//! - [`LockoutState`], the persisted attempt counter and lockout expiry
//! - [`LockoutPolicy`], the state machine that advances it
//!
//! Nothing in here performs I/O or reads the clock. Callers pass `now`
//! explicitly as Unix epoch milliseconds.

pub mod error;
pub mod policy;
pub mod state;

pub use error::{Error, Result};
pub use policy::{format_remaining, LockoutPolicy, LockoutStatus};
pub use state::LockoutState;

/// Default number of consecutive failures before lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration in seconds (15 minutes)
pub const DEFAULT_LOCKOUT_SECS: u64 = 15 * 60;

/// Default poll interval for the lockout timer in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
