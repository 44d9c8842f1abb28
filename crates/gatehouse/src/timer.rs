//! Background expiry of an active lockout
//!
//! The gate already treats an elapsed lockout as open, so this timer only
//! exists to make the persisted record and any countdown display converge
//! without waiting for the next login attempt.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{LockoutPolicy, LockoutStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::PersistedLockoutStore;

/// Consecutive unreadable ticks after which a spawned timer gives up
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Polls the lockout record until the lockout has expired
pub struct LockoutTimer {
    store: PersistedLockoutStore,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

/// A running timer task
pub struct TimerHandle {
    /// Latest status, updated every tick
    pub status: watch::Receiver<LockoutStatus>,
    /// Resolves once the gate is open again, or with the store error after
    /// [`MAX_CONSECUTIVE_ERRORS`] failed ticks in a row. The status channel
    /// closes either way.
    pub task: JoinHandle<Result<()>>,
}

impl LockoutTimer {
    pub fn new(
        store: PersistedLockoutStore,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            poll_interval,
        }
    }

    /// Check once, clearing the record if its lockout has elapsed
    pub fn tick(&self) -> Result<LockoutStatus> {
        let now = self.clock.now_millis();
        let stored = self.store.load()?;
        let state = self.policy.normalize(&stored);
        let next = self.policy.on_expiry(&state, now);

        if next != stored {
            self.store.save(&next)?;
            if stored.locked_until.is_some() && next.is_zero() {
                info!("Lockout expired, attempts reset");
            }
        }
        Ok(self.policy.status(&next, now))
    }

    /// Run on the tokio runtime until the gate is open
    pub fn spawn(self) -> TimerHandle {
        let mut failures = 0;
        // Keep polling if the first read fails
        let initial = self.tick().unwrap_or_else(|e| {
            failures += 1;
            warn!("Lockout timer could not read state: {}", e);
            LockoutStatus::Locked {
                remaining: self.poll_interval,
            }
        });
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            if !initial.is_locked() {
                return Ok(());
            }

            let mut interval = tokio::time::interval(self.poll_interval);
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                match self.tick() {
                    Ok(status) => {
                        failures = 0;
                        debug!(%status, "Lockout timer tick");
                        let _ = tx.send(status);
                        if !status.is_locked() {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= MAX_CONSECUTIVE_ERRORS {
                            error!(failures, "Lockout timer stopped: {}", e);
                            return Err(e);
                        }
                        warn!(failures, "Lockout timer could not read state: {}", e);
                    }
                }
            }
        });

        TimerHandle { status: rx, task }
    }
}
