//! Authorization gate for the admin console
//!
//! Every admin login goes through [`AuthorizationGate::attempt_login`]:
//!
//! 1. The persisted lockout record is loaded and lazily expired
//! 2. While locked, the attempt is refused without contacting the provider
//! 3. Otherwise the provider verifies the credential
//! 4. Failures advance the lockout counter
//! 5. A verified identity other than the privileged one has its session
//!    revoked on the spot and is not counted as a failure
//!
//! An authorized attempt hands the provider session back to the caller. It
//! stays live until [`AuthorizationGate::sign_out`] revokes it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{format_remaining, LockoutPolicy, LockoutState, LockoutStatus};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{GateError, Result};
use crate::provider::{IdentityProvider, ProviderError, ProviderSession};
use crate::store::PersistedLockoutStore;
use crate::timer::LockoutTimer;

/// Why a rejected attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Provider rejected the identity/credential pair
    InvalidCredentials,
    /// Provider could not be reached
    Transport,
}

/// Outcome of one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    /// The privileged identity is signed in with `session`
    Authorized { session: ProviderSession },
    /// The attempt failed below the lockout threshold
    Rejected {
        attempts_remaining: u32,
        cause: FailureCause,
    },
    /// Attempts are refused until `remaining` elapses
    Locked { remaining: Duration },
    /// Valid credentials for an identity that may not use the admin console
    Forbidden,
}

impl GateResult {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GateResult::Authorized { .. })
    }

    /// The live session of an authorized attempt
    pub fn session(&self) -> Option<&ProviderSession> {
        match self {
            GateResult::Authorized { session } => Some(session),
            _ => None,
        }
    }

    /// Take ownership of the session of an authorized attempt
    pub fn into_session(self) -> Option<ProviderSession> {
        match self {
            GateResult::Authorized { session } => Some(session),
            _ => None,
        }
    }
}

impl fmt::Display for GateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateResult::Authorized { session } => {
                write!(f, "Signed in as {}.", session.identity)
            }
            GateResult::Rejected {
                attempts_remaining,
                cause,
            } => {
                let reason = match cause {
                    FailureCause::InvalidCredentials => "Invalid email or password.",
                    FailureCause::Transport => "Could not reach the sign-in service.",
                };
                let noun = if *attempts_remaining == 1 {
                    "attempt"
                } else {
                    "attempts"
                };
                write!(
                    f,
                    "{} {} {} remaining before lockout.",
                    reason, attempts_remaining, noun
                )
            }
            GateResult::Locked { remaining } => write!(
                f,
                "Too many failed attempts. Try again in {}.",
                format_remaining(*remaining)
            ),
            GateResult::Forbidden => {
                write!(f, "Access denied: this account cannot use the admin console.")
            }
        }
    }
}

/// The one identity allowed past the gate
///
/// Compared byte-for-byte against the identity the provider reports. Only
/// enable [`ignoring_case`](Self::ignoring_case) for providers that treat
/// identities case-insensitively themselves; otherwise two distinct accounts
/// could both pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedIdentity {
    identity: String,
    ignore_case: bool,
}

impl PrivilegedIdentity {
    /// Surrounding whitespace of the configured value is dropped
    pub fn new(identity: impl Into<String>) -> Result<Self> {
        let identity = identity.into().trim().to_string();
        if identity.is_empty() {
            return Err(GateError::Config(
                "privileged_identity must not be empty".to_string(),
            ));
        }
        Ok(Self {
            identity,
            ignore_case: false,
        })
    }

    /// Compare ASCII case-insensitively (default: exact)
    pub fn ignoring_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.ignore_case {
            self.identity.eq_ignore_ascii_case(candidate)
        } else {
            self.identity == candidate
        }
    }

    pub fn as_str(&self) -> &str {
        &self.identity
    }

    pub fn ignores_case(&self) -> bool {
        self.ignore_case
    }
}

/// Lockout-guarded, single-identity login gate
pub struct AuthorizationGate {
    policy: LockoutPolicy,
    privileged: PrivilegedIdentity,
    store: PersistedLockoutStore,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    count_transport_failures: bool,
    poll_interval: Duration,
}

impl AuthorizationGate {
    /// Create a gate and read the device's current lockout record
    pub fn new(
        policy: LockoutPolicy,
        privileged: PrivilegedIdentity,
        store: PersistedLockoutStore,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let gate = Self {
            policy,
            privileged,
            store,
            provider,
            clock,
            count_transport_failures: true,
            poll_interval: Duration::from_millis(gatehouse_core::DEFAULT_POLL_INTERVAL_MS),
        };

        let status = gate.status()?;
        info!(
            provider = gate.provider.name(),
            %status,
            "Authorization gate ready"
        );
        Ok(gate)
    }

    /// Whether provider outages count toward lockout (default: true)
    pub fn with_transport_failures_counted(mut self, counted: bool) -> Self {
        self.count_transport_failures = counted;
        self
    }

    /// Poll interval for timers handed out by [`lockout_timer`](Self::lockout_timer)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn privileged_identity(&self) -> &PrivilegedIdentity {
        &self.privileged
    }

    /// Current status, computed from the stored timestamp
    pub fn status(&self) -> Result<LockoutStatus> {
        let now = self.clock.now_millis();
        let state = self.load_current(now)?;
        Ok(self.policy.status(&state, now))
    }

    /// Timer that clears this gate's lockout once it elapses
    pub fn lockout_timer(&self) -> LockoutTimer {
        LockoutTimer::new(
            self.store.clone(),
            self.policy.clone(),
            Arc::clone(&self.clock),
            self.poll_interval,
        )
    }

    /// Attempt an admin login
    ///
    /// Returns `Err` only for empty input or a local storage failure.
    pub async fn attempt_login(&self, identity: &str, credential: &str) -> Result<GateResult> {
        if identity.trim().is_empty() {
            return Err(GateError::EmptyIdentity);
        }
        if credential.is_empty() {
            return Err(GateError::EmptyCredential);
        }

        let now = self.clock.now_millis();
        let state = self.load_current(now)?;

        if self.policy.is_locked(&state, now) {
            let remaining = self.policy.remaining_lockout(&state, now);
            warn!(
                identity = %identity,
                remaining_secs = remaining.as_secs(),
                "Login refused: lockout active"
            );
            return Ok(GateResult::Locked { remaining });
        }

        match self.provider.authenticate(identity, credential).await {
            Ok(session) => self.authorize(session, &state).await,
            Err(err) => self.record_failure(identity, err, &state),
        }
    }

    /// Revoke a session returned in [`GateResult::Authorized`]
    ///
    /// Lockout state is untouched.
    pub async fn sign_out(
        &self,
        session: &ProviderSession,
    ) -> std::result::Result<(), ProviderError> {
        self.provider.revoke_session(session).await?;
        info!(identity = %session.identity, "Admin signed out");
        Ok(())
    }

    /// Load the record, restoring its invariant and applying lazy expiry
    fn load_current(&self, now: u64) -> Result<LockoutState> {
        let stored = self.store.load()?;
        let state = self.policy.normalize(&stored);
        let state = self.policy.on_expiry(&state, now);

        if state != stored {
            if stored.locked_until.is_some() && state.is_zero() {
                info!("Lockout expired");
            }
            self.store.save(&state)?;
        }
        Ok(state)
    }

    async fn authorize(
        &self,
        session: ProviderSession,
        state: &LockoutState,
    ) -> Result<GateResult> {
        if self.privileged.matches(&session.identity) {
            let next = self.policy.on_success(state);
            if let Err(e) = self.store.save(&next) {
                // The caller never receives this session
                error!(
                    identity = %session.identity,
                    "Failed to clear lockout state, revoking admin session: {}",
                    e
                );
                if let Err(revoke) = self.provider.revoke_session(&session).await {
                    error!(
                        identity = %session.identity,
                        "Failed to revoke admin session: {}",
                        revoke
                    );
                }
                return Err(e);
            }
            info!(identity = %session.identity, "Admin login authorized");
            return Ok(GateResult::Authorized { session });
        }

        warn!(
            identity = %session.identity,
            "Authenticated identity is not privileged, revoking session"
        );
        if let Err(e) = self.provider.revoke_session(&session).await {
            error!(
                identity = %session.identity,
                "Failed to revoke unauthorized session: {}",
                e
            );
        }
        Ok(GateResult::Forbidden)
    }

    fn record_failure(
        &self,
        identity: &str,
        err: ProviderError,
        state: &LockoutState,
    ) -> Result<GateResult> {
        let cause = match &err {
            ProviderError::InvalidCredentials => FailureCause::InvalidCredentials,
            ProviderError::Transport(msg) => {
                warn!(identity = %identity, "Identity provider unreachable: {}", msg);
                FailureCause::Transport
            }
        };

        if cause == FailureCause::Transport && !self.count_transport_failures {
            return Ok(GateResult::Rejected {
                attempts_remaining: self.policy.attempts_remaining(state),
                cause,
            });
        }

        let now = self.clock.now_millis();
        let next = self.policy.on_failure(state, now);
        self.store.save(&next)?;

        if self.policy.is_locked(&next, now) {
            let remaining = self.policy.remaining_lockout(&next, now);
            warn!(
                identity = %identity,
                failed_attempts = next.failed_attempts,
                lockout_secs = remaining.as_secs(),
                "Too many failed logins, lockout engaged"
            );
            return Ok(GateResult::Locked { remaining });
        }

        let attempts_remaining = self.policy.attempts_remaining(&next);
        info!(
            identity = %identity,
            failed_attempts = next.failed_attempts,
            attempts_remaining,
            "Login rejected"
        );
        Ok(GateResult::Rejected {
            attempts_remaining,
            cause,
        })
    }
}
