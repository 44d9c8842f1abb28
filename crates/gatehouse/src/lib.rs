//! Gatehouse - Brute-force-resistant login gate for the storefront admin console
//!
//! This crate provides:
//! - The authorization gate that every admin login goes through
//! - Durable per-device storage of the failed-attempt counter and lockout
//! - A background timer that clears an elapsed lockout
//! - An identity provider adapter for the hosted auth service
//!
//! Credential verification itself is delegated to the provider. The gate
//! adds lockout and a single-identity allow check on top of it.

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod provider;
pub mod store;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use gate::{AuthorizationGate, FailureCause, GateResult, PrivilegedIdentity};
pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderError, ProviderSession};
pub use store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, PersistedLockoutStore};
pub use timer::{LockoutTimer, TimerHandle};

pub use gatehouse_core::{LockoutPolicy, LockoutState, LockoutStatus};
