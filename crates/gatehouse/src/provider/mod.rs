//! Identity provider abstraction
//!
//! Credential verification is delegated to an external service. The gate
//! only needs two capabilities from it:
//! - authenticate an identity/credential pair, producing a live session
//! - revoke a session it has just been handed
//!
//! # Implementations
//!
//! - [`HttpIdentityProvider`] - GoTrue-compatible REST auth endpoint

pub mod http;

pub use http::{HttpIdentityProvider, ProviderConfig};

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

/// A session created by a successful authentication
///
/// Also the caller's handle on an authorized admin login: the token is what
/// the admin surface presents, and what [`IdentityProvider::revoke_session`]
/// needs to sign it out.
#[derive(Clone)]
pub struct ProviderSession {
    /// Identity the provider authenticated (may differ in case from the submitted one)
    pub identity: String,
    /// Opaque token the provider needs to revoke this session
    pub access_token: Zeroizing<String>,
}

impl ProviderSession {
    pub fn new(identity: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            access_token: Zeroizing::new(access_token.into()),
        }
    }
}

impl PartialEq for ProviderSession {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.access_token.as_str() == other.access_token.as_str()
    }
}

impl Eq for ProviderSession {}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("identity", &self.identity)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Failures reported by an identity provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider rejected the identity/credential pair
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The provider could not be reached or answered unexpectedly
    #[error("Provider transport error: {0}")]
    Transport(String),
}

/// External authentication service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a credential and open a session for the identity
    async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
    ) -> Result<ProviderSession, ProviderError>;

    /// Revoke a session previously returned by [`authenticate`](Self::authenticate)
    async fn revoke_session(&self, session: &ProviderSession) -> Result<(), ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str {
        "provider"
    }
}
