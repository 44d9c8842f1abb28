//! Test doubles shared by the end-to-end tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gatehouse::{IdentityProvider, ProviderError, ProviderSession};

/// In-process identity provider with a fixed account table
///
/// Identities are matched case-insensitively and reported back lowercased,
/// the way the hosted auth service normalizes emails.
#[derive(Default)]
pub struct FakeIdentityProvider {
    accounts: HashMap<String, String>,
    offline: Mutex<bool>,
    authenticate_calls: AtomicUsize,
    revoked: Mutex<Vec<String>>,
    issued: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, identity: &str, credential: &str) -> Self {
        self.accounts
            .insert(identity.to_ascii_lowercase(), credential.to_string());
        self
    }

    /// Make every call fail as a transport error
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// How many times `authenticate` has been invoked
    pub fn authenticate_calls(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    /// Identities whose sessions were revoked, in order
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
    ) -> Result<ProviderSession, ProviderError> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if *self.offline.lock().unwrap() {
            return Err(ProviderError::Transport("connection refused".to_string()));
        }

        let identity = identity.to_ascii_lowercase();
        match self.accounts.get(&identity) {
            Some(expected) if expected == credential => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst);
                Ok(ProviderSession::new(identity, format!("session-{}", n)))
            }
            _ => Err(ProviderError::InvalidCredentials),
        }
    }

    async fn revoke_session(&self, session: &ProviderSession) -> Result<(), ProviderError> {
        self.revoked.lock().unwrap().push(session.identity.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}
