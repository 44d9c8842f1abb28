//! GoTrue-compatible REST identity provider
//!
//! Talks to the hosted backend's auth service:
//! - `POST /auth/v1/token?grant_type=password` to sign in
//! - `POST /auth/v1/logout` with the session's bearer token to sign out
//!
//! The connector speaks plain HTTP. TLS is expected to be terminated by the
//! deployment (a local sidecar or proxy in front of the backend).

use std::time::Duration;

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{IdentityProvider, ProviderError, ProviderSession};
use crate::error::{GateError, Result};

const TOKEN_PATH: &str = "/auth/v1/token?grant_type=password";
const LOGOUT_PATH: &str = "/auth/v1/logout";

/// Connection settings for the REST provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:54321`
    pub base_url: String,

    /// Public API key sent as the `apikey` header
    pub api_key: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Check that the settings can produce a working client
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim_end_matches('/');
        let uri: Uri = base
            .parse()
            .map_err(|e| GateError::Config(format!("Invalid provider base_url: {}", e)))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(GateError::Config(format!(
                    "Unsupported provider scheme '{}': point base_url at a local http endpoint",
                    other
                )))
            }
            None => {
                return Err(GateError::Config(
                    "Provider base_url must include a scheme".to_string(),
                ))
            }
        }

        if self.api_key.trim().is_empty() {
            return Err(GateError::Config("Provider api_key is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(GateError::Config(
                "Provider timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    email: Option<String>,
}

/// REST client for the backend's auth service
pub struct HttpIdentityProvider {
    client: Client<HttpConnector>,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpIdentityProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Uri, ProviderError> {
        format!("{}{}", self.base_url, path)
            .parse()
            .map_err(|e| ProviderError::Transport(format!("Invalid endpoint: {}", e)))
    }

    async fn send(
        &self,
        request: Request<Body>,
    ) -> std::result::Result<(StatusCode, Bytes), ProviderError> {
        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, body))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ProviderError::Transport(e.to_string())),
            Err(_) => Err(ProviderError::Transport(format!(
                "Request timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
    ) -> std::result::Result<ProviderSession, ProviderError> {
        let body = serde_json::to_vec(&PasswordGrant {
            email: identity,
            password: credential,
        })
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint(TOKEN_PATH)?)
            .header("apikey", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let (status, body) = self.send(request).await?;
        debug!(status = status.as_u16(), "Token endpoint responded");

        match status {
            s if s.is_success() => {
                let token: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
                    ProviderError::Transport(format!("Malformed token response: {}", e))
                })?;
                let email = token.user.email.ok_or_else(|| {
                    ProviderError::Transport("Session has no user email".to_string())
                })?;
                Ok(ProviderSession::new(email, token.access_token))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(ProviderError::InvalidCredentials)
            }
            other => {
                warn!(status = other.as_u16(), "Unexpected token endpoint status");
                Err(ProviderError::Transport(format!(
                    "Unexpected status {}",
                    other
                )))
            }
        }
    }

    async fn revoke_session(
        &self,
        session: &ProviderSession,
    ) -> std::result::Result<(), ProviderError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint(LOGOUT_PATH)?)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", session.access_token.as_str()))
            .body(Body::empty())
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let (status, _) = self.send(request).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Transport(format!(
                "Logout returned status {}",
                status
            )))
        }
    }

    fn name(&self) -> &str {
        "gotrue"
    }
}
