//! Gate configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{
    LockoutPolicy, DEFAULT_LOCKOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{GateError, Result};
use crate::gate::{AuthorizationGate, PrivilegedIdentity};
use crate::provider::{IdentityProvider, ProviderConfig};
use crate::store::{FileKeyValueStore, PersistedLockoutStore};
use crate::timer::LockoutTimer;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "GATEHOUSE_CONFIG";

/// Gate configuration, fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// The only identity admitted to the admin console
    pub privileged_identity: String,

    /// Compare the privileged identity ASCII case-insensitively. Leave off
    /// unless the provider itself treats identities that way.
    #[serde(default)]
    pub ignore_identity_case: bool,

    /// Consecutive failures before lockout
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lockout duration (seconds)
    #[serde(default = "default_lockout_secs")]
    pub lockout_duration_secs: u64,

    /// Lockout timer poll interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether provider outages count as failed attempts
    #[serde(default = "default_true")]
    pub count_transport_failures: bool,

    /// Path of the persisted lockout record
    #[serde(default = "FileKeyValueStore::default_path")]
    pub state_path: PathBuf,

    /// Identity provider connection
    pub provider: ProviderConfig,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_lockout_secs() -> u64 {
    DEFAULT_LOCKOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

impl GateConfig {
    /// Config with defaults for everything but the identity and provider
    pub fn new(privileged_identity: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            privileged_identity: privileged_identity.into(),
            ignore_identity_case: false,
            max_attempts: default_max_attempts(),
            lockout_duration_secs: default_lockout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            count_transport_failures: true,
            state_path: FileKeyValueStore::default_path(),
            provider,
        }
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("gatehouse")
                    .join("config.json")
            })
    }

    /// Load configuration from file, validating the lockout settings
    ///
    /// Provider settings are checked when a provider is built from them, so
    /// local status stays readable with a broken provider section.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate_lockout()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file carries the provider API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Validate everything, provider included
    pub fn validate(&self) -> Result<()> {
        self.validate_lockout()?;
        self.provider.validate()
    }

    /// Validate the settings that don't involve the provider
    pub fn validate_lockout(&self) -> Result<()> {
        self.privileged()?;
        self.policy()?;
        if self.poll_interval_ms == 0 {
            return Err(GateError::Config(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn privileged(&self) -> Result<PrivilegedIdentity> {
        Ok(PrivilegedIdentity::new(self.privileged_identity.as_str())?
            .ignoring_case(self.ignore_identity_case))
    }

    pub fn policy(&self) -> Result<LockoutPolicy> {
        LockoutPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.lockout_duration_secs),
        )
        .map_err(|e| GateError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The lockout record at `state_path`
    pub fn lockout_store(&self) -> Result<PersistedLockoutStore> {
        let backend = Arc::new(FileKeyValueStore::new(self.state_path.clone())?);
        Ok(PersistedLockoutStore::new(backend))
    }

    /// A timer over the lockout record, usable without any provider
    pub fn lockout_timer(&self) -> Result<LockoutTimer> {
        Ok(LockoutTimer::new(
            self.lockout_store()?,
            self.policy()?,
            Arc::new(SystemClock),
            self.poll_interval(),
        ))
    }

    /// Build a gate over the file store at `state_path` and the system clock
    pub fn build_gate(&self, provider: Arc<dyn IdentityProvider>) -> Result<AuthorizationGate> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(AuthorizationGate::new(
            self.policy()?,
            self.privileged()?,
            self.lockout_store()?,
            provider,
            clock,
        )?
        .with_transport_failures_counted(self.count_transport_failures)
        .with_poll_interval(self.poll_interval()))
    }
}
