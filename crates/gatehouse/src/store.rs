//! Durable per-device storage for the lockout record
//!
//! The record lives under two string keys so that any key/value medium can
//! back it. [`FileKeyValueStore`] keeps them in a small JSON file in the
//! user's data directory, which survives restarts and is scoped to the
//! device and user.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use gatehouse_core::LockoutState;
use tracing::debug;

use crate::error::{GateError, Result};

/// Key holding the failed-attempt counter (decimal integer)
pub const ATTEMPTS_KEY: &str = "admin_login_attempts";

/// Key holding the lockout expiry (epoch milliseconds)
pub const LOCKED_UNTIL_KEY: &str = "admin_lockout_until";

/// Minimal string key/value capability
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, lost on drop
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| GateError::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// JSON-file backed store
///
/// Every write rewrites the whole file through a temp file and rename.
pub struct FileKeyValueStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    /// Get the default store path
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gatehouse")
            .join("lockout.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|_| GateError::Store("file store lock poisoned".to_string()))
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            GateError::Store(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, &self.path)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock()?;
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// The lockout record mapped onto two keys of a [`KeyValueStore`]
#[derive(Clone)]
pub struct PersistedLockoutStore {
    backend: Arc<dyn KeyValueStore>,
}

impl PersistedLockoutStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Read the record; absent keys read as the zero state
    pub fn load(&self) -> Result<LockoutState> {
        let attempts = self.backend.get(ATTEMPTS_KEY)?;
        let locked_until = self.backend.get(LOCKED_UNTIL_KEY)?;

        let state = LockoutState::from_persisted(
            ATTEMPTS_KEY,
            attempts.as_deref(),
            LOCKED_UNTIL_KEY,
            locked_until.as_deref(),
        )?;
        Ok(state)
    }

    /// Write both keys; the zero state removes them instead
    pub fn save(&self, state: &LockoutState) -> Result<()> {
        if state.is_zero() {
            return self.reset();
        }

        self.backend.set(ATTEMPTS_KEY, &state.attempts_value())?;
        match state.locked_until_value() {
            Some(until) => self.backend.set(LOCKED_UNTIL_KEY, &until)?,
            None => self.backend.remove(LOCKED_UNTIL_KEY)?,
        }

        debug!(
            failed_attempts = state.failed_attempts,
            locked_until = ?state.locked_until,
            "Persisted lockout state"
        );
        Ok(())
    }

    /// Remove both keys
    pub fn reset(&self) -> Result<()> {
        self.backend.remove(ATTEMPTS_KEY)?;
        self.backend.remove(LOCKED_UNTIL_KEY)?;
        debug!("Cleared lockout state");
        Ok(())
    }
}
