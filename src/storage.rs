//! Key-value persistence of the last connection.
//!
//! The store is an external collaborator (browser local storage in the
//! original environment). Two keys are used:
//!
//! | Key | Value |
//! |-----|-------|
//! | `wallet_address` | Connected account |
//! | `last_connection_timestamp` | RFC 3339 UTC instant of the connect |
//!
//! A session is only reusable while it is younger than the configured
//! freshness window; anything older, or with an unreadable timestamp, is
//! deleted rather than reused.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::Address;

// ============================================================================
// Constants
// ============================================================================

/// Key holding the connected account.
pub const ADDRESS_KEY: &str = "wallet_address";

/// Key holding the connect timestamp.
pub const TIMESTAMP_KEY: &str = "last_connection_timestamp";

// ============================================================================
// KeyValueStore
// ============================================================================

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Reads `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Lists every key currently stored.
    fn keys(&self) -> Result<Vec<String>>;

    /// Returns `false` if the store is disabled in this environment.
    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// [`KeyValueStore`] persisted as a JSON object file.
///
/// Every mutation rewrites the file through a temporary sibling that is
/// renamed into place, so readers never observe a half-written document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file exists but cannot be read
    /// - [`Error::Json`] if the file is not a JSON object of strings
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk atomically.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::storage(format!("Failed to persist {}: {}", self.path.display(), e)))?;

        trace!(path = %self.path.display(), keys = entries.len(), "File store flushed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

// ============================================================================
// PersistedSession
// ============================================================================

/// Last successful connection, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// Connected account.
    pub address: Address,
    /// When the connection succeeded.
    pub timestamp: DateTime<Utc>,
}

impl PersistedSession {
    /// Creates a session record.
    #[inline]
    #[must_use]
    pub fn new(address: Address, timestamp: DateTime<Utc>) -> Self {
        Self { address, timestamp }
    }

    /// Returns how old the session is at `now`, zero if it lies in the future.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns `true` if the session is no older than `max_age` at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }
}

/// Result of reading the persisted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    /// Neither key stored.
    Absent,
    /// One key is missing or unreadable.
    Invalid,
    /// A complete session.
    Present(PersistedSession),
}

// ============================================================================
// SessionStore
// ============================================================================

/// Typed access to the persisted session keys.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Wraps a key-value store.
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Reads the persisted session.
    pub fn load(&self) -> Result<SessionLookup> {
        let Some(address) = self.store.get(ADDRESS_KEY)?.and_then(Address::new) else {
            if self.store.get(TIMESTAMP_KEY)?.is_some() {
                warn!("Session timestamp stored without an address");
                return Ok(SessionLookup::Invalid);
            }
            return Ok(SessionLookup::Absent);
        };

        let timestamp = self
            .store
            .get(TIMESTAMP_KEY)?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!(raw = %raw, error = %e, "Unreadable session timestamp");
                    None
                }
            });

        Ok(match timestamp {
            Some(timestamp) => SessionLookup::Present(PersistedSession::new(address, timestamp)),
            None => SessionLookup::Invalid,
        })
    }

    /// Writes `session`.
    pub fn save(&self, session: &PersistedSession) -> Result<()> {
        debug!(address = %session.address.short(), "Persisting session");
        self.store.set(ADDRESS_KEY, session.address.as_str())?;
        self.store.set(
            TIMESTAMP_KEY,
            &session.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    /// Deletes both session keys.
    pub fn clear(&self) -> Result<()> {
        debug!("Clearing persisted session");
        self.store.delete(ADDRESS_KEY)?;
        self.store.delete(TIMESTAMP_KEY)
    }

    /// Lists stored keys that look like provider traces.
    pub fn matching_keys(&self, matches: impl Fn(&str) -> bool) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|key| matches(key))
            .collect())
    }

    /// Returns `true` if the backing store is usable.
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }
}

// ============================================================================
// Tests
// ============================================================================
