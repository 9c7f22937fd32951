//! Durable mirror of the current session.
//!
//! The token, its expiry and the cached profile are written and cleared as
//! one record so they can never disagree on disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use crate::models::Profile;

const SERVICE_NAME: &str = "rocsun-admin";

/// Keyring entry holding the session blob
const KEYRING_ENTRY: &str = "session";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    /// Serialized as ISO-8601.
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

pub trait CredentialStore: Send + Sync {
    /// Read the persisted session, `None` if nothing is stored.
    fn load(&self) -> Result<Option<StoredSession>>;

    fn save(&self, session: &StoredSession) -> Result<()>;

    /// Remove the persisted session. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;
}

// ============================================================================
// File backend
// ============================================================================

/// Stores the session as pretty JSON in the cache directory.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let session = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

// ============================================================================
// OS keychain backend
// ============================================================================

/// Stores the session blob in the OS keychain.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    entry: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::with_entry(SERVICE_NAME, KEYRING_ENTRY)
    }
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(service: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entry: entry.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.entry).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        match self.entry()?.get_password() {
            Ok(blob) => {
                let session =
                    serde_json::from_str(&blob).context("Failed to parse session from keychain")?;
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let blob = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&blob)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<StoredSession>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<StoredSession> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> StoredSession {
        StoredSession {
            token: "T1".to_string(),
            expires_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            profile: Profile::new("alice", Some("Alice".to_string())),
        }
    }

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::new(dir.path().join("cache"));

        assert_eq!(store.load().expect("load should succeed"), None);
        store.save(&sample()).expect("save should succeed");
        assert_eq!(store.load().expect("load should succeed"), Some(sample()));

        store.clear().expect("clear should succeed");
        assert_eq!(store.load().expect("load should succeed"), None);
        store.clear().expect("second clear should be a no-op");
    }

    #[test]
    fn test_file_store_expiry_is_iso8601() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.save(&sample()).expect("save should succeed");

        let raw = std::fs::read_to_string(dir.path().join(SESSION_FILE)).unwrap();
        assert!(raw.contains("2026-01-02T03:04:05Z"));
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryCredentialStore::new();
        let view = store.clone();
        store.save(&sample()).unwrap();
        assert_eq!(view.snapshot(), Some(sample()));
        view.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_keyring_store_roundtrip() {
        let store = KeyringCredentialStore::with_entry(
            "rocsun-admin-test",
            format!("session-{}", std::process::id()),
        );
        if let Err(e) = store.save(&sample()) {
            eprintln!("Skipping keyring round trip, no keychain available: {:#}", e);
            return;
        }

        let loaded = store.load();
        store.clear().expect("clear should succeed");
        assert_eq!(loaded.expect("load should succeed"), Some(sample()));
        assert_eq!(store.load().expect("load should succeed"), None);
    }
}
