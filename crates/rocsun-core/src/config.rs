//! Application configuration management.
//!
//! This module handles loading and saving the console configuration, which
//! includes the backend base URL, session lifetime, paging defaults and the
//! credential backend.
//!
//! Configuration is stored at `~/.config/rocsun-admin/config.json`. Selected
//! values can be overridden with `ROCSUN_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "rocsun-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Session lifetime from login, in minutes.
const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;

const DEFAULT_PAGE_SIZE: u32 = 10;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the session mirror is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

impl CredentialBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Some(CredentialBackend::File),
            "keyring" => Some(CredentialBackend::Keyring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub session_ttl_minutes: i64,
    pub default_page_size: u32,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            default_page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::File,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config.sanitized())
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `ROCSUN_BASE_URL` and `ROCSUN_CREDENTIAL_BACKEND` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ROCSUN_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("ROCSUN_CREDENTIAL_BACKEND") {
            match CredentialBackend::parse(&raw) {
                Some(backend) => self.credential_backend = backend,
                None => warn!(value = %raw, "Unknown credential backend, keeping configured one"),
            }
        }
    }

    /// Replace nonsensical values with defaults.
    fn sanitized(mut self) -> Self {
        if self.session_ttl_minutes <= 0 {
            warn!(ttl = self.session_ttl_minutes, "Invalid session TTL, using default");
            self.session_ttl_minutes = DEFAULT_SESSION_TTL_MINUTES;
        }
        if self.default_page_size == 0 {
            self.default_page_size = DEFAULT_PAGE_SIZE;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        self
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.session_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("nope.json")).expect("load should succeed");
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let raw = r#"{"base_url":"https://admin.example.com","session_ttl_minutes":-5}"#;
        std::fs::write(&path, raw).unwrap();
        let config = Config::load_from(&path).expect("load should succeed");
        assert_eq!(config.base_url, "https://admin.example.com");
        assert_eq!(config.session_ttl_minutes, 30);

        let mut changed = config.clone();
        changed.last_username = Some("alice".to_string());
        changed.credential_backend = CredentialBackend::Keyring;
        changed.save_to(&path).expect("save should succeed");

        let reloaded = Config::load_from(&path).expect("reload should succeed");
        assert_eq!(reloaded.last_username.as_deref(), Some("alice"));
        assert_eq!(reloaded.credential_backend, CredentialBackend::Keyring);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ROCSUN_BASE_URL", " https://api.example.com "),
            ("ROCSUN_CREDENTIAL_BACKEND", "KEYRING"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
    }

    #[test]
    fn test_unknown_backend_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "ROCSUN_CREDENTIAL_BACKEND").then(|| "vault".to_string()));
        assert_eq!(config.credential_backend, CredentialBackend::File);
    }
}
