//! Deployment settings.
//!
//! Loaded from a YAML file; every field has a default so a missing file
//! yields a fully working configuration. All values are passed explicitly
//! into the store, connector, and reconciler at construction — there is no
//! process-wide implicit state.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Settings (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Tenant store file (JSON, written atomically).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Base URL of the remote codespaces API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Seconds between reconciliation passes. The first pass runs
    /// immediately on startup.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-request timeout; an exceeded call counts as a transient failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Inject the startup hook into the devcontainer config before starting
    /// a stopped environment.
    #[serde(default = "default_patch_on_start")]
    pub patch_on_start: bool,

    #[serde(default)]
    pub hook: HookSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tenants.json")
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    12
}

fn default_patch_on_start() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store_path: default_store_path(),
            api_base: default_api_base(),
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            patch_on_start: default_patch_on_start(),
            hook: HookSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// HookSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSettings {
    /// Command injected as the startup hook.
    #[serde(default = "default_hook_command")]
    pub command: String,

    /// Path of the configuration document inside the owning repository.
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Commit message prefix for configuration writes; the environment name
    /// is appended.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_hook_command() -> String {
    "bash system.sh".to_string()
}

fn default_config_path() -> String {
    ".devcontainer/devcontainer.json".to_string()
}

fn default_commit_message() -> String {
    "Update devcontainer.json".to_string()
}

impl Default for HookSettings {
    fn default() -> Self {
        HookSettings {
            command: default_hook_command(),
            config_path: default_config_path(),
            commit_message: default_commit_message(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Port for the liveness / registration HTTP server.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("respawn.yaml")).unwrap();
        assert_eq!(settings.interval_secs, 300);
        assert_eq!(settings.api_base, "https://api.github.com");
        assert!(settings.patch_on_start);
        assert_eq!(settings.hook.command, "bash system.sh");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("respawn.yaml");
        std::fs::write(&path, "interval_secs: 60\nhook:\n  command: ./warm-cache.sh\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.interval_secs, 60);
        assert_eq!(settings.hook.command, "./warm-cache.sh");
        assert_eq!(settings.hook.config_path, ".devcontainer/devcontainer.json");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn settings_roundtrip() {
        let settings = Settings::default();
        let yaml = serde_yaml::to_string(&settings).unwrap();
        let parsed: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.interval_secs, settings.interval_secs);
        assert_eq!(parsed.hook.command, settings.hook.command);
    }

    #[test]
    fn durations_are_derived_from_seconds() {
        let settings = Settings::default();
        assert_eq!(settings.interval(), Duration::from_secs(300));
        assert_eq!(settings.request_timeout(), Duration::from_secs(12));
    }
}
