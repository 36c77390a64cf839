//! Domain types for remote development environments.

use serde::Deserialize;

// ---------------------------------------------------------------------------
// EnvironmentState
// ---------------------------------------------------------------------------

/// Normalized lifecycle state of a remote environment.
///
/// The remote API reports state through a primary `state` field with a
/// `status` fallback, and the vocabulary is inconsistent across API versions
/// (`Available` vs `running`, `Shutdown` vs `stopped`). Everything collapses
/// into this three-value enum; anything unrecognized is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    Running,
    Stopped,
    Unknown,
}

impl EnvironmentState {
    /// Normalize a raw provider state string.
    ///
    /// `primary` is the `state` field, `fallback` the `status` field; the
    /// first one present wins. Neither present means `Unknown`.
    pub fn normalize(primary: Option<&str>, fallback: Option<&str>) -> Self {
        let raw = match primary.or(fallback) {
            Some(s) => s,
            None => return EnvironmentState::Unknown,
        };
        match raw.to_ascii_lowercase().as_str() {
            "available" | "running" => EnvironmentState::Running,
            "shutdown" | "stopped" => EnvironmentState::Stopped,
            _ => EnvironmentState::Unknown,
        }
    }

    /// Whether this state warrants a recovery attempt.
    ///
    /// Policy: `Unknown` is treated the same as `Stopped` — we would rather
    /// issue a redundant start (a remote-side no-op for a running
    /// environment) than leave a stopped one down. This is deliberately
    /// blunt: it also fires on transitional states like provisioning, which
    /// report neither `available` nor `shutdown`.
    pub fn needs_recovery(&self) -> bool {
        !matches!(self, EnvironmentState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentState::Running => "running",
            EnvironmentState::Stopped => "stopped",
            EnvironmentState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One environment as reported by a list call. Fetched fresh on every
/// reconciliation pass, never cached across passes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSnapshot {
    /// Environment name, unique within one tenant.
    pub name: String,
    pub state: EnvironmentState,
    /// Owning repository reference (`owner/repo`), when the listing carries it.
    pub repository: Option<String>,
    /// Raw provider status string, kept for diagnostics and notifications.
    pub raw_state: Option<String>,
}

/// Detail view of a single environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDetails {
    pub name: String,
    pub state: EnvironmentState,
    pub repository: Option<String>,
}

/// A configuration document read from the owning repository, together with
/// the opaque version token that must be presented on write.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub content: serde_json::Value,
    /// Optimistic-concurrency token (the contents-API blob SHA).
    pub version: String,
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct CodespacesPage {
    #[serde(default)]
    pub codespaces: Vec<RawCodespace>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCodespace {
    pub name: String,
    pub state: Option<String>,
    pub status: Option<String>,
    pub repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRepository {
    pub full_name: String,
}

impl RawCodespace {
    pub(crate) fn into_snapshot(self) -> EnvironmentSnapshot {
        let state = EnvironmentState::normalize(self.state.as_deref(), self.status.as_deref());
        EnvironmentSnapshot {
            name: self.name,
            state,
            repository: self.repository.map(|r| r.full_name),
            raw_state: self.state.or(self.status),
        }
    }

    pub(crate) fn into_details(self) -> EnvironmentDetails {
        let state = EnvironmentState::normalize(self.state.as_deref(), self.status.as_deref());
        EnvironmentDetails {
            name: self.name,
            state,
            repository: self.repository.map(|r| r.full_name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsFile {
    #[serde(default)]
    pub content: Option<String>,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsWriteResponse {
    pub content: ContentsWriteSha,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsWriteSha {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthenticatedUser {
    pub login: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_running_vocabulary() {
        assert_eq!(
            EnvironmentState::normalize(Some("Available"), None),
            EnvironmentState::Running
        );
        assert_eq!(
            EnvironmentState::normalize(Some("running"), None),
            EnvironmentState::Running
        );
    }

    #[test]
    fn normalize_stopped_vocabulary() {
        assert_eq!(
            EnvironmentState::normalize(Some("Shutdown"), None),
            EnvironmentState::Stopped
        );
        assert_eq!(
            EnvironmentState::normalize(Some("STOPPED"), None),
            EnvironmentState::Stopped
        );
    }

    #[test]
    fn normalize_prefers_primary_field() {
        assert_eq!(
            EnvironmentState::normalize(Some("Available"), Some("Shutdown")),
            EnvironmentState::Running
        );
    }

    #[test]
    fn normalize_falls_back_to_status() {
        assert_eq!(
            EnvironmentState::normalize(None, Some("Shutdown")),
            EnvironmentState::Stopped
        );
    }

    #[test]
    fn neither_field_present_is_unknown_and_needs_recovery() {
        let state = EnvironmentState::normalize(None, None);
        assert_eq!(state, EnvironmentState::Unknown);
        assert!(state.needs_recovery());
    }

    #[test]
    fn unrecognized_vocabulary_is_unknown() {
        let state = EnvironmentState::normalize(Some("Provisioning"), None);
        assert_eq!(state, EnvironmentState::Unknown);
        assert!(state.needs_recovery());
    }

    #[test]
    fn running_does_not_need_recovery() {
        assert!(!EnvironmentState::Running.needs_recovery());
        assert!(EnvironmentState::Stopped.needs_recovery());
    }

    #[test]
    fn snapshot_keeps_raw_state_for_diagnostics() {
        let raw = RawCodespace {
            name: "web-dev".into(),
            state: Some("Provisioning".into()),
            status: None,
            repository: Some(RawRepository {
                full_name: "acme/web".into(),
            }),
        };
        let snap = raw.into_snapshot();
        assert_eq!(snap.state, EnvironmentState::Unknown);
        assert_eq!(snap.raw_state.as_deref(), Some("Provisioning"));
        assert_eq!(snap.repository.as_deref(), Some("acme/web"));
    }
}
