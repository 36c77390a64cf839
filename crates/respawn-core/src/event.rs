//! Reconciliation events.
//!
//! One event per (tenant, environment) per pass, summarizing what was
//! observed, what was attempted, and how each sub-step went. Events are
//! ephemeral: rendered into exactly one notification and dropped.

use codespace_client::EnvironmentState;

use crate::notify::Severity;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the reconciler decided to do for an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Start,
    PatchAndStart,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Start => "start",
            Action::PatchAndStart => "patch+start",
        }
    }
}

/// Outcome of one sub-step (config patch or start request). The two steps
/// are tracked independently: a patch failure never blocks the start.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded,
    /// Nothing to do; the reason is surfaced to the tenant.
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileEvent {
    pub tenant_id: String,
    pub environment: String,
    pub observed: EnvironmentState,
    /// Raw provider status string, when the remote reported one.
    pub raw_state: Option<String>,
    pub action: Action,
    pub patch: Option<StepOutcome>,
    pub start: Option<StepOutcome>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl ReconcileEvent {
    /// Event for an environment that is already running: nothing to do.
    pub fn healthy(tenant_id: &str, environment: &str, raw_state: Option<String>) -> Self {
        ReconcileEvent {
            tenant_id: tenant_id.to_string(),
            environment: environment.to_string(),
            observed: EnvironmentState::Running,
            raw_state,
            action: Action::None,
            patch: None,
            start: None,
        }
    }

    pub fn severity(&self) -> Severity {
        let failed = self.patch.as_ref().is_some_and(StepOutcome::is_failure)
            || self.start.as_ref().is_some_and(StepOutcome::is_failure);
        if failed {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    /// Render the chat message for this event. The status line shows the raw
    /// provider state when available so the tenant sees what the remote
    /// actually said.
    pub fn render(&self) -> String {
        let status = self
            .raw_state
            .as_deref()
            .unwrap_or(self.observed.as_str())
            .to_uppercase();
        let mut text = format!("🔍 Codespace: `{}`\nStatus: *{}*", self.environment, status);

        if self.action == Action::None {
            return text;
        }

        text.push_str("\n⚠️ Not running. Attempting restart...");
        if let Some(patch) = &self.patch {
            match patch {
                StepOutcome::Succeeded => {
                    text.push_str("\n🔧 Startup hook configured.");
                }
                StepOutcome::Skipped(reason) => {
                    text.push_str(&format!("\nℹ️ Startup hook skipped: {reason}."));
                }
                StepOutcome::Failed(reason) => {
                    text.push_str(&format!("\n❌ Config update failed: {reason}"));
                }
            }
        }
        match &self.start {
            Some(StepOutcome::Succeeded) => text.push_str("\n✅ Restart initiated."),
            Some(StepOutcome::Failed(reason)) => {
                text.push_str(&format!("\n❌ Restart failed.\nError: {reason}"));
            }
            Some(StepOutcome::Skipped(reason)) => {
                text.push_str(&format!("\nℹ️ Restart skipped: {reason}."));
            }
            None => {}
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped_event() -> ReconcileEvent {
        ReconcileEvent {
            tenant_id: "42".into(),
            environment: "web-dev".into(),
            observed: EnvironmentState::Stopped,
            raw_state: Some("Shutdown".into()),
            action: Action::Start,
            patch: None,
            start: Some(StepOutcome::Succeeded),
        }
    }

    #[test]
    fn healthy_event_renders_status_only() {
        let event = ReconcileEvent::healthy("42", "web-dev", Some("Available".into()));
        let text = event.render();
        assert!(text.contains("`web-dev`"));
        assert!(text.contains("*AVAILABLE*"));
        assert!(!text.contains("restart"));
        assert_eq!(event.severity(), Severity::Info);
        assert_eq!(event.action.as_str(), "none");
    }

    #[test]
    fn missing_raw_state_falls_back_to_normalized() {
        let mut event = stopped_event();
        event.raw_state = None;
        assert!(event.render().contains("*STOPPED*"));
    }

    #[test]
    fn successful_restart_renders_initiated() {
        let text = stopped_event().render();
        assert!(text.contains("Attempting restart"));
        assert!(text.contains("Restart initiated."));
    }

    #[test]
    fn failed_start_is_a_warning_with_reason() {
        let mut event = stopped_event();
        event.start = Some(StepOutcome::Failed("HTTP 400: busy".into()));
        assert_eq!(event.severity(), Severity::Warning);
        let text = event.render();
        assert!(text.contains("Restart failed."));
        assert!(text.contains("HTTP 400: busy"));
    }

    #[test]
    fn patch_failure_renders_but_start_success_still_shows() {
        let mut event = stopped_event();
        event.action = Action::PatchAndStart;
        event.patch = Some(StepOutcome::Failed("write conflicted".into()));
        let text = event.render();
        assert!(text.contains("Config update failed: write conflicted"));
        assert!(text.contains("Restart initiated."));
        assert_eq!(event.severity(), Severity::Warning);
        assert_eq!(event.action.as_str(), "patch+start");
    }

    #[test]
    fn skipped_patch_renders_reason() {
        let mut event = stopped_event();
        event.action = Action::PatchAndStart;
        event.patch = Some(StepOutcome::Skipped("startup hook already configured".into()));
        let text = event.render();
        assert!(text.contains("Startup hook skipped: startup hook already configured."));
        assert_eq!(event.severity(), Severity::Info);
    }
}
