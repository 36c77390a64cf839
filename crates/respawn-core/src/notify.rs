//! Notification boundary.
//!
//! The reconciler reports every terminal per-environment outcome through a
//! [`Notifier`]. Delivery is best-effort: a failed send is logged by the
//! caller and never aborts reconciliation. The chat front end consuming the
//! notifications lives outside this crate; [`ChannelNotifier`] is the handoff
//! point, [`TracingNotifier`] the default sink when no front end is attached.

use thiserror::Error;
use tokio::sync::mpsc;

/// How loud the front end should be about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One message for one notification target. `text` is plain text with
/// lightweight `*emphasis*` / `` `code` `` markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub chat_id: i64,
    pub text: String,
    pub severity: Severity,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
    fn notify(&self, note: Notification) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// ChannelNotifier
// ---------------------------------------------------------------------------

/// Queues notifications on an unbounded channel for an external consumer.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelNotifier { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, note: Notification) -> Result<(), NotifyError> {
        self.tx
            .send(note)
            .map_err(|_| NotifyError("notification channel closed".to_string()))
    }
}

// ---------------------------------------------------------------------------
// TracingNotifier
// ---------------------------------------------------------------------------

/// Logs notifications instead of delivering them.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, note: Notification) -> Result<(), NotifyError> {
        match note.severity {
            Severity::Info => tracing::info!(chat_id = note.chat_id, "{}", note.text),
            Severity::Warning => tracing::warn!(chat_id = note.chat_id, "{}", note.text),
            Severity::Error => tracing::error!(chat_id = note.chat_id, "{}", note.text),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
