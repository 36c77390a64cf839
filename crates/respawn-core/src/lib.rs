//! Core reconciliation engine for respawn.
//!
//! Periodically inspects every registered tenant's remote development
//! environments and brings stopped ones back up, injecting a startup hook
//! into their devcontainer configuration along the way.
//!
//! ```text
//! TenantStore ──► Reconciler ──► RemoteEnvironments (codespace-client)
//!                     │
//!                     └──► Notifier (one message per environment per pass)
//! ```

pub mod error;
pub mod event;
pub mod io;
pub mod notify;
pub mod patch;
pub mod reconciler;
pub mod settings;
pub mod store;

pub use error::{CoreError, Result};
pub use event::{Action, ReconcileEvent, StepOutcome};
pub use notify::{ChannelNotifier, Notification, Notifier, NotifyError, Severity, TracingNotifier};
pub use reconciler::Reconciler;
pub use settings::Settings;
pub use store::{Tenant, TenantStore};
