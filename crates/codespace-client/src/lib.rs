//! `codespace-client` — typed client for the remote codespaces API.
//!
//! The reconciler in `respawn-core` drives everything through the
//! [`RemoteEnvironments`] trait; this crate provides both the trait and the
//! production HTTP implementation.
//!
//! # Architecture
//!
//! ```text
//! RemoteConnector          ← credential → client factory (one per deployment)
//!     │
//!     ▼
//! RemoteEnvironments       ← list / details / start / read+write config
//!     │
//!     ▼
//! CodespaceClient          ← reqwest, bearer-style token header,
//!                            contents API with blob-SHA version tokens
//! ```
//!
//! Error taxonomy ([`ClientError`]): `Auth` (credential rejected),
//! `Transient` (network / timeout / rate limit / 5xx), `NotFound`,
//! `Conflict` (stale version token on write), `Rejected` (remote said no,
//! raw status + body kept for diagnostics), `Decode`.

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::{RemoteConnector, RemoteEnvironments};
pub use client::{CodespaceClient, CodespaceConnector, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use types::{ConfigDocument, EnvironmentDetails, EnvironmentSnapshot, EnvironmentState};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClientError>;
