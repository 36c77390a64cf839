//! The remote-environment client abstraction.
//!
//! The reconciler talks to the remote API exclusively through these traits,
//! so orchestration logic can be exercised against scripted in-memory
//! implementations while [`crate::CodespaceClient`] provides the real HTTP
//! transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ConfigDocument, EnvironmentDetails, EnvironmentSnapshot};

/// Operations against the remote environments of one tenant. Each instance
/// is bound to a single tenant's credential.
#[async_trait]
pub trait RemoteEnvironments: Send + Sync {
    /// List all environments owned by the credential. A tenant with zero
    /// environments yields an empty vec, not an error.
    async fn list_environments(&self) -> Result<Vec<EnvironmentSnapshot>>;

    /// Detail view of one environment. `NotFound` if it no longer exists.
    async fn environment_details(&self, name: &str) -> Result<EnvironmentDetails>;

    /// Request that an environment be started. The remote side accepts the
    /// request asynchronously (it returns "accepted", not "running"); the
    /// next scheduled pass observes the new state. Starting an
    /// already-running environment is a remote-side no-op.
    async fn start_environment(&self, name: &str) -> Result<()>;

    /// Read a configuration document plus its version token from the owning
    /// repository. `NotFound` if the file does not exist.
    async fn read_config_document(&self, repo: &str, path: &str) -> Result<ConfigDocument>;

    /// Write a configuration document conditional on `expected_version`
    /// still matching. `Conflict` means an intervening write happened and
    /// the caller must re-read before retrying. Returns the new version
    /// token.
    async fn write_config_document(
        &self,
        repo: &str,
        path: &str,
        content: &Value,
        expected_version: &str,
        message: &str,
    ) -> Result<String>;

    /// Login of the user the credential belongs to. Doubles as a cheap
    /// credential validity check at registration time.
    async fn authenticated_user(&self) -> Result<String>;
}

/// Hands out a [`RemoteEnvironments`] client for a given credential.
///
/// This is the seam the reconciler uses to obtain per-tenant clients without
/// knowing about HTTP; production code plugs in
/// [`crate::CodespaceConnector`].
pub trait RemoteConnector: Send + Sync {
    fn client_for(&self, credential: &str) -> Arc<dyn RemoteEnvironments>;
}
