//! HTTP implementation of the remote-environment client.
//!
//! Wraps the codespaces REST API: bearer-style token auth, JSON payloads,
//! and the repository contents API for configuration documents (base64
//! content + blob SHA as the optimistic-concurrency token).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::{RemoteConnector, RemoteEnvironments};
use crate::error::{ClientError, Result};
use crate::types::{
    AuthenticatedUser, CodespacesPage, ConfigDocument, ContentsFile, ContentsWriteResponse,
    EnvironmentDetails, EnvironmentSnapshot, RawCodespace,
};

/// Default per-request timeout; a call that exceeds it is a `Transient`
/// failure and will be retried by the next scheduled pass.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

// ---------------------------------------------------------------------------
// CodespaceClient
// ---------------------------------------------------------------------------

/// A [`RemoteEnvironments`] implementation bound to one tenant's credential.
#[derive(Debug, Clone)]
pub struct CodespaceClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl CodespaceClient {
    /// Build a standalone client with its own connection pool. When serving
    /// many tenants, prefer [`CodespaceConnector`] so the pool is shared.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transient(e.to_string()))?;
        Ok(Self::with_http(http, base_url, token))
    }

    fn with_http(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        CodespaceClient {
            http,
            base_url,
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(reqwest::Method::GET, path)
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Map a reqwest transport error (connect failure, timeout) to the taxonomy.
fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transient(err.to_string())
}

/// Map a non-success HTTP status to the taxonomy. `what` labels `NotFound`
/// errors with the resource being addressed.
async fn classify(resp: Response, what: &str) -> ClientError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => ClientError::Auth,
        404 => ClientError::NotFound(what.to_string()),
        409 => ClientError::Conflict,
        429 => ClientError::Transient(format!("rate limited: HTTP {status}")),
        s if s >= 500 => ClientError::Transient(format!("HTTP {status}")),
        s => ClientError::Rejected { status: s, body },
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))
}

/// Decode contents-API file data: base64 with embedded newlines, holding a
/// JSON document. Unparseable JSON degrades to an empty object so the
/// patcher can still install the hook into a fresh document.
fn decode_config_content(file: &ContentsFile) -> Value {
    let encoded: String = file
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = match BASE64.decode(encoded.as_bytes()) {
        Ok(b) => b,
        Err(e) => {
            debug!("config content is not valid base64: {e}");
            return json!({});
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!("config content is not valid JSON: {e}");
            json!({})
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteEnvironments impl
// ---------------------------------------------------------------------------

#[async_trait]
impl RemoteEnvironments for CodespaceClient {
    async fn list_environments(&self) -> Result<Vec<EnvironmentSnapshot>> {
        let resp = self.get("/user/codespaces").send().await.map_err(transport)?;
        if !resp.status().is_success() {
            return Err(classify(resp, "codespace listing").await);
        }
        let page: CodespacesPage = decode_json(resp).await?;
        Ok(page
            .codespaces
            .into_iter()
            .map(RawCodespace::into_snapshot)
            .collect())
    }

    async fn environment_details(&self, name: &str) -> Result<EnvironmentDetails> {
        let resp = self
            .get(&format!("/user/codespaces/{name}"))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(classify(resp, &format!("codespace {name}")).await);
        }
        let raw: RawCodespace = decode_json(resp).await?;
        Ok(raw.into_details())
    }

    async fn start_environment(&self, name: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/user/codespaces/{name}/start"))
            .json(&json!({}))
            .send()
            .await
            .map_err(transport)?;
        // The remote answers 202 Accepted; any success status counts.
        if !resp.status().is_success() {
            return Err(classify(resp, &format!("codespace {name}")).await);
        }
        Ok(())
    }

    async fn read_config_document(&self, repo: &str, path: &str) -> Result<ConfigDocument> {
        let resp = self
            .get(&format!("/repos/{repo}/contents/{path}"))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(classify(resp, &format!("{path} in {repo}")).await);
        }
        let file: ContentsFile = decode_json(resp).await?;
        Ok(ConfigDocument {
            content: decode_config_content(&file),
            version: file.sha,
        })
    }

    async fn write_config_document(
        &self,
        repo: &str,
        path: &str,
        content: &Value,
        expected_version: &str,
        message: &str,
    ) -> Result<String> {
        let rendered =
            serde_json::to_string_pretty(content).map_err(|e| ClientError::Decode(e.to_string()))?;
        let body = json!({
            "message": message,
            "content": BASE64.encode(rendered.as_bytes()),
            "sha": expected_version,
        });
        let resp = self
            .request(reqwest::Method::PUT, &format!("/repos/{repo}/contents/{path}"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(classify(resp, &format!("{path} in {repo}")).await);
        }
        let written: ContentsWriteResponse = decode_json(resp).await?;
        Ok(written.content.sha)
    }

    async fn authenticated_user(&self) -> Result<String> {
        let resp = self.get("/user").send().await.map_err(transport)?;
        if !resp.status().is_success() {
            return Err(classify(resp, "authenticated user").await);
        }
        let user: AuthenticatedUser = decode_json(resp).await?;
        Ok(user.login)
    }
}

// ---------------------------------------------------------------------------
// CodespaceConnector
// ---------------------------------------------------------------------------

/// Production [`RemoteConnector`]: one shared reqwest pool, per-tenant
/// clients created by binding a credential to it.
#[derive(Debug, Clone)]
pub struct CodespaceConnector {
    http: reqwest::Client,
    base_url: String,
}

impl CodespaceConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transient(e.to_string()))?;
        Ok(CodespaceConnector {
            http,
            base_url: base_url.into(),
        })
    }
}

impl RemoteConnector for CodespaceConnector {
    fn client_for(&self, credential: &str) -> Arc<dyn RemoteEnvironments> {
        Arc::new(CodespaceClient::with_http(
            self.http.clone(),
            self.base_url.clone(),
            credential,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> CodespaceClient {
        CodespaceClient::new(server.url(), "tok_test", DEFAULT_TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn list_parses_and_normalizes_states() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user/codespaces")
            .match_header("authorization", "token tok_test")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "codespaces": [
                        {"name": "web-dev", "state": "Available",
                         "repository": {"full_name": "acme/web"}},
                        {"name": "api-dev", "state": "Shutdown",
                         "repository": {"full_name": "acme/api"}},
                        {"name": "mystery"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let envs = client_for(&server).list_environments().await.unwrap();
        mock.assert_async().await;
        assert_eq!(envs.len(), 3);
        assert_eq!(envs[0].state, crate::EnvironmentState::Running);
        assert_eq!(envs[1].state, crate::EnvironmentState::Stopped);
        assert_eq!(envs[1].repository.as_deref(), Some("acme/api"));
        // Neither state field present: defaults to unknown.
        assert_eq!(envs[2].state, crate::EnvironmentState::Unknown);
    }

    #[tokio::test]
    async fn list_with_zero_environments_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/codespaces")
            .with_status(200)
            .with_body(r#"{"codespaces": []}"#)
            .create_async()
            .await;

        let envs = client_for(&server).list_environments().await.unwrap();
        assert!(envs.is_empty());
    }

    #[tokio::test]
    async fn rejected_credential_maps_to_auth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/codespaces")
            .with_status(401)
            .with_body(r#"{"message": "Bad credentials"}"#)
            .create_async()
            .await;

        let err = client_for(&server).list_environments().await.unwrap_err();
        assert!(matches!(err, ClientError::Auth));
    }

    #[tokio::test]
    async fn server_error_maps_to_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/codespaces")
            .with_status(502)
            .create_async()
            .await;

        let err = client_for(&server).list_environments().await.unwrap_err();
        assert!(matches!(err, ClientError::Transient(_)));
    }

    #[tokio::test]
    async fn connect_failure_maps_to_transient() {
        // Nothing listens on port 1.
        let client = CodespaceClient::new("http://127.0.0.1:1", "tok", DEFAULT_TIMEOUT).unwrap();
        let err = client.list_environments().await.unwrap_err();
        assert!(matches!(err, ClientError::Transient(_)));
    }

    #[tokio::test]
    async fn details_missing_environment_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/codespaces/gone")
            .with_status(404)
            .create_async()
            .await;

        let err = client_for(&server).environment_details("gone").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_accepts_202() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/user/codespaces/web-dev/start")
            .with_status(202)
            .with_body("{}")
            .create_async()
            .await;

        client_for(&server).start_environment("web-dev").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_failure_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/user/codespaces/web-dev/start")
            .with_status(400)
            .with_body(r#"{"message": "codespace is being deleted"}"#)
            .create_async()
            .await;

        let err = client_for(&server).start_environment("web-dev").await.unwrap_err();
        match err {
            ClientError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("being deleted"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_config_decodes_base64_with_newlines() {
        let doc = r#"{"postStartCommand": "npm ci"}"#;
        // The contents API wraps base64 at 60 columns; emulate a line break.
        let mut encoded = BASE64.encode(doc.as_bytes());
        encoded.insert(8, '\n');

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/web/contents/.devcontainer/devcontainer.json")
            .with_status(200)
            .with_body(
                serde_json::json!({"content": encoded, "sha": "abc123"}).to_string(),
            )
            .create_async()
            .await;

        let read = client_for(&server)
            .read_config_document("acme/web", ".devcontainer/devcontainer.json")
            .await
            .unwrap();
        assert_eq!(read.version, "abc123");
        assert_eq!(read.content["postStartCommand"], "npm ci");
    }

    #[tokio::test]
    async fn unparseable_config_degrades_to_empty_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/web/contents/.devcontainer/devcontainer.json")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "content": BASE64.encode(b"{not json"),
                    "sha": "abc123"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let read = client_for(&server)
            .read_config_document("acme/web", ".devcontainer/devcontainer.json")
            .await
            .unwrap();
        assert_eq!(read.content, serde_json::json!({}));
    }

    #[tokio::test]
    async fn missing_config_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/web/contents/.devcontainer/devcontainer.json")
            .with_status(404)
            .create_async()
            .await;

        let err = client_for(&server)
            .read_config_document("acme/web", ".devcontainer/devcontainer.json")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn write_sends_expected_version_and_returns_new_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/repos/acme/web/contents/.devcontainer/devcontainer.json")
            .match_body(Matcher::PartialJson(serde_json::json!({"sha": "abc123"})))
            .with_status(200)
            .with_body(r#"{"content": {"sha": "def456"}, "commit": {"sha": "fff"}}"#)
            .create_async()
            .await;

        let new_version = client_for(&server)
            .write_config_document(
                "acme/web",
                ".devcontainer/devcontainer.json",
                &serde_json::json!({"postStartCommand": "bash system.sh"}),
                "abc123",
                "Update devcontainer.json for web-dev",
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(new_version, "def456");
    }

    #[tokio::test]
    async fn stale_version_maps_to_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/repos/acme/web/contents/.devcontainer/devcontainer.json")
            .with_status(409)
            .with_body(r#"{"message": "is at def456 but expected abc123"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .write_config_document(
                "acme/web",
                ".devcontainer/devcontainer.json",
                &serde_json::json!({}),
                "abc123",
                "Update devcontainer.json for web-dev",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Conflict));
    }

    #[tokio::test]
    async fn authenticated_user_returns_login() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .match_header("authorization", "token tok_test")
            .with_status(200)
            .with_body(r#"{"login": "octocat"}"#)
            .create_async()
            .await;

        let login = client_for(&server).authenticated_user().await.unwrap();
        assert_eq!(login, "octocat");
    }

    #[tokio::test]
    async fn connector_shares_pool_across_credentials() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .match_header("authorization", "token tok_a")
            .with_status(200)
            .with_body(r#"{"login": "alice"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/user")
            .match_header("authorization", "token tok_b")
            .with_status(200)
            .with_body(r#"{"login": "bob"}"#)
            .create_async()
            .await;

        let connector = CodespaceConnector::new(server.url(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(connector.client_for("tok_a").authenticated_user().await.unwrap(), "alice");
        assert_eq!(connector.client_for("tok_b").authenticated_user().await.unwrap(), "bob");
    }
}
