//! Privileged desktop service backend.
//!
//! The desktop companion exposes a small HTTP API over a platform-local
//! channel (a Unix domain socket here; non-Unix builds report the backend
//! unavailable). The dialing is behind [`DesktopTransport`] so the HTTP
//! framing logic stays portable and testable with an in-memory transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, SecretError};
use crate::provider::SecretProvider;
use crate::types::{Secret, StoredSecret};

/// Provider name used in listings and errors.
const PROVIDER_NAME: &str = "desktop";

/// Per-call deadline for every request to the desktop service.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// A raw HTTP exchange result.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-agnostic request executor: the desktop client only knows
/// method, path, and body; how bytes reach the service is injected.
#[async_trait]
pub trait DesktopTransport: Send + Sync {
    /// Execute one HTTP exchange against the service.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse>;

    /// Cheap reachability hint, checked before spending a round-trip.
    fn endpoint_exists(&self) -> bool;
}

/// Dials the service over a Unix domain socket with HTTP/1 framing.
pub struct SocketTransport {
    socket_path: PathBuf,
}

impl SocketTransport {
    /// Transport over the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Transport over the default per-user socket path.
    pub fn default_socket() -> Self {
        let socket_path = toolgate_core::paths::desktop_socket()
            .unwrap_or_else(|_| std::env::temp_dir().join("toolgate-desktop.sock"));
        Self::new(socket_path)
    }
}

#[async_trait]
impl DesktopTransport for SocketTransport {
    #[cfg(unix)]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        use http_body_util::{BodyExt, Full};
        use hyper::body::Bytes;
        use hyper_util::rt::TokioIo;

        let stream = tokio::net::UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| SecretError::Backend(format!("dialing desktop socket: {e}")))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| SecretError::Backend(format!("HTTP handshake: {e}")))?;

        // The connection task finishes when the exchange completes.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("desktop connection closed with error: {e}");
            }
        });

        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header(http::header::HOST, "localhost");
        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| SecretError::Backend(format!("building request: {e}")))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| SecretError::Backend(format!("sending request: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| SecretError::Backend(format!("reading response: {e}")))?
            .to_bytes()
            .to_vec();

        Ok(HttpResponse { status, body })
    }

    #[cfg(not(unix))]
    async fn execute(
        &self,
        _method: Method,
        _path: &str,
        _body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        Err(SecretError::Unavailable(PROVIDER_NAME.to_string()))
    }

    fn endpoint_exists(&self) -> bool {
        cfg!(unix) && self.socket_path.exists()
    }
}

/// Structured error payload the service attaches to failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Thin client over the desktop service API.
pub struct DesktopClient {
    transport: Arc<dyn DesktopTransport>,
}

impl DesktopClient {
    /// Client over an injected transport.
    pub fn new(transport: Arc<dyn DesktopTransport>) -> Self {
        Self { transport }
    }

    /// Best-effort ping that keeps the service out of low-power mode
    /// while we talk to it. Failures are deliberately ignored.
    pub async fn make_busy(&self) {
        let _ = self
            .request(Method::POST, "/idle/make-busy", None)
            .await;
    }

    /// List stored secrets (names and provider tags only).
    pub async fn list_secrets(&self) -> Result<Vec<StoredSecret>> {
        let response = self.request(Method::GET, "/secrets", None).await?;
        let response = Self::ensure_success(response)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Create or update a secret.
    pub async fn set_secret(&self, secret: &Secret) -> Result<()> {
        let body = serde_json::to_vec(secret)?;
        let response = self.request(Method::POST, "/secrets", Some(body)).await?;
        Self::ensure_success(response)?;
        Ok(())
    }

    /// Delete a secret by name. A 404 maps to [`SecretError::NotFound`].
    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/secrets/{name}"), None)
            .await?;
        if response.status == 404 {
            return Err(SecretError::NotFound {
                name: name.to_string(),
                provider: PROVIDER_NAME.to_string(),
            });
        }
        Self::ensure_success(response)?;
        Ok(())
    }

    /// Fetch the opaque policy blob.
    pub async fn get_policy(&self) -> Result<String> {
        let response = self.request(Method::GET, "/policy", None).await?;
        let response = Self::ensure_success(response)?;
        let policy: String = serde_json::from_slice(&response.body)?;
        Ok(policy)
    }

    /// Replace the opaque policy blob.
    pub async fn set_policy(&self, policy: &str) -> Result<()> {
        let body = serde_json::to_vec(policy)?;
        let response = self.request(Method::POST, "/policy", Some(body)).await?;
        Self::ensure_success(response)?;
        Ok(())
    }

    fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(body)?)
    }

    /// One exchange under the per-call deadline.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        timeout(CALL_TIMEOUT, self.transport.execute(method, path, body))
            .await
            .map_err(|_| SecretError::Backend("desktop call deadline exceeded".to_string()))?
    }

    /// Translate non-2xx responses into errors carrying the status and,
    /// when present, the service's structured message.
    fn ensure_success(response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let detail = match Self::parse_json::<ErrorBody>(&response.body) {
            Ok(parsed) => parsed.message,
            Err(_) => String::from_utf8_lossy(&response.body).trim().to_string(),
        };
        Err(SecretError::Backend(format!(
            "HTTP {}: {detail}",
            response.status
        )))
    }
}

/// Secret backend delegating to the desktop service.
pub struct DesktopProvider {
    client: DesktopClient,
    transport: Arc<dyn DesktopTransport>,
    provider_tag: Option<String>,
}

impl DesktopProvider {
    /// Provider over the default socket transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(SocketTransport::default_socket()))
    }

    /// Provider over an injected transport (used in tests).
    pub fn with_transport(transport: Arc<dyn DesktopTransport>) -> Self {
        Self {
            client: DesktopClient::new(transport.clone()),
            transport,
            provider_tag: None,
        }
    }

    /// Tag secrets stored through this provider with an advisory provider
    /// string (e.g. `oauth/github`).
    pub fn with_provider_tag(mut self, tag: impl Into<String>) -> Self {
        self.provider_tag = Some(tag.into());
        self
    }

    /// Access the underlying client, e.g. for policy pass-through.
    pub fn client(&self) -> &DesktopClient {
        &self.client
    }
}

impl Default for DesktopProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretProvider for DesktopProvider {
    async fn get(&self, name: &str) -> Result<String> {
        // The service lists names but never returns values, so resolving
        // through this backend is impossible; reporting NotFound lets the
        // chain fall through to a backend that can produce the value.
        Err(SecretError::NotFound {
            name: name.to_string(),
            provider: PROVIDER_NAME.to_string(),
        })
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.client.make_busy().await;
        self.client
            .set_secret(&Secret {
                name: name.to_string(),
                provider: self.provider_tag.clone().unwrap_or_default(),
                value: value.to_string(),
            })
            .await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.client.make_busy().await;
        self.client.delete_secret(name).await
    }

    async fn list(&self) -> Result<Vec<StoredSecret>> {
        self.client.make_busy().await;
        self.client.list_secrets().await
    }

    async fn is_available(&self) -> bool {
        // The only probe with I/O cost: socket presence plus a live list
        // round-trip, paid on every chain traversal.
        self.transport.endpoint_exists() && self.client.list_secrets().await.is_ok()
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// In-memory transport recording exchanges and serving canned routes.
    struct FakeTransport {
        secrets: Mutex<Vec<Secret>>,
        requests: Mutex<Vec<(Method, String)>>,
        reachable: bool,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                secrets: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                reachable: true,
            }
        }

        async fn requests(&self) -> Vec<(Method, String)> {
            self.requests.lock().await.clone()
        }

        fn ok_json(value: serde_json::Value) -> HttpResponse {
            HttpResponse {
                status: 200,
                body: serde_json::to_vec(&value).unwrap(),
            }
        }
    }

    #[async_trait]
    impl DesktopTransport for FakeTransport {
        async fn execute(
            &self,
            method: Method,
            path: &str,
            body: Option<Vec<u8>>,
        ) -> Result<HttpResponse> {
            self.requests
                .lock()
                .await
                .push((method.clone(), path.to_string()));

            match (method.as_str(), path) {
                ("POST", "/idle/make-busy") => Ok(HttpResponse {
                    status: 200,
                    body: Vec::new(),
                }),
                ("GET", "/secrets") => {
                    let listing: Vec<StoredSecret> = self
                        .secrets
                        .lock()
                        .await
                        .iter()
                        .map(|s| StoredSecret {
                            name: s.name.clone(),
                            provider: s.provider.clone(),
                        })
                        .collect();
                    Ok(Self::ok_json(serde_json::to_value(listing).unwrap()))
                }
                ("POST", "/secrets") => {
                    let secret: Secret = serde_json::from_slice(&body.unwrap()).unwrap();
                    let mut secrets = self.secrets.lock().await;
                    secrets.retain(|s| s.name != secret.name);
                    secrets.push(secret);
                    Ok(HttpResponse {
                        status: 201,
                        body: Vec::new(),
                    })
                }
                ("DELETE", path) => {
                    let name = path.trim_start_matches("/secrets/");
                    let mut secrets = self.secrets.lock().await;
                    let before = secrets.len();
                    secrets.retain(|s| s.name != name);
                    if secrets.len() == before {
                        Ok(HttpResponse {
                            status: 404,
                            body: br#"{"message":"no such secret"}"#.to_vec(),
                        })
                    } else {
                        Ok(HttpResponse {
                            status: 200,
                            body: Vec::new(),
                        })
                    }
                }
                ("GET", "/policy") => Ok(Self::ok_json(serde_json::json!("default-policy"))),
                ("POST", "/policy") => Ok(HttpResponse {
                    status: 200,
                    body: Vec::new(),
                }),
                _ => Ok(HttpResponse {
                    status: 500,
                    body: br#"{"message":"unexpected route"}"#.to_vec(),
                }),
            }
        }

        fn endpoint_exists(&self) -> bool {
            self.reachable
        }
    }

    #[tokio::test]
    async fn test_get_always_reports_not_found() {
        let provider = DesktopProvider::with_transport(Arc::new(FakeTransport::new()));
        let result = provider.get("anything").await;
        assert!(matches!(result, Err(SecretError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_set_posts_secret_with_tag() {
        let transport = Arc::new(FakeTransport::new());
        let provider = DesktopProvider::with_transport(transport.clone())
            .with_provider_tag("oauth/github");

        provider.set("token", "value").await.unwrap();

        let secrets = transport.secrets.lock().await;
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].provider, "oauth/github");
        assert_eq!(secrets[0].value, "value");
    }

    #[tokio::test]
    async fn test_calls_ping_before_mutations() {
        let transport = Arc::new(FakeTransport::new());
        let provider = DesktopProvider::with_transport(transport.clone());

        provider.set("x", "v").await.unwrap();

        let requests = transport.requests().await;
        assert_eq!(requests[0], (Method::POST, "/idle/make-busy".to_string()));
        assert_eq!(requests[1], (Method::POST, "/secrets".to_string()));
    }

    #[tokio::test]
    async fn test_delete_missing_maps_404_to_not_found() {
        let provider = DesktopProvider::with_transport(Arc::new(FakeTransport::new()));
        let result = provider.delete("ghost").await;
        assert!(matches!(result, Err(SecretError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_returns_entries() {
        let transport = Arc::new(FakeTransport::new());
        let provider = DesktopProvider::with_transport(transport.clone());
        provider.set("a", "1").await.unwrap();
        provider.set("b", "2").await.unwrap();

        let entries = provider.list().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_error_body_message_surfaces() {
        struct AlwaysError;

        #[async_trait]
        impl DesktopTransport for AlwaysError {
            async fn execute(
                &self,
                _method: Method,
                _path: &str,
                _body: Option<Vec<u8>>,
            ) -> Result<HttpResponse> {
                Ok(HttpResponse {
                    status: 503,
                    body: br#"{"message":"backend restarting"}"#.to_vec(),
                })
            }

            fn endpoint_exists(&self) -> bool {
                true
            }
        }

        let client = DesktopClient::new(Arc::new(AlwaysError));
        let err = client.list_secrets().await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("backend restarting"));
    }

    #[tokio::test]
    async fn test_availability_requires_live_roundtrip() {
        let transport = Arc::new(FakeTransport::new());
        let provider = DesktopProvider::with_transport(transport);
        assert!(provider.is_available().await);

        let unreachable = Arc::new(FakeTransport {
            secrets: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            reachable: false,
        });
        let provider = DesktopProvider::with_transport(unreachable);
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn test_policy_roundtrip() {
        let transport = Arc::new(FakeTransport::new());
        let client = DesktopClient::new(transport);
        client.set_policy("{}").await.unwrap();
        assert_eq!(client.get_policy().await.unwrap(), "default-policy");
    }
}
