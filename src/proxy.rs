//! Downstream proxy
//!
//! One forwarding primitive shared by the router's passthrough routes and by every call
//! the graph resolver issues. The downstream target is chosen from the path prefix,
//! and the original path and query are appended verbatim to that service's base address.
//!
//! Downstream status codes are never reinterpreted: a 404 or 501 from the storage
//! service is an ordinary [`ProxyResponse`]. Only transport failures (connect, DNS,
//! timeout, truncated body) become an [`Error::UpstreamUnavailable`], which renders as
//! `502 {"message":"Bad Gateway"}`.
//!
//! # Example
//!
//! ```rust,no_run
//! use feedback_gateway::DownstreamProxy;
//! use std::time::Duration;
//!
//! # fn example() -> feedback_gateway::Result<()> {
//! let proxy = DownstreamProxy::builder()
//!     .admin_base_url("http://admin:8081")
//!     .feedback_base_url("http://feedback:8082")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::config::GatewayConfig;
use crate::{Error, Result};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const ADMIN_PREFIX: &str = "/api/admin";
const FEEDBACK_PREFIX: &str = "/api/feedback";

/// Downstream service a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    Admin,
    Feedback,
}

impl Upstream {
    /// Pick the service owning `path`.
    ///
    /// Prefixes match on a segment boundary, so `/api/administrators` belongs to
    /// neither service.
    pub fn from_path(path: &str) -> Result<Self> {
        if has_segment_prefix(path, ADMIN_PREFIX) {
            Ok(Upstream::Admin)
        } else if has_segment_prefix(path, FEEDBACK_PREFIX) {
            Ok(Upstream::Feedback)
        } else {
            Err(Error::BadRequest("Bad request".to_string()))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Upstream::Admin => "admin",
            Upstream::Feedback => "feedback",
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Methods the gateway forwards.
pub fn is_forwardable_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    )
}

/// A request to forward
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Original request path, forwarded unchanged
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    /// Headers already filtered by the forwarding policy
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn get(path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: None,
            headers,
            body: Bytes::new(),
        }
    }
}

/// Decoded downstream body
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyBody {
    Json(JsonValue),
    /// Body that is not valid JSON, kept as-is
    Text(String),
    Empty,
}

/// A downstream response, passed through to the caller unchanged
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: ProxyBody,
    pub duration: Duration,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        match self.body {
            ProxyBody::Json(value) => (self.status, Json(value)).into_response(),
            ProxyBody::Text(text) => (
                self.status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response(),
            ProxyBody::Empty => self.status.into_response(),
        }
    }
}

/// HTTP forwarder for the admin and feedback services
#[derive(Clone)]
pub struct DownstreamProxy {
    admin_base_url: String,
    feedback_base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for DownstreamProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamProxy")
            .field("admin_base_url", &self.admin_base_url)
            .field("feedback_base_url", &self.feedback_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DownstreamProxy {
    pub fn builder() -> DownstreamProxyBuilder {
        DownstreamProxyBuilder::default()
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::builder()
            .admin_base_url(config.admin_service_url.clone())
            .feedback_base_url(config.feedback_service_url.clone())
            .timeout(config.upstream_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
    }

    pub fn base_url(&self, upstream: Upstream) -> &str {
        match upstream {
            Upstream::Admin => &self.admin_base_url,
            Upstream::Feedback => &self.feedback_base_url,
        }
    }

    /// `base + path [+ ?query]`
    pub fn target_url(&self, upstream: Upstream, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}{}", self.base_url(upstream), path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Forward a request to the service owning its path.
    ///
    /// Unroutable prefixes and unsupported methods fail before any network I/O.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let upstream = Upstream::from_path(&request.path)?;
        if !is_forwardable_method(&request.method) {
            return Err(Error::BadRequest("Invalid method".to_string()));
        }

        let url = self.target_url(upstream, &request.path, request.query.as_deref());
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.unavailable(upstream, &request.method, &url, start, e))?;

        let status = response.status();
        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| self.unavailable(upstream, &request.method, &url, start, e))?;
        let body = decode_body(&body_bytes);
        let duration = start.elapsed();

        debug!(
            upstream = upstream.name(),
            status = status.as_u16(),
            latency_ms = duration.as_millis() as u64,
            "REST {} {} -> {} ({:?})",
            request.method,
            url,
            status,
            duration
        );

        Ok(ProxyResponse {
            status,
            body,
            duration,
        })
    }

    /// Convenience GET used by the graph resolver.
    pub async fn get(&self, path: &str, headers: HeaderMap) -> Result<ProxyResponse> {
        self.forward(ProxyRequest::get(path, headers)).await
    }

    fn unavailable(
        &self,
        upstream: Upstream,
        method: &Method,
        url: &str,
        start: Instant,
        err: reqwest::Error,
    ) -> Error {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else {
            "transport"
        };
        warn!(
            upstream = upstream.name(),
            kind,
            latency_ms = start.elapsed().as_millis() as u64,
            error = %err,
            "REST {} {} failed",
            method,
            url
        );
        Error::UpstreamUnavailable {
            upstream: upstream.name().to_string(),
            reason: format!("{kind}: {err}"),
        }
    }
}

/// JSON first, raw text when the body does not parse.
fn decode_body(bytes: &[u8]) -> ProxyBody {
    if bytes.is_empty() {
        return ProxyBody::Empty;
    }
    match serde_json::from_slice::<JsonValue>(bytes) {
        Ok(value) => ProxyBody::Json(value),
        Err(_) => ProxyBody::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Builder for [`DownstreamProxy`]
#[derive(Debug, Clone)]
pub struct DownstreamProxyBuilder {
    admin_base_url: String,
    feedback_base_url: String,
    timeout: Duration,
    connect_timeout: Duration,
}

impl Default for DownstreamProxyBuilder {
    fn default() -> Self {
        Self {
            admin_base_url: String::new(),
            feedback_base_url: String::new(),
            timeout: Duration::from_millis(crate::config::DEFAULT_UPSTREAM_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(crate::config::DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl DownstreamProxyBuilder {
    pub fn admin_base_url(mut self, url: impl Into<String>) -> Self {
        self.admin_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn feedback_base_url(mut self, url: impl Into<String>) -> Self {
        self.feedback_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whole-request bound, covering connect, headers and body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<DownstreamProxy> {
        if self.admin_base_url.is_empty() || self.feedback_base_url.is_empty() {
            return Err(Error::Config(
                "downstream proxy requires both service base URLs".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout.min(self.timeout))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            admin = %self.admin_base_url,
            feedback = %self.feedback_base_url,
            timeout_ms = self.timeout.as_millis() as u64,
            "Downstream proxy configured"
        );

        Ok(DownstreamProxy {
            admin_base_url: self.admin_base_url,
            feedback_base_url: self.feedback_base_url,
            timeout: self.timeout,
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> DownstreamProxy {
        DownstreamProxy::builder()
            .admin_base_url("http://admin:8081/")
            .feedback_base_url("http://feedback:8082")
            .build()
            .unwrap()
    }

    #[test]
    fn test_upstream_selection() {
        assert_eq!(Upstream::from_path("/api/admin").unwrap(), Upstream::Admin);
        assert_eq!(Upstream::from_path("/api/admin/3").unwrap(), Upstream::Admin);
        assert_eq!(
            Upstream::from_path("/api/feedback/").unwrap(),
            Upstream::Feedback
        );
        assert!(Upstream::from_path("/api/administrators").is_err());
        assert!(Upstream::from_path("/api/other").is_err());
        assert!(Upstream::from_path("/").is_err());
    }

    #[test]
    fn test_target_url_keeps_path_and_query() {
        let p = proxy();
        assert_eq!(
            p.target_url(Upstream::Admin, "/api/admin/", None),
            "http://admin:8081/api/admin/"
        );
        assert_eq!(
            p.target_url(Upstream::Feedback, "/api/feedback/4", Some("a=1&b=2")),
            "http://feedback:8082/api/feedback/4?a=1&b=2"
        );
        assert_eq!(
            p.target_url(Upstream::Feedback, "/api/feedback", Some("")),
            "http://feedback:8082/api/feedback"
        );
    }

    #[test]
    fn test_builder_requires_urls() {
        assert!(DownstreamProxy::builder()
            .admin_base_url("http://a")
            .build()
            .is_err());
    }

    #[test]
    fn test_decode_body_falls_back_to_text() {
        assert_eq!(
            decode_body(br#"{"id":1}"#),
            ProxyBody::Json(serde_json::json!({"id": 1}))
        );
        assert_eq!(
            decode_body(b"Feedback not found"),
            ProxyBody::Text("Feedback not found".into())
        );
        assert_eq!(decode_body(b""), ProxyBody::Empty);
    }

    #[test]
    fn test_forwardable_methods() {
        assert!(is_forwardable_method(&Method::GET));
        assert!(is_forwardable_method(&Method::DELETE));
        assert!(!is_forwardable_method(&Method::PATCH));
        assert!(!is_forwardable_method(&Method::OPTIONS));
    }

    #[tokio::test]
    async fn test_unroutable_prefix_fails_before_network() {
        // the base URLs do not resolve; reaching the network would yield a 502 instead
        let err = proxy()
            .get("/api/unknown/1", HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_invalid_method_fails_before_network() {
        let mut request = ProxyRequest::get("/api/admin/1", HeaderMap::new());
        request.method = Method::PATCH;
        let err = proxy().forward(request).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref m) if m == "Invalid method"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_bad_gateway() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = DownstreamProxy::builder()
            .admin_base_url(format!("http://{addr}"))
            .feedback_base_url(format!("http://{addr}"))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let err = proxy.get("/api/admin/1", HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "Bad Gateway");
    }
}
