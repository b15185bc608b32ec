//! Header forwarding rules
//!
//! Decides which inbound headers reach a downstream service. Two policies are used:
//!
//! - **Passthrough** ([`HeaderForwardingConfig::passthrough`]): used when the gateway
//!   forwards a client request verbatim. Everything is forwarded except hop-by-hop
//!   headers, `host`, `content-length` and the trusted identity header.
//! - **Resolver** ([`HeaderForwardingConfig::resolver`]): used for the GET calls the
//!   graph resolver issues on behalf of a query. Only an allowlist of auth and tracing
//!   headers is copied.
//!
//! In both cases the gateway then stamps `x-request-id` and, once a credential has been
//! validated, `x-admin-id` (see [`stamp_identity`]). A client can never supply
//! `x-admin-id` itself.

use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue};
use std::collections::HashSet;

/// Administrator id taken from a validated credential
pub const X_ADMIN_ID: &str = "x-admin-id";
/// Request correlation id
pub const X_REQUEST_ID: &str = "x-request-id";

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Configuration for copying inbound headers onto a downstream request.
///
/// ```rust
/// use feedback_gateway::HeaderForwardingConfig;
///
/// let config = HeaderForwardingConfig::new()
///     .forward("authorization")
///     .forward_with_prefix("x-b3-");
/// assert!(config.should_forward("X-B3-TraceId"));
/// assert!(!config.should_forward("cookie"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderForwardingConfig {
    /// Exact header names to forward (lowercase)
    headers: HashSet<String>,

    /// Header prefixes to forward (lowercase)
    prefixes: Vec<String>,

    /// Forward every header not excluded
    forward_all: bool,

    /// Never forwarded, even when `forward_all` or a prefix matches
    exclude: HashSet<String>,
}

impl HeaderForwardingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for verbatim request forwarding.
    pub fn passthrough() -> Self {
        Self::new()
            .forward_all_headers()
            .exclude_many(HOP_BY_HOP.iter().copied())
            .exclude("host")
            .exclude("content-length")
            .exclude("accept-encoding")
            .exclude(X_ADMIN_ID)
    }

    /// Policy for calls issued by the graph resolver.
    pub fn resolver() -> Self {
        Self::new()
            .forward("authorization")
            .forward(X_REQUEST_ID)
            .forward("x-correlation-id")
            .forward("traceparent")
            .forward("tracestate")
            .forward("accept-language")
            .forward_with_prefix("x-b3-")
    }

    /// Forward a specific header (case-insensitive).
    pub fn forward(mut self, header: impl Into<String>) -> Self {
        self.headers.insert(header.into().to_lowercase());
        self
    }

    /// Forward every header starting with `prefix` (case-insensitive).
    pub fn forward_with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into().to_lowercase());
        self
    }

    /// Forward everything that is not explicitly excluded.
    pub fn forward_all_headers(mut self) -> Self {
        self.forward_all = true;
        self
    }

    pub fn exclude(mut self, header: impl Into<String>) -> Self {
        self.exclude.insert(header.into().to_lowercase());
        self
    }

    pub fn exclude_many<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for header in headers {
            self.exclude.insert(header.into().to_lowercase());
        }
        self
    }

    /// Check whether a header name passes this policy.
    pub fn should_forward(&self, header_name: &str) -> bool {
        let name = header_name.to_lowercase();

        if self.exclude.contains(&name) {
            return false;
        }
        if self.forward_all || self.headers.contains(&name) {
            return true;
        }
        self.prefixes.iter().any(|prefix| name.starts_with(prefix))
    }

    /// Build the downstream header map from the inbound one.
    ///
    /// Headers named by the inbound `Connection` header are connection-scoped as well
    /// and are dropped along with the fixed hop-by-hop set.
    pub fn apply(&self, incoming: &HeaderMap) -> HeaderMap {
        let connection_scoped = connection_tokens(incoming);
        let mut out = HeaderMap::with_capacity(incoming.len());

        for (name, value) in incoming {
            let key = name.as_str();
            if connection_scoped.contains(key) || !self.should_forward(key) {
                continue;
            }
            out.append(name.clone(), value.clone());
        }
        out
    }
}

fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Overwrite the gateway-owned identity headers on an outgoing request.
///
/// `x-admin-id` is always removed first and only re-added from a validated identity.
pub fn stamp_identity(headers: &mut HeaderMap, request_id: &str, admin_id: Option<i64>) {
    headers.remove(X_ADMIN_ID);
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(X_REQUEST_ID), value);
    }
    if let Some(id) = admin_id {
        headers.insert(HeaderName::from_static(X_ADMIN_ID), HeaderValue::from(id));
    }
}
