//! Per-request classification and authorization
//!
//! [`authorize`] runs before every handler. It consults the route table once, rejects
//! unmatched requests, validates the credential for protected routes and records the
//! outcome as request extensions ([`RequestContext`] and [`RouteDecision`]). A rejected
//! request never reaches a handler, so no downstream call is made for it.

use crate::credential::{bearer_token, AdminIdentity};
use crate::gateway::AppState;
use crate::router::table::RouteDecision;
use crate::Error;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Identity and correlation data for one request.
///
/// Built fresh from the request's own headers; nothing here is shared with any other
/// request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Reused from `x-request-id` when the client sent one
    pub request_id: String,
    pub client_ip: Option<IpAddr>,
    /// Present only after a successful credential check
    pub identity: Option<AdminIdentity>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(crate::headers::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Only syntactically valid addresses are kept
        let client_ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            });

        Self {
            request_id,
            client_ip,
            identity: None,
        }
    }

    pub fn admin_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|identity| identity.admin_id)
    }
}

/// Classify, authorize and annotate the request.
pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mut context = RequestContext::from_headers(request.headers());

    let Some(decision) = state.routes.classify(&method, &path) else {
        warn!(request_id = %context.request_id, %method, %path, "unmatched route");
        return Error::BadRequest("Bad request".to_string()).into_response();
    };

    if decision.class.requires_credential() {
        let identity = bearer_token(request.headers())
            .and_then(|token| state.validator.validate(token));
        match identity {
            Ok(identity) => context.identity = Some(identity),
            Err(e) => {
                warn!(
                    request_id = %context.request_id,
                    route = decision.route,
                    class = decision.class.as_str(),
                    client_ip = ?context.client_ip,
                    code = e.code(),
                    "credential rejected"
                );
                return e.into_response();
            }
        }
    }

    debug!(
        request_id = %context.request_id,
        route = decision.route,
        class = decision.class.as_str(),
        admin_id = ?context.admin_id(),
        "request classified"
    );

    let request_id = context.request_id.clone();
    let route = decision.route;
    request.extensions_mut().insert(context);
    request.extensions_mut().insert::<RouteDecision>(decision);

    let response = next.run(request).await;

    info!(
        request_id = %request_id,
        route,
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}
