//! Gateway HTTP surface
//!
//! Every request goes through [`crate::middleware::authorize`] and then a single
//! dispatcher that acts on the route decision: gateway-local routes are answered here,
//! everything else is forwarded to the downstream service owning the path.
//!
//! Dispatch goes through the route table rather than per-path axum routes, so `/x` and
//! `/x/` always reach the same handler.

pub mod table;

use crate::gateway::AppState;
use crate::graph::{playground_html, EntityFetcher, ALL_FEEDBACK_QUERY};
use crate::headers::stamp_identity;
use crate::health::{health_handler, root_handler};
use crate::middleware::{authorize, RequestContext};
use crate::proxy::{ProxyRequest, ProxyResponse};
use crate::{Error, Result};
use async_graphql_axum::GraphQLResponse;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::{middleware, Extension, Router};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use table::{LocalRoute, RouteDecision, RouteTarget};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Build the gateway's axum router.
pub fn build(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Extension(decision): Extension<RouteDecision>,
    request: Request,
) -> Response {
    match decision.target {
        RouteTarget::Local(LocalRoute::Root) => root_handler().await.into_response(),
        RouteTarget::Local(LocalRoute::Health) => health_handler().await.into_response(),
        RouteTarget::Local(LocalRoute::Playground) => {
            Html(playground_html("/graphql")).into_response()
        }
        RouteTarget::Local(LocalRoute::GraphQl) => {
            graphql_post(&state, &context, request).await.into_response()
        }
        RouteTarget::Local(LocalRoute::FeedbackGraph) => {
            feedback_graph(&state, &context, request.headers())
                .await
                .into_response()
        }
        RouteTarget::Forward => forward(&state, &context, &decision, request)
            .await
            .into_response(),
    }
}

/// Pass the request through to its downstream service.
async fn forward(
    state: &AppState,
    context: &RequestContext,
    decision: &RouteDecision,
    request: Request,
) -> Result<ProxyResponse> {
    let (parts, body) = request.into_parts();
    let body = read_body(body, &parts.headers, state.config.max_body_bytes).await?;
    if let Some(field) = decision.required_field {
        require_field(&body, field)?;
    }

    let mut headers = state.passthrough_headers.apply(&parts.headers);
    stamp_identity(&mut headers, &context.request_id, context.admin_id());

    state
        .proxy
        .forward(ProxyRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(String::from),
            headers,
            body,
        })
        .await
}

async fn graphql_post(
    state: &AppState,
    context: &RequestContext,
    request: Request,
) -> Result<GraphQLResponse> {
    let (parts, body) = request.into_parts();
    let body = read_body(body, &parts.headers, state.config.max_body_bytes).await?;
    let query: async_graphql::Request = serde_json::from_slice(&body)
        .map_err(|_| Error::BadRequest("Invalid GraphQL request".to_string()))?;

    let fetcher = fetcher_for(state, context, &parts.headers);
    Ok(state.schema.execute(query.data(fetcher)).await.into())
}

async fn feedback_graph(
    state: &AppState,
    context: &RequestContext,
    headers: &HeaderMap,
) -> GraphQLResponse {
    let query = async_graphql::Request::new(ALL_FEEDBACK_QUERY)
        .data(fetcher_for(state, context, headers));
    state.schema.execute(query).await.into()
}

fn fetcher_for(state: &AppState, context: &RequestContext, inbound: &HeaderMap) -> EntityFetcher {
    let mut headers = state.resolver_headers.apply(inbound);
    stamp_identity(&mut headers, &context.request_id, context.admin_id());
    EntityFetcher::new(state.proxy.clone(), state.resolver_paths.clone(), headers)
}

/// Buffer the inbound body, enforcing the size limit.
pub(crate) async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(Error::PayloadTooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buffered = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            debug!(error = %e, "inbound body stream failed");
            Error::BadRequest("Failed to read request body".to_string())
        })?;
        if buffered.len() + chunk.len() > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
        buffered.extend_from_slice(&chunk);
    }
    Ok(buffered.freeze())
}

/// Reject bodies that are not a JSON object carrying a non-empty `field`.
pub(crate) fn require_field(body: &[u8], field: &str) -> Result<()> {
    let parsed: Option<JsonValue> = serde_json::from_slice(body).ok();
    let present = parsed
        .as_ref()
        .and_then(JsonValue::as_object)
        .and_then(|object| object.get(field))
        .is_some_and(|value| !value.is_null() && value.as_str() != Some(""));

    if present {
        Ok(())
    } else {
        Err(Error::BadRequest(format!("{field} cannot be null")))
    }
}
