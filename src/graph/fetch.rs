//! Per-request entity fetching with call collapsing.
//!
//! One [`EntityFetcher`] is created for every GraphQL request and handed to the
//! resolvers as request data. Identical GETs issued while resolving that request share
//! one downstream call: the first caller starts it, later callers await the same
//! shared future. The map is dropped with the request, so nothing outlives it and no
//! result is visible to another caller.

use super::types::{Action, Admin, Feedback};
use crate::proxy::{DownstreamProxy, ProxyBody, ProxyResponse};
use axum::http::{HeaderMap, StatusCode};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Downstream paths the resolver reads from. `{id}` is replaced with the entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverPaths {
    pub feedback: String,
    pub all_feedback: String,
    pub feedback_actions: String,
    pub admin: String,
    pub admin_actions: String,
    pub action: String,
}

impl Default for ResolverPaths {
    fn default() -> Self {
        Self {
            feedback: "/api/feedback/{id}".into(),
            all_feedback: "/api/admin/feedbackonly".into(),
            feedback_actions: "/api/admin/feedback/{id}/action".into(),
            admin: "/api/admin/{id}".into(),
            admin_actions: "/api/admin/{id}/action".into(),
            action: "/api/admin/action/{id}".into(),
        }
    }
}

fn render(template: &str, id: i64) -> String {
    template.replace("{id}", &id.to_string())
}

/// Why a lookup produced no value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GET {path} failed: {reason}")]
pub struct FetchFailure {
    pub path: String,
    /// Downstream status, absent for transport failures
    pub status: Option<u16>,
    pub reason: String,
}

/// Outcome of one downstream GET, cheap to clone across collapsed waiters
#[derive(Debug, Clone)]
pub enum Fetched {
    Found(Arc<JsonValue>),
    NotFound,
    Failed(FetchFailure),
}

type InFlight = Shared<BoxFuture<'static, Fetched>>;

pub type FetchResult<T> = Result<Option<T>, FetchFailure>;

pub struct EntityFetcher {
    proxy: DownstreamProxy,
    paths: Arc<ResolverPaths>,
    headers: HeaderMap,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl std::fmt::Debug for EntityFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFetcher")
            .field("paths", &self.paths)
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl EntityFetcher {
    /// `headers` are sent on every call; they should already carry the request id and
    /// the validated admin id.
    pub fn new(proxy: DownstreamProxy, paths: Arc<ResolverPaths>, headers: HeaderMap) -> Self {
        Self {
            proxy,
            paths,
            headers,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// GET `path`, joining an identical call already in flight for this request.
    pub async fn fetch(&self, path: String) -> Fetched {
        let call = {
            let mut in_flight = self.in_flight.lock();
            in_flight
                .entry(path)
                .or_insert_with_key(|path| {
                    let proxy = self.proxy.clone();
                    let headers = self.headers.clone();
                    let path = path.clone();
                    async move {
                        let result = proxy.get(&path, headers).await;
                        classify(path, result)
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };
        call.await
    }

    async fn one<T: DeserializeOwned>(&self, path: String) -> FetchResult<T> {
        match self.fetch(path.clone()).await {
            Fetched::Found(value) => decode(&path, &value).map(Some),
            Fetched::NotFound => Ok(None),
            Fetched::Failed(failure) => Err(failure),
        }
    }

    pub async fn feedback(&self, id: i64) -> FetchResult<Feedback> {
        self.one(render(&self.paths.feedback, id)).await
    }

    pub async fn all_feedback(&self) -> FetchResult<Vec<Feedback>> {
        self.one(self.paths.all_feedback.clone()).await
    }

    pub async fn feedback_actions(&self, feedback_id: i64) -> FetchResult<Vec<Action>> {
        self.one(render(&self.paths.feedback_actions, feedback_id))
            .await
    }

    pub async fn admin(&self, id: i64) -> FetchResult<Admin> {
        self.one(render(&self.paths.admin, id)).await
    }

    pub async fn admin_actions(&self, admin_id: i64) -> FetchResult<Vec<Action>> {
        self.one(render(&self.paths.admin_actions, admin_id)).await
    }

    pub async fn action(&self, id: i64) -> FetchResult<Action> {
        self.one(render(&self.paths.action, id)).await
    }
}

fn classify(path: String, result: crate::Result<ProxyResponse>) -> Fetched {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return Fetched::Failed(FetchFailure {
                path,
                status: None,
                reason: e.to_string(),
            })
        }
    };

    debug!(path = %path, status = response.status.as_u16(), "resolver fetch");

    match (response.status, response.body) {
        (StatusCode::NOT_FOUND, _) => Fetched::NotFound,
        (status, ProxyBody::Json(value)) if status.is_success() => {
            Fetched::Found(Arc::new(value))
        }
        (status, body) => Fetched::Failed(FetchFailure {
            path,
            status: Some(status.as_u16()),
            reason: match body {
                ProxyBody::Text(text) => text,
                ProxyBody::Json(value) => value.to_string(),
                ProxyBody::Empty => "empty body".to_string(),
            },
        }),
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: &JsonValue) -> Result<T, FetchFailure> {
    T::deserialize(value).map_err(|e| FetchFailure {
        path: path.to_string(),
        status: None,
        reason: format!("unexpected body: {e}"),
    })
}
