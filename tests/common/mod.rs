//! Shared harness: an in-process storage service and a gateway pointed at it.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use feedback_gateway::{CredentialValidator, Gateway, GatewayConfig, SessionClaims};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;

pub const SECRET: &str = "integration-secret";
pub const ANONYMIZED: &str = "<Anonymized for deletion>";

#[derive(Debug, Clone)]
struct AdminRow {
    id: i64,
    email: String,
    is_deleted: bool,
}

#[derive(Debug, Clone)]
struct FeedbackRow {
    id: i64,
    name: Option<String>,
    email: Option<String>,
    text: String,
    submission_date: String,
    is_deleted: bool,
}

#[derive(Debug, Clone)]
struct ActionRow {
    id: i64,
    admin_id: i64,
    feedback_id: i64,
    comment: String,
    action_date: String,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    admins: Vec<AdminRow>,
    feedback: Vec<FeedbackRow>,
    actions: Vec<ActionRow>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct MockState {
    store: Mutex<Store>,
    hits: Mutex<HashMap<String, usize>>,
    delays: Mutex<HashMap<String, Duration>>,
    admin_headers: Mutex<Vec<Option<String>>>,
    request_ids: Mutex<Vec<Option<String>>>,
}

/// Storage service double with soft-delete semantics, per-path hit counters and
/// injectable per-path delays.
#[derive(Clone)]
pub struct MockStorage {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockStorage {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/feedback", post(create_feedback))
            .route("/api/feedback/", post(create_feedback))
            .route(
                "/api/feedback/{id}",
                get(get_feedback).put(update_feedback).delete(delete_feedback),
            )
            .route("/api/admin/", post(create_admin))
            .route("/api/admin/check", post(check_admin))
            .route("/api/admin/feedbackonly", get(all_feedback))
            .route("/api/admin/feedback/{id}/action", get(feedback_actions))
            .route("/api/admin/action/{id}", get(get_action))
            .route("/api/admin/{id}", get(get_admin))
            .route("/api/admin/{id}/action", get(admin_actions))
            .route("/api/admin/{id}/feedback/{feedback_id}", post(create_action))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .layer(CompressionLayer::new())
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn seed_admin(&self, email: &str) -> i64 {
        let mut store = self.state.store.lock();
        let id = store.next_id();
        store.admins.push(AdminRow {
            id,
            email: email.to_string(),
            is_deleted: false,
        });
        id
    }

    pub fn seed_feedback(&self, name: Option<&str>, email: Option<&str>, text: &str) -> i64 {
        let mut store = self.state.store.lock();
        let id = store.next_id();
        store.feedback.push(FeedbackRow {
            id,
            name: name.map(String::from),
            email: email.map(String::from),
            text: text.to_string(),
            submission_date: "2024-05-01 10:00:00".to_string(),
            is_deleted: false,
        });
        id
    }

    pub fn seed_action(&self, admin_id: i64, feedback_id: i64, comment: &str) -> i64 {
        let mut store = self.state.store.lock();
        let id = store.next_id();
        store.actions.push(ActionRow {
            id,
            admin_id,
            feedback_id,
            comment: comment.to_string(),
            action_date: "2024-05-02 09:30:00".to_string(),
        });
        id
    }

    /// Drop an admin row outright so lookups by its id return 404.
    pub fn remove_admin(&self, id: i64) {
        self.state.store.lock().admins.retain(|a| a.id != id);
    }

    pub fn set_delay(&self, path: &str, delay: Duration) {
        self.state.delays.lock().insert(path.to_string(), delay);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().values().sum()
    }

    /// `x-admin-id` values seen, one per request, in arrival order.
    pub fn admin_headers(&self) -> Vec<Option<String>> {
        self.state.admin_headers.lock().clone()
    }

    pub fn request_ids(&self) -> Vec<Option<String>> {
        self.state.request_ids.lock().clone()
    }
}

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let (admin, request_id) = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        (header("x-admin-id"), header("x-request-id"))
    };

    *state.hits.lock().entry(path.clone()).or_default() += 1;
    state.admin_headers.lock().push(admin);
    state.request_ids.lock().push(request_id);

    let delay = state.delays.lock().get(&path).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    next.run(request).await
}

fn is_admin(headers: &HeaderMap) -> bool {
    headers.contains_key("x-admin-id")
}

fn feedback_json(row: &FeedbackRow) -> Value {
    json!({
        "feedback_id": row.id,
        "submission_date": row.submission_date,
        "name": row.name,
        "email": row.email,
        "text": row.text,
        "isDeleted": if row.is_deleted { 1 } else { 0 },
    })
}

fn admin_json(row: &AdminRow) -> Value {
    json!({ "adminId": row.id, "email": row.email, "isDeleted": row.is_deleted })
}

fn action_json(row: &ActionRow) -> Value {
    json!({
        "actionId": row.id,
        "adminId": row.admin_id,
        "feedbackId": row.feedback_id,
        "comment": row.comment,
        "actionDate": row.action_date,
    })
}

async fn create_feedback(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let Some(text) = body["text"].as_str() else {
        return (StatusCode::BAD_REQUEST, "Text cannot be null").into_response();
    };
    let mut store = state.store.lock();
    let id = store.next_id();
    store.feedback.push(FeedbackRow {
        id,
        name: body["name"].as_str().map(String::from),
        email: body["email"].as_str().map(String::from),
        text: text.to_string(),
        submission_date: "2024-05-01 10:00:00".to_string(),
        is_deleted: false,
    });
    (StatusCode::CREATED, Json(json!({ "feedback_id": id }))).into_response()
}

async fn get_feedback(
    State(state): State<Arc<MockState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let store = state.store.lock();
    match store.feedback.iter().find(|f| f.id == id) {
        Some(row) if !row.is_deleted || is_admin(&headers) => Json(feedback_json(row)).into_response(),
        _ => (StatusCode::NOT_FOUND, "Feedback not found or deleted").into_response(),
    }
}

async fn update_feedback(
    State(state): State<Arc<MockState>>,
    Path(id): Path<i64>,
    body: axum::body::Bytes,
) -> Response {
    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "No data provided").into_response();
    };
    let mut store = state.store.lock();
    match store.feedback.iter_mut().find(|f| f.id == id && !f.is_deleted) {
        Some(row) => {
            if let Some(text) = body["text"].as_str() {
                row.text = text.to_string();
            }
            "Successfully updated feedback".into_response()
        }
        None => (StatusCode::NOT_FOUND, "Feedback not found or deleted").into_response(),
    }
}

async fn delete_feedback(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let mut store = state.store.lock();
    match store.feedback.iter_mut().find(|f| f.id == id && !f.is_deleted) {
        Some(row) => {
            row.is_deleted = true;
            row.name = Some(ANONYMIZED.to_string());
            row.email = Some(ANONYMIZED.to_string());
            "Successfully deleted feedback".into_response()
        }
        None => (StatusCode::NOT_FOUND, "Feedback not found or already deleted").into_response(),
    }
}

async fn create_admin(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let mut store = state.store.lock();
    if let Some(row) = store.admins.iter_mut().find(|a| a.email == email) {
        row.is_deleted = false;
        return Json(admin_json(row)).into_response();
    }
    let id = store.next_id();
    let row = AdminRow {
        id,
        email,
        is_deleted: false,
    };
    let body = admin_json(&row);
    store.admins.push(row);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn check_admin(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let store = state.store.lock();
    match store.admins.iter().find(|a| a.email == email && !a.is_deleted) {
        Some(row) => Json(admin_json(row)).into_response(),
        None => (StatusCode::NOT_FOUND, "Admin not found").into_response(),
    }
}

async fn all_feedback(State(state): State<Arc<MockState>>) -> Response {
    let store = state.store.lock();
    Json(store.feedback.iter().map(feedback_json).collect::<Vec<_>>()).into_response()
}

async fn feedback_actions(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let store = state.store.lock();
    let actions: Vec<Value> = store
        .actions
        .iter()
        .filter(|a| a.feedback_id == id)
        .map(action_json)
        .collect();
    Json(actions).into_response()
}

async fn admin_actions(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let store = state.store.lock();
    let actions: Vec<Value> = store
        .actions
        .iter()
        .filter(|a| a.admin_id == id)
        .map(action_json)
        .collect();
    Json(actions).into_response()
}

async fn get_action(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let store = state.store.lock();
    match store.actions.iter().find(|a| a.id == id) {
        Some(row) => Json(action_json(row)).into_response(),
        None => (StatusCode::NOT_FOUND, "Action not found").into_response(),
    }
}

async fn get_admin(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let store = state.store.lock();
    match store.admins.iter().find(|a| a.id == id) {
        Some(row) => Json(admin_json(row)).into_response(),
        None => (StatusCode::NOT_FOUND, "Admin not found").into_response(),
    }
}

async fn create_action(
    State(state): State<Arc<MockState>>,
    Path((admin_id, feedback_id)): Path<(i64, i64)>,
    Json(body): Json<Value>,
) -> Response {
    let comment = body["comment"].as_str().unwrap_or_default().to_string();
    let mut store = state.store.lock();
    if !store.admins.iter().any(|a| a.id == admin_id && !a.is_deleted) {
        return (StatusCode::NOT_FOUND, "Admin not found").into_response();
    }
    let id = store.next_id();
    let row = ActionRow {
        id,
        admin_id,
        feedback_id,
        comment,
        action_date: "2024-05-03 12:00:00".to_string(),
    };
    let body = action_json(&row);
    store.actions.push(row);
    (StatusCode::CREATED, Json(body)).into_response()
}

/// Gateway in front of `storage` (both services point at it).
pub fn gateway(storage: &MockStorage) -> (Router, CredentialValidator) {
    gateway_with(storage, |config| config)
}

pub fn gateway_with(
    storage: &MockStorage,
    tweak: impl FnOnce(GatewayConfig) -> GatewayConfig,
) -> (Router, CredentialValidator) {
    let config = tweak(GatewayConfig::new(storage.url(), storage.url(), SECRET));
    let gateway = Gateway::builder().with_config(config).build().unwrap();
    let validator = gateway.validator().clone();
    (gateway.into_router(), validator)
}

pub fn token(validator: &CredentialValidator, admin_id: Option<i64>) -> String {
    validator
        .issue(&SessionClaims {
            google_id: "google-1".into(),
            name: "Test Admin".into(),
            email: "admin@example.com".into(),
            admin_id,
            exp: 0,
        })
        .unwrap()
}

pub fn expired_token(validator: &CredentialValidator, admin_id: Option<i64>) -> String {
    validator
        .issue(&SessionClaims {
            google_id: "google-1".into(),
            name: "Test Admin".into(),
            email: "admin@example.com".into(),
            admin_id,
            exp: jsonwebtoken::get_current_timestamp() - 3600,
        })
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: axum::body::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(app: &Router, request: axum::http::Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> axum::http::Request<Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn graphql(app: &Router, bearer: &str, query: &str) -> TestResponse {
    send(
        app,
        request("POST", "/graphql", Some(bearer), Some(json!({ "query": query }))),
    )
    .await
}
