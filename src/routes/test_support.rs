//! Router-level test harness: an in-memory store with one user per role.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::notify::MemoryNotifier;
use crate::routes::auth::create_access_token;
use crate::state::AppState;
use crate::store::ContentStore;

pub const TEST_PASSWORD: &str = "password123";

pub struct TestApp {
    pub state: AppState,
    pub notifier: Arc<MemoryNotifier>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        crate::create_app(self.state.clone())
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

/// Users: admin@, editor@ and jobs@example.test, all with [`TEST_PASSWORD`].
pub async fn test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let store = ContentStore::in_memory();
    // Minimum bcrypt cost keeps the suite fast.
    let hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
    for (email, name, role) in [
        ("admin@example.test", "Admin", "admin"),
        ("editor@example.test", "Editor", "editor"),
        ("jobs@example.test", "Recruiter", "jobs_manager"),
    ] {
        store
            .users
            .create(
                object(json!({ "email": email, "name": name, "role": role, "passwordHash": hash })),
                None,
            )
            .await
            .unwrap();
    }

    let notifier = Arc::new(MemoryNotifier::default());
    let config = AppConfig::for_tests(upload_dir.path().to_path_buf());
    let state = AppState::new(store, config).with_notifier(notifier.clone());
    TestApp {
        state,
        notifier,
        upload_dir,
    }
}

/// Access token for a seeded user.
pub async fn bearer(app: &TestApp, email: &str) -> String {
    let user = app.state.store.users.find_by_email(email).await.unwrap().unwrap();
    create_access_token(&app.state.config.jwt_secret, &user).unwrap()
}

pub async fn send_raw(router: Router, req: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send_raw(router, req).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap_or(Value::String(body))
    };
    (status, json)
}

pub async fn request_json(
    router: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(router, req).await
}

pub async fn post_json(
    router: Router,
    uri: &str,
    body: Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    request_json(router, Method::POST, uri, Some(body), token).await
}

pub async fn get_json(router: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    request_json(router, Method::GET, uri, None, token).await
}

pub async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
    send_raw(router, Request::get(uri).body(Body::empty()).unwrap()).await
}
