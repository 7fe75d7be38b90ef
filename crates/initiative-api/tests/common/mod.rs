//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use initiative_core::rng::DeterministicRng;
use initiative_core::store::{InMemoryStore, KeyValueStore};
use initiative_test_support::{SequenceRng, fixed_clock};
use tower::ServiceExt;
use uuid::Uuid;

use initiative_api::build_router;
use initiative_api::state::AppState;

/// Build the full app router over an in-memory store. Every encounter's
/// RNG replays `rolls` from the start.
pub fn build_test_app(rolls: Vec<u32>) -> Router {
    build_test_app_with_store(Arc::new(InMemoryStore::new()), rolls)
}

/// Build the full app router over `store`, as `main.rs` does.
pub fn build_test_app_with_store(store: Arc<dyn KeyValueStore>, rolls: Vec<u32>) -> Router {
    let rng = SequenceRng::new(rolls);
    let app_state = AppState::new(
        store,
        Arc::new(fixed_clock()),
        Arc::new(move || Box::new(rng.clone()) as Box<dyn DeterministicRng>),
    );
    build_router(app_state)
}

/// Create an encounter and return its id.
pub async fn create_encounter(app: Router) -> Uuid {
    let (status, json) = send(app, "POST", "/api/v1/encounters", None).await;
    assert_eq!(status, StatusCode::CREATED);
    json["state"]["encounter_id"].as_str().unwrap().parse().unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "DELETE", uri, None).await
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    // Extractor rejections answer in plain text.
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}
