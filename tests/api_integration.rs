//! HTTP surface tests
//!
//! Requests go through the full router with `oneshot`; the upstream is an
//! in-memory source and the cache lives in a temporary directory.

mod support;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use chat_template_cache::config::Settings;
use chat_template_cache::server::{create_app, AppState};
use chat_template_cache::TemplateManager;

use support::{instant_prefetcher, MockSource};

fn test_app(dir: &std::path::Path, source: Arc<MockSource>, api_key: Option<&str>) -> Router {
    let mut settings = Settings::default();
    settings.api.key = api_key.map(str::to_string);
    settings.cache.root_dir = dir.display().to_string();

    let manager = Arc::new(TemplateManager::with_source(
        dir,
        source,
        instant_prefetcher(dir),
    ));
    create_app(AppState::with_manager(settings, manager))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &[]), None);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["namespaces"].as_array().map(|a| a.len()), Some(2));
}

#[tokio::test]
async fn test_list_syncs_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new(4, &["zeta", "alpha"]);
    let app = test_app(dir.path(), source.clone(), None);

    let response = app
        .clone()
        .oneshot(get("/api/v1/templates/message"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["templates"][0]["key"], "alpha");
    assert_eq!(body["templates"][1]["key"], "zeta");

    // Token is current now, so the list endpoint is not hit again
    let response = app.oneshot(get("/api/v1/templates/message")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.list_calls(), 1);
}

#[tokio::test]
async fn test_unknown_kind_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &[]), None);

    let response = app.oneshot(get("/api/v1/templates/stickers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNKNOWN_TEMPLATE_KIND");
}

#[tokio::test]
async fn test_get_missing_template_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &[]), None);

    let response = app
        .oneshot(get("/api/v1/templates/notification/nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_key_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockSource::new(1, &[]);
    let app = test_app(dir.path(), source.clone(), None);

    let response = app
        .oneshot(get("/api/v1/templates/message/bad%3Fkey"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_TEMPLATE_KEY");
    assert_eq!(source.single_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_fetch_maps_to_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &["a"]), None);

    let response = app
        .oneshot(post_json(
            "/api/v1/templates/message/fetch",
            json!({"keys": ["a", "b"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "PARTIAL_FETCH");
}

#[tokio::test]
async fn test_reset_returns_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &["a"]), None);

    let response = app
        .clone()
        .oneshot(get("/api/v1/templates/message/a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/templates/message")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_render_downloads_missing_template() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &["greeting"]), None);

    let response = app
        .oneshot(post_json(
            "/api/v1/render/message",
            json!({
                "message": {
                    "message_id": 11,
                    "text": "hi",
                    "extended_payload": {
                        "message_template": {
                            "key": "greeting",
                            "variables": {"name": "Ada", "image": "https://cdn.example.com/a.png"}
                        }
                    }
                },
                "prefetch_images": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["result"]["result"], "template");
    assert_eq!(
        body["result"]["data"]["layout"]["body"]["items"][0]["text"],
        "Hello Ada"
    );
    assert_eq!(body["state"], "loaded");
    assert_eq!(body["images_ready"], true);
}

#[tokio::test]
async fn test_render_without_reload_asks_for_download() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &["greeting"]), None);

    let response = app
        .oneshot(post_json(
            "/api/v1/render/message",
            json!({
                "message": {
                    "message_id": 12,
                    "extended_payload": {"message_template": {"key": "greeting"}}
                },
                "reload": false
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["result"]["result"], "reload");
    assert_eq!(body["result"]["data"]["keys"][0], "greeting");
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), MockSource::new(1, &[]), Some("secret"));

    let response = app
        .clone()
        .oneshot(get("/api/v1/templates/message"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/templates/message")
                .header("X-API-Key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);

    // Health stays open
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
