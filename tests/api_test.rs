mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use http_body_util::BodyExt;
use paperless_ocr_sync::config::AppConfig;
use paperless_ocr_sync::infrastructure::clients::Clients;
use paperless_ocr_sync::{AppState, create_app};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

struct TestApp {
    store: Arc<MockDocumentStore>,
    ocr: Arc<MockOcrEngine>,
    state: AppState,
    _scratch: tempfile::TempDir,
}

fn test_app(documents: Vec<paperless_ocr_sync::services::paperless::DocumentRecord>) -> TestApp {
    let scratch = tempfile::tempdir().unwrap();
    let store = MockDocumentStore::with_documents(documents);
    let ocr = MockOcrEngine::new();

    let mut config = AppConfig::development();
    config.scratch_dir = scratch.path().to_path_buf();

    let state = AppState {
        config,
        clients: Arc::new(MockClientProvider {
            clients: Some(Clients {
                documents: store.clone(),
                ocr: ocr.clone(),
            }),
        }),
        run_lock: Arc::new(Mutex::new(())),
    };

    TestApp {
        store,
        ocr,
        state,
        _scratch: scratch,
    }
}

async fn post_json(state: AppState, body: &str) -> (StatusCode, Value) {
    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process_document")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_process_document_without_existing_fields() {
    let app = test_app(vec![document(77, vec![])]);

    let (status, body) = post_json(app.state.clone(), r#"{"document_id": 77}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully processed document 77");

    let doc = app.store.document(77);
    assert_eq!(doc.custom_fields, vec![flag(json!(true))]);
    assert_eq!(doc.content, MockOcrEngine::text_for(77));
    assert!(scratch_is_empty(&app.state.config.scratch_dir));
}

#[tokio::test]
async fn test_missing_document_id_is_bad_request() {
    let app = test_app(vec![]);

    for body in [r#"{}"#, r#"{"document_id": 0}"#, r#"{"document_id": null}"#, "not json"] {
        let (status, response) = post_json(app.state.clone(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(
            response["error"],
            "Please provide a document_id in the request body"
        );
    }
    assert!(app.store.calls().is_empty());
}

#[tokio::test]
async fn test_missing_flag_field_is_server_error() {
    let app = test_app(vec![document(5, vec![])]);
    app.store.state.lock().unwrap().field_exists = false;

    let (status, body) = post_json(app.state.clone(), r#"{"document_id": 5}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Custom field 'Azure OCR Completed' not found");
    assert!(!app.store.calls().iter().any(|c| c.starts_with("download")));
}

#[tokio::test]
async fn test_each_failure_point_has_its_own_message() {
    let app = test_app(vec![document(5, vec![]), document(6, vec![]), document(7, vec![])]);
    {
        let mut state = app.store.state.lock().unwrap();
        state.fail_download.insert(5);
        state.fail_patch.insert(7);
    }
    app.ocr.respond(6, None);

    let (status, body) = post_json(app.state.clone(), r#"{"document_id": 5}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to download document 5");

    let (status, body) = post_json(app.state.clone(), r#"{"document_id": "6"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process document 6 with Azure OCR");

    let (status, body) = post_json(app.state.clone(), r#"{"document_id": 7}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to update document 7 in Paperless");

    assert!(scratch_is_empty(&app.state.config.scratch_dir));
}

#[tokio::test]
async fn test_secret_failure_is_server_error() {
    let app = test_app(vec![document(5, vec![])]);
    let state = AppState {
        clients: Arc::new(MockClientProvider { clients: None }),
        ..app.state.clone()
    };

    let (status, body) = post_json(state, r#"{"document_id": 5}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Error: "));
    assert!(message.contains("AZURE-KEY"));
    assert!(app.store.calls().is_empty());
}

#[tokio::test]
async fn test_health_and_request_id() {
    let app = test_app(vec![]);

    let response = create_app(app.state.clone())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["run_in_progress"], false);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_functions_host_path_is_routed() {
    let app = test_app(vec![document(9, vec![])]);

    let response = create_app(app.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/process_document")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"document_id": 9}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
