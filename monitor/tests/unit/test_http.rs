//! HTTP client integration tests against an in-process server

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use openapi_client::models::{DeployRequest, DeployStatus};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use artmon::errors::MonitorError;
use artmon::http::artifactory::{ArtifactoryClient, Repository};
use artmon::http::deployments::{DeployService, DeployServiceClient};
use artmon::models::repository::RepositoryEntry;

const USER: &str = "monitor";
const PASSWORD: &str = "letmein";
const TOKEN: &str = "D3Pl0YT0Ken";

fn basic_auth_ok(headers: &HeaderMap) -> bool {
    let expected = format!("Basic {}", STANDARD.encode(format!("{}:{}", USER, PASSWORD)));
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn list_apps(headers: HeaderMap) -> impl IntoResponse {
    if !basic_auth_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "repo": "deploy-requests",
        "path": "/",
        "children": [
            {"uri": "/video", "folder": true},
            {"uri": "/notes.txt", "folder": false},
            {"uri": "/audio", "folder": true}
        ]
    }))
    .into_response()
}

async fn list_versions(headers: HeaderMap) -> impl IntoResponse {
    if !basic_auth_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "repo": "deploy-requests",
        "path": "/video",
        "children": [
            {"uri": "/1.0.0-21.deploy", "folder": false},
            {"uri": "/1.0.1-23.deploy", "folder": false},
            {"uri": "/1.0.1-23.txt", "folder": false},
            {"uri": "/archive", "folder": true}
        ]
    }))
    .into_response()
}

async fn garbled() -> impl IntoResponse {
    "<html>maintenance</html>"
}

async fn payload(headers: HeaderMap) -> impl IntoResponse {
    if !basic_auth_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    vec![0x1f_u8, 0x8b, 0x08, 0x00].into_response()
}

async fn submit(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["name"] == "empty" {
        return Json(json!({"deployID": ""})).into_response();
    }
    assert_eq!(body["imageVersion"], "1.0.1-23");
    assert_eq!(body["numInstances"], 2);
    assert!(body.get("etcd2Keys").is_none());
    Json(json!({"deployID": "abc-123"})).into_response()
}

async fn status(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let code = if id == "abc-123" { 2 } else { 3 };
    Json(json!({"deployID": id, "name": "video", "version": "1.0.1", "status": code})).into_response()
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/artifactory/api/storage/deploy-requests/", get(list_apps))
        .route("/artifactory/api/storage/deploy-requests/video/", get(list_versions))
        .route("/artifactory/api/storage/deploy-requests/garbled/", get(garbled))
        .route(
            "/artifactory/payloads/video/foo.com-development-video-1.0.1-23.tar.gz",
            get(payload),
        )
        .route("/v1.0/deploy", post(submit))
        .route("/v1.0/deploy/{id}", get(status));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn repository(base: &str, password: &str) -> ArtifactoryClient {
    ArtifactoryClient::new(
        &format!("{}/artifactory/api", base),
        &format!("{}/artifactory", base),
        USER,
        SecretString::from(password.to_string()),
    )
    .unwrap()
}

fn request(name: &str) -> DeployRequest {
    DeployRequest {
        name: name.to_string(),
        version: "1.0.1".to_string(),
        image_version: "1.0.1-23".to_string(),
        num_instances: 2,
        service_template: STANDARD.encode("[Unit]"),
        etcd2_keys: None,
    }
}

#[tokio::test]
async fn test_list_folders() {
    let base = spawn_server().await;
    let entries = repository(&base, PASSWORD)
        .list_entries("deploy-requests", true)
        .await
        .unwrap();
    assert_eq!(
        entries,
        vec![RepositoryEntry::folder("/video"), RepositoryEntry::folder("/audio")]
    );
}

#[tokio::test]
async fn test_list_deploy_files() {
    let base = spawn_server().await;
    let entries = repository(&base, PASSWORD)
        .list_entries("deploy-requests/video", false)
        .await
        .unwrap();
    assert_eq!(
        entries,
        vec![
            RepositoryEntry::file("/1.0.0-21.deploy"),
            RepositoryEntry::file("/1.0.1-23.deploy"),
        ]
    );
}

#[tokio::test]
async fn test_listing_errors() {
    let base = spawn_server().await;

    let err = repository(&base, "wrong")
        .list_entries("deploy-requests", true)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::HttpStatus { status: 401, .. }));

    let err = repository(&base, PASSWORD)
        .list_entries("deploy-requests/missing", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::HttpStatus { status: 404, .. }));

    let err = repository(&base, PASSWORD)
        .list_entries("deploy-requests/garbled", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::JsonError(_)));
}

#[tokio::test]
async fn test_fetch_archive_uses_raw_endpoint() {
    let base = spawn_server().await;
    let client = repository(&base, PASSWORD);

    let bytes = client
        .fetch_archive("payloads/video/foo.com-development-video-1.0.1-23.tar.gz")
        .await
        .unwrap();
    assert_eq!(bytes, vec![0x1f, 0x8b, 0x08, 0x00]);

    let err = client
        .fetch_archive("payloads/video/missing.tar.gz")
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_submit_and_status() {
    let base = spawn_server().await;
    let client = DeployServiceClient::new(&base, SecretString::from(TOKEN.to_string())).unwrap();

    let id = client.submit(&request("video")).await.unwrap();
    assert_eq!(id, "abc-123");
    assert_eq!(client.status(&id).await.unwrap(), DeployStatus::Success);
    assert_eq!(client.status("other").await.unwrap(), DeployStatus::Failed);
}

#[tokio::test]
async fn test_submit_errors() {
    let base = spawn_server().await;

    let client = DeployServiceClient::new(&base, SecretString::from(TOKEN.to_string())).unwrap();
    let err = client.submit(&request("empty")).await.unwrap_err();
    assert!(matches!(err, MonitorError::DeployServiceError(_)));

    let unauthorized =
        DeployServiceClient::new(&base, SecretString::from("nope".to_string())).unwrap();
    let err = unauthorized.submit(&request("video")).await.unwrap_err();
    assert!(matches!(err, MonitorError::HttpStatus { status: 401, .. }));
}
