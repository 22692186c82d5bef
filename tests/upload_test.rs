use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use futures::stream;
use http_body_util::BodyExt;
use listing_uploads::config::AppConfig;
use listing_uploads::infrastructure::storage::setup_storage;
use listing_uploads::{AppState, create_app};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------listinguploads0123456789";
const MIB: usize = 1024 * 1024;

struct Part<'a> {
    field: &'a str,
    file_name: Option<&'a str>,
    content_type: &'a str,
    data: Vec<u8>,
}

impl<'a> Part<'a> {
    fn file(field: &'a str, file_name: &'a str, content_type: &'a str, data: &[u8]) -> Self {
        Self {
            field,
            file_name: Some(file_name),
            content_type,
            data: data.to_vec(),
        }
    }

    fn text(field: &'a str, value: &str) -> Self {
        Self {
            field,
            file_name: None,
            content_type: "text/plain",
            data: value.as_bytes().to_vec(),
        }
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file_name {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    part.field, name, part.content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.field)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn setup_app(config: AppConfig) -> Router {
    let _ = tracing_subscriber::fmt::try_init();
    let storage = setup_storage(&config).await.unwrap();
    create_app(AppState::new(config, storage))
}

async fn send_multipart(app: &Router, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Non-JSON body with status {}: {}",
            status,
            String::from_utf8_lossy(&body)
        )
    });
    (status, json)
}

async fn post_upload(app: &Router, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
    send_multipart(app, uri, Body::from(multipart_body(parts))).await
}

/// Sends the body in 64 KiB frames, the way a client streams it over the wire.
async fn post_upload_streamed(app: &Router, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let frames: Vec<Result<Bytes, std::io::Error>> = multipart_body(parts)
        .chunks(64 * 1024)
        .map(|frame| Ok(Bytes::copy_from_slice(frame)))
        .collect();
    send_multipart(app, uri, Body::from_stream(stream::iter(frames))).await
}

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn dev_config(tmp: &TempDir) -> AppConfig {
    AppConfig::development(tmp.path().join("uploads"))
}

#[tokio::test]
async fn test_photo_upload_flow() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/photos",
        &[
            Part::text("listingId", "42"),
            Part::file("photos", "house.JPG", "image/jpeg", b"front of the house"),
            Part::file("photos", "garden.webp", "image/webp", b"back garden"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);

    let first = &files[0];
    let stored_name = first["stored_name"].as_str().unwrap();
    assert!(stored_name.ends_with(".JPG"));
    assert_eq!(first["original_name"], "house.JPG");
    assert_eq!(first["category"], "property_photo");
    assert_eq!(first["size"], 18);
    assert_eq!(
        first["path"],
        format!("/uploads/properties/photos/{}", stored_name)
    );

    let photos_dir = tmp.path().join("uploads/properties/photos");
    assert_eq!(stored_files(&photos_dir).len(), 2);
    assert_eq!(
        std::fs::read(photos_dir.join(stored_name)).unwrap(),
        b"front of the house"
    );

    // Stored files are served back under their public path
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(first["path"].as_str().unwrap())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"front of the house");
}

#[tokio::test]
async fn test_floor_plan_pdf_rejected() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/floor-plan",
        &[Part::file("floorPlan", "plan.pdf", "application/pdf", b"%PDF-1.7")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("Invalid file type"));
    assert!(json["stack"].is_string(), "development responses carry a stack");
    assert!(stored_files(&tmp.path().join("uploads/properties/floor-plans")).is_empty());
}

#[tokio::test]
async fn test_mislabeled_image_rejected() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/photos",
        &[Part::file("photos", "totally.png", "text/plain", b"not an image")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("Invalid file type"));
}

#[tokio::test]
async fn test_photo_count_limit() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;
    let photos_dir = tmp.path().join("uploads/properties/photos");

    let names: Vec<String> = (0..51).map(|i| format!("photo-{i}.jpg")).collect();
    let parts: Vec<Part<'_>> = names
        .iter()
        .map(|name| Part::file("photos", name, "image/jpeg", b"jpeg bytes"))
        .collect();

    // 51 photos: the whole request fails and nothing stays on disk
    let (status, json) = post_upload(&app, "/api/uploads/properties/photos", &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("Too many files"));
    assert!(stored_files(&photos_dir).is_empty());

    // 50 photos: all accepted
    let (status, json) = post_upload(&app, "/api/uploads/properties/photos", &parts[..50]).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["files"].as_array().unwrap().len(), 50);
    assert_eq!(stored_files(&photos_dir).len(), 50);
}

#[tokio::test]
async fn test_panorama_size_limit() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;
    let panorama_dir = tmp.path().join("uploads/vr-panoramas");

    let too_big = vec![0u8; 51 * MIB];
    let (status, json) = post_upload(
        &app,
        "/api/uploads/vr-panorama",
        &[Part::file("panorama", "pano.jpg", "image/jpeg", &too_big)],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert!(stored_files(&panorama_dir).is_empty());

    let fits = vec![0u8; 49 * MIB];
    let (status, json) = post_upload(
        &app,
        "/api/uploads/vr-panorama",
        &[Part::file("panorama", "pano.jpg", "image/jpeg", &fits)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["files"][0]["size"], 49 * MIB);
    assert_eq!(stored_files(&panorama_dir).len(), 1);
}

#[tokio::test]
async fn test_configured_size_limit_rolls_back_request() {
    let tmp = TempDir::new().unwrap();
    let mut config = dev_config(&tmp);
    config.max_file_size = 16;
    let app = setup_app(config).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/photos",
        &[
            Part::file("photos", "small.png", "image/png", b"tiny"),
            Part::file("photos", "large.png", "image/png", &[7u8; 64]),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["message"].as_str().unwrap().contains("large.png"));
    assert!(stored_files(&tmp.path().join("uploads/properties/photos")).is_empty());
}

#[tokio::test]
async fn test_oversized_body_after_file_rolls_back() {
    let tmp = TempDir::new().unwrap();
    let mut config = dev_config(&tmp);
    config.max_file_size = 16;
    let app = setup_app(config).await;

    // Route limit is 16 bytes plus multipart overhead; the caption alone exceeds it
    let caption = "x".repeat(12 * MIB);
    let (status, json) = post_upload_streamed(
        &app,
        "/api/uploads/vr-panorama",
        &[
            Part::file("panorama", "pano.jpg", "image/jpeg", b"360"),
            Part::text("caption", &caption),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert_eq!(
        json["message"],
        "Request body exceeds the maximum allowed limit"
    );
    assert!(stored_files(&tmp.path().join("uploads/vr-panoramas")).is_empty());
}

#[tokio::test]
async fn test_body_limit_reached_while_file_streams() {
    let tmp = TempDir::new().unwrap();
    let mut config = dev_config(&tmp);
    config.max_file_size = MIB as u64;
    let app = setup_app(config).await;

    // 10.5 MiB of form text, then a file within its own limit that pushes
    // the body past 1 MiB + 10 MiB of overhead part way through
    let notes = "n".repeat(10 * MIB + MIB / 2);
    let panorama = vec![0u8; MIB];
    let (status, json) = post_upload_streamed(
        &app,
        "/api/uploads/vr-panorama",
        &[
            Part::text("notes", &notes),
            Part::file("panorama", "pano.jpg", "image/jpeg", &panorama),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        json["message"],
        "Request body exceeds the maximum allowed limit"
    );
    assert!(stored_files(&tmp.path().join("uploads/vr-panoramas")).is_empty());
}

#[tokio::test]
async fn test_staged_files_are_not_served() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;
    let photos_dir = tmp.path().join("uploads/properties/photos");
    std::fs::write(photos_dir.join(".upload-inflight.part"), b"half a photo").unwrap();

    for uri in [
        "/uploads/properties/photos/.upload-inflight.part",
        "/uploads/properties/photos/%2Eupload-inflight.part",
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }
}

#[tokio::test]
async fn test_single_file_categories_reject_second_file() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/floor-plan",
        &[
            Part::file("floorPlan", "ground.png", "image/png", b"ground floor"),
            Part::file("floorPlan", "first.png", "image/png", b"first floor"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("Unexpected field"));
    assert!(stored_files(&tmp.path().join("uploads/properties/floor-plans")).is_empty());
}

#[tokio::test]
async fn test_unexpected_field_and_missing_file() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/vr-panorama",
        &[Part::file("photos", "pano.jpg", "image/jpeg", b"wide")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Unexpected field 'photos'");

    let (status, json) = post_upload(
        &app,
        "/api/uploads/vr-panorama",
        &[Part::text("caption", "Living room")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "No file provided in field 'panorama'");
}

#[tokio::test]
async fn test_production_hides_stack() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(AppConfig::production(tmp.path().join("uploads"))).await;

    let (status, json) = post_upload(
        &app,
        "/api/uploads/properties/floor-plan",
        &[Part::file("floorPlan", "plan.pdf", "application/pdf", b"%PDF")],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json.get("stack").is_none());
}

#[tokio::test]
async fn test_health_and_fallback() {
    let tmp = TempDir::new().unwrap();
    let app = setup_app(dev_config(&tmp)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "listing-req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "listing-req-1");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "writable");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/nowhere")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Route not found");
}
