// Integration tests for the upload server
//
// Router-level tests drive the service directly with `oneshot`; the last
// test goes through a real socket with the upload client.

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use stream_recorder::http::{create_router, AppState, UploadStore};
use stream_recorder::remote::{StoredFile, UploadClient, UploadResponse};
use stream_recorder::RecorderError;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "stream-recorder-test-boundary";

fn router(dir: &TempDir, max_bytes: usize) -> Router {
    create_router(AppState::new(UploadStore::new(dir.path(), max_bytes)))
}

fn upload_request(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Result<Vec<u8>> {
    Ok(axum::body::to_bytes(response.into_body(), usize::MAX)
        .await?
        .to_vec())
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}

#[tokio::test]
async fn test_non_video_upload_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let response = router(&temp_dir, 1024)
        .oneshot(upload_request("video", "notes.txt", "text/plain", b"hello"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await?;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Only video files are allowed");
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let response = router(&temp_dir, 1024)
        .oneshot(upload_request("attachment", "clip.webm", "video/webm", b"abc"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["message"], "No file uploaded");

    Ok(())
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;

    // Over the file limit but inside the body limit
    let response = router(&temp_dir, 1024)
        .oneshot(upload_request("video", "clip.webm", "video/webm", &[0u8; 4096]))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await?["success"], false);

    // Over the body limit as well
    let response = router(&temp_dir, 16)
        .oneshot(upload_request("video", "clip.webm", "video/webm", &vec![0u8; 200 * 1024]))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_upload_list_serve_delete() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = router(&temp_dir, 1024 * 1024);

    let response = app
        .clone()
        .oneshot(upload_request("video", "clip.webm", "video/webm", b"webm-bytes"))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let uploaded: UploadResponse = serde_json::from_slice(&body_bytes(response).await?)?;
    assert!(uploaded.success);
    assert_eq!(uploaded.message, "File uploaded successfully");
    assert_eq!(uploaded.file.originalname, "clip.webm");
    assert_eq!(uploaded.file.mimetype, "video/webm");
    assert_eq!(uploaded.file.size, 10);
    assert!(uploaded.file.filename.starts_with("recording-"));

    let response = app.clone().oneshot(request("GET", "/history")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<StoredFile> = serde_json::from_slice(&body_bytes(response).await?)?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, uploaded.file.id);
    assert_eq!(listed[0].path, uploaded.file.path);

    let response = app.clone().oneshot(request("GET", &uploaded.file.path)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await?, b"webm-bytes");

    let uri = format!("/recording/{}", uploaded.file.id);
    let response = app.clone().oneshot(request("DELETE", &uri)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["success"], true);

    let response = app.clone().oneshot(request("DELETE", &uri)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?["message"], "Recording not found");

    Ok(())
}

#[tokio::test]
async fn test_history_of_missing_directory_is_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = create_router(AppState::new(UploadStore::new(
        temp_dir.path().join("never-created"),
        1024,
    )));

    let response = app.oneshot(request("GET", "/history")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?, serde_json::json!([]));

    Ok(())
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let response = router(&temp_dir, 1024).oneshot(request("GET", "/health")).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await?, b"OK");

    Ok(())
}

#[tokio::test]
async fn test_upload_client_against_running_server() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(&temp_dir, 1024 * 1024);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = UploadClient::new(format!("http://{}", addr));

    let file = client
        .upload("recording.webm", "video/webm", vec![4u8; 64])
        .await?;
    assert_eq!(file.size, 64);

    let listed = client.history().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, file.id);

    let err = client
        .upload("notes.txt", "text/plain", b"nope".to_vec())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RecorderError::UploadRejected("Only video files are allowed".into())
    );

    client.delete(&file.id).await?;
    assert!(matches!(
        client.delete(&file.id).await,
        Err(RecorderError::NotFound(_))
    ));
    assert!(client.history().await?.is_empty());

    Ok(())
}
