// Integration tests for POST /api/upload_video

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{body_json, test_app, test_app_with_video_limit, CannedGenerator};
use mockito::Matcher;
use tower::ServiceExt;

const BOUNDARY: &str = "----socialkit-test-boundary";

struct Form {
    body: Vec<u8>,
}

impl Form {
    fn new() -> Self {
        Self { body: Vec::new() }
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

fn complete_form(video: &[u8]) -> Form {
    Form::new()
        .file("video_file", "clip.mp4", "video/mp4", video)
        .text("video_id", "local-7")
        .text("title", "Sunrise timelapse")
        .text("description", "Shot from the ridge")
        .text("tags", "timelapse, sunrise, nature")
        .text("publish_time", "2025-03-10T07:00")
}

async fn post_form(router: &Router, body: Vec<u8>) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload_video")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

fn scratch_is_empty(dir: &std::path::Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Missing fields are listed in one 400 response.
#[tokio::test]
async fn test_missing_fields_return_400() {
    let mut server = mockito::Server::new_async().await;
    let initiate = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = test_app(&server.url(), CannedGenerator(None));
    app.authorize_upload();

    let body = Form::new()
        .file("video_file", "clip.mp4", "video/mp4", &[1u8; 64])
        .text("video_id", "local-7")
        .text("title", "Sunrise timelapse")
        .finish();

    let response = post_form(&app.router, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Missing required parameters: description, tags, publish_time"
    );
    assert!(scratch_is_empty(&app.scratch_dir()));

    initiate.assert_async().await;
}

#[tokio::test]
async fn test_missing_video_returns_400() {
    let server = mockito::Server::new_async().await;
    let app = test_app(&server.url(), CannedGenerator(None));
    app.authorize_upload();

    let body = Form::new()
        .text("video_id", "local-7")
        .text("title", "Sunrise timelapse")
        .text("description", "Shot from the ridge")
        .text("tags", "timelapse")
        .text("publish_time", "2025-03-10T07:00")
        .finish();

    let response = post_form(&app.router, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No video file provided");
}

#[tokio::test]
async fn test_bad_publish_time_returns_400() {
    let server = mockito::Server::new_async().await;
    let app = test_app(&server.url(), CannedGenerator(None));

    let body = complete_form(&[1u8; 64])
        .text("publish_time", "tomorrow at noon")
        .finish();

    let response = post_form(&app.router, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid publish_time format");
}

/// Oversized videos are refused while streaming, before any network call.
#[tokio::test]
async fn test_oversized_video_rejected() {
    let mut server = mockito::Server::new_async().await;
    let initiate = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = test_app_with_video_limit(&server.url(), CannedGenerator(None), 4096);
    app.authorize_upload();

    let response = post_form(&app.router, complete_form(&[7u8; 10_000]).finish()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("4096 byte limit"));
    assert!(scratch_is_empty(&app.scratch_dir()));

    initiate.assert_async().await;
}

/// A truncated form is rejected and leaves nothing staged.
#[tokio::test]
async fn test_malformed_form_leaves_no_file() {
    let server = mockito::Server::new_async().await;
    let app = test_app(&server.url(), CannedGenerator(None));
    app.authorize_upload();

    let mut body = complete_form(&[1u8; 2048]).finish();
    body.truncate(300);

    let response = post_form(&app.router, body).await;
    assert!(response.status().is_client_error());
    assert!(scratch_is_empty(&app.scratch_dir()));
}

/// Without a stored credential the caller is pointed at the upload flow.
#[tokio::test]
async fn test_not_authenticated_returns_401_with_hint() {
    let server = mockito::Server::new_async().await;
    let app = test_app(&server.url(), CannedGenerator(None));

    let response = post_form(&app.router, complete_form(&[1u8; 64]).finish()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["auth_required"], true);
    assert_eq!(body["auth_url"], "/api/authenticate_youtube");
    assert!(scratch_is_empty(&app.scratch_dir()));
}

/// A single-chunk upload returns the provider's video id.
#[tokio::test]
async fn test_upload_success() {
    let mut server = mockito::Server::new_async().await;
    let session_uri = format!("{}/session/s1", server.url());

    let initiate = server
        .mock("POST", "/upload")
        .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
        .match_header("authorization", "Bearer ya29.upload")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "snippet": {
                "title": "Sunrise timelapse #shorts",
                "tags": ["timelapse", "sunrise", "nature"],
                "categoryId": "24"
            },
            "status": {"privacyStatus": "private", "publishAt": "2025-03-10T01:30:00Z"}
        })))
        .with_status(200)
        .with_header("location", &session_uri)
        .create_async()
        .await;

    let put = server
        .mock("PUT", "/session/s1")
        .match_header("content-range", "bytes 0-4095/4096")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"kind":"youtube#video","id":"yt-abc123"}"#)
        .create_async()
        .await;

    let app = test_app(&server.url(), CannedGenerator(None));
    app.authorize_upload();

    let response = post_form(&app.router, complete_form(&[9u8; 4096]).finish()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Upload Complete!");
    assert_eq!(body["video_id"], "yt-abc123");
    assert_eq!(body["response"]["kind"], "youtube#video");

    initiate.assert_async().await;
    put.assert_async().await;
    assert!(scratch_is_empty(&app.scratch_dir()));
}

/// Provider rejection surfaces as a 500 with the provider's message.
#[tokio::test]
async fn test_provider_rejection_returns_500() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", "/upload")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota."}}"#)
        .create_async()
        .await;

    let app = test_app(&server.url(), CannedGenerator(None));
    app.authorize_upload();

    let response = post_form(&app.router, complete_form(&[9u8; 4096]).finish()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Upload failed:"));
    assert!(error.contains("exceeded your quota"));
    assert!(scratch_is_empty(&app.scratch_dir()));
}
