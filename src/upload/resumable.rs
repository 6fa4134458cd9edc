//! YouTube Data API v3 resumable upload protocol.
//!
//! 1. POST the video metadata to `{endpoint}?uploadType=resumable&part=snippet,status`
//!    with `X-Upload-Content-Type`/`X-Upload-Content-Length`. The `Location`
//!    response header is the upload session URI.
//! 2. PUT the bytes in chunks with `Content-Range: bytes a-b/total`.
//!    `308 Resume Incomplete` + `Range: bytes=0-n` means the provider holds
//!    bytes `0..=n`; `200`/`201` returns the created `Video` resource.
//!
//! The session URI lives only for the duration of one call; a failed upload
//! starts again from byte zero.

use crate::error::{Error, Result};
use reqwest::{header, StatusCode};
use serde_json::Value;

/// Chunk sizes must be multiples of 256 KiB (except the last chunk)
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Round `requested` down to the chunk granularity, never below one unit.
pub fn normalize_chunk_size(requested: usize) -> usize {
    (requested / CHUNK_GRANULARITY).max(1) * CHUNK_GRANULARITY
}

/// Provider answer to one chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    /// More bytes expected, starting at `next_offset`
    Incomplete { next_offset: u64 },
    /// Upload finished; the created resource
    Complete(Value),
}

/// Open an upload session and return its URI.
pub async fn initiate(
    http: &reqwest::Client,
    endpoint: &str,
    access_token: &str,
    metadata: &Value,
    content_type: &str,
    total_bytes: u64,
) -> Result<String> {
    let response = http
        .post(endpoint)
        .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
        .bearer_auth(access_token)
        .header("X-Upload-Content-Type", content_type)
        .header("X-Upload-Content-Length", total_bytes.to_string())
        .json(metadata)
        .send()
        .await
        .map_err(|e| Error::Upload(format!("Failed to start upload session: {}", e.without_url())))?;

    if !response.status().is_success() {
        return Err(provider_error(response).await);
    }

    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| Error::Upload("Upload session response had no Location header".to_string()))
}

/// Send bytes `offset..offset + chunk.len()` of a `total_bytes` upload.
pub async fn put_chunk(
    http: &reqwest::Client,
    session_uri: &str,
    access_token: &str,
    content_type: &str,
    chunk: Vec<u8>,
    offset: u64,
    total_bytes: u64,
) -> Result<ChunkOutcome> {
    let last = offset + chunk.len() as u64 - 1;
    let response = http
        .put(session_uri)
        .bearer_auth(access_token)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", offset, last, total_bytes),
        )
        .body(chunk)
        .send()
        .await
        .map_err(|e| Error::Upload(format!("Failed to send upload chunk: {}", e.without_url())))?;

    let status = response.status();
    if status == StatusCode::PERMANENT_REDIRECT {
        let next_offset = response
            .headers()
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range_end)
            .map(|end| end + 1)
            .unwrap_or(0);
        return Ok(ChunkOutcome::Incomplete { next_offset });
    }

    if !status.is_success() {
        return Err(provider_error(response).await);
    }

    let resource: Value = response
        .json()
        .await
        .map_err(|e| Error::Upload(format!("Failed to parse upload response: {}", e.without_url())))?;
    Ok(ChunkOutcome::Complete(resource))
}

/// Last byte index from a `Range: bytes=0-n` header.
fn parse_range_end(range: &str) -> Option<u64> {
    range
        .trim()
        .strip_prefix("bytes=")?
        .split_once('-')?
        .1
        .trim()
        .parse()
        .ok()
}

/// Build an `Upload` error from a failed response, preferring the provider's
/// `error.message`.
async fn provider_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or(body);

    Error::Upload(format!("provider returned {}: {}", status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_chunk_size() {
        assert_eq!(normalize_chunk_size(0), CHUNK_GRANULARITY);
        assert_eq!(normalize_chunk_size(1000), CHUNK_GRANULARITY);
        assert_eq!(normalize_chunk_size(CHUNK_GRANULARITY * 3 + 5), CHUNK_GRANULARITY * 3);
        assert_eq!(normalize_chunk_size(8 * 1024 * 1024), 8 * 1024 * 1024);
    }

    #[test]
    fn test_parse_range_end() {
        assert_eq!(parse_range_end("bytes=0-262143"), Some(262143));
        assert_eq!(parse_range_end(" bytes=0-0 "), Some(0));
        assert_eq!(parse_range_end("0-10"), None);
        assert_eq!(parse_range_end("bytes=0-"), None);
    }

    #[tokio::test]
    async fn test_provider_error_message_is_extracted() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":403,"message":"The user has exceeded the number of videos they may upload."}}"#)
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let result = initiate(
            &http,
            &format!("{}/upload", server.url()),
            "token",
            &serde_json::json!({}),
            "video/mp4",
            10,
        )
        .await;

        match result {
            Err(Error::Upload(msg)) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("exceeded the number of videos"));
            }
            other => panic!("expected Upload error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_error_omits_session_uri() {
        let http = reqwest::Client::new();
        let result = put_chunk(
            &http,
            "http://127.0.0.1:1/upload?upload_id=SESSIONSECRET",
            "token",
            "video/mp4",
            vec![0u8; 16],
            0,
            16,
        )
        .await;

        match result {
            Err(Error::Upload(msg)) => {
                assert!(msg.starts_with("Failed to send upload chunk"));
                assert!(!msg.contains("SESSIONSECRET"), "{}", msg);
            }
            other => panic!("expected Upload error, got {:?}", other),
        }
    }
}
