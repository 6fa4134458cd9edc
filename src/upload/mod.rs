//! Scheduled YouTube video uploads.
//!
//! One job runs in two phases:
//! 1. `VideoUploader::scratch` opens a per-request scratch directory and the
//!    caller streams the video into it through a `VideoWriter`
//! 2. `VideoUploader::upload` validates the request, obtains a valid upload
//!    credential (refreshing it if needed), pushes the file through a
//!    resumable session in fixed-size chunks, and removes the scratch
//!    directory on every exit path
//!
//! The video is never held in memory as a whole; chunks are read back from
//! the staged file one at a time.
//!
//! One upload at a time is assumed. Concurrent jobs may both refresh the same
//! expired credential.

mod resumable;
mod schedule;

pub use resumable::{normalize_chunk_size, CHUNK_GRANULARITY};
pub use schedule::{local_offset, parse_publish_time};

use crate::config::UploadConfig;
use crate::credentials::{CredentialStore, TokenRefresher};
use crate::error::{Error, Result};
use anyhow::Context;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use resumable::ChunkOutcome;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_VIDEO_FILENAME: &str = "video.mp4";

/// Video file staged on disk
#[derive(Clone, Debug)]
pub struct VideoSource {
    /// Filename as sent by the client
    pub filename: String,
    pub content_type: Option<String>,
    /// Staged copy inside the scratch directory
    pub path: PathBuf,
    pub size: u64,
}

/// Scratch directory for one upload request.
///
/// `VideoUploader::upload` consumes and removes it; dropping it unused also
/// removes it.
pub struct UploadScratch {
    dir: tempfile::TempDir,
    max_video_bytes: u64,
}

impl UploadScratch {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create the staged video file, keeping only the final path component of
    /// the client-supplied filename.
    pub async fn create_video(
        &self,
        filename: &str,
        content_type: Option<String>,
    ) -> Result<VideoWriter> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_VIDEO_FILENAME);
        let path = self.dir.path().join(name);

        let file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))
            .map_err(Error::Storage)?;

        Ok(VideoWriter {
            file,
            limit: self.max_video_bytes,
            source: VideoSource {
                filename: filename.to_string(),
                content_type,
                path,
                size: 0,
            },
        })
    }

    /// Remove the directory and everything staged in it.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Scratch directory removed"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch directory"),
        }
    }
}

/// Streams one video into its scratch file
pub struct VideoWriter {
    file: tokio::fs::File,
    limit: u64,
    source: VideoSource,
}

impl VideoWriter {
    /// Append `bytes`. Fails with `Validation` once the file would exceed the
    /// configured size limit.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let size = self.source.size + bytes.len() as u64;
        if size > self.limit {
            return Err(Error::Validation(format!(
                "Video file exceeds the {} byte limit",
                self.limit
            )));
        }

        self.file
            .write_all(bytes)
            .await
            .with_context(|| format!("Failed to write {}", self.source.path.display()))
            .map_err(Error::Storage)?;
        self.source.size = size;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<VideoSource> {
        self.file
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.source.path.display()))
            .map_err(Error::Storage)?;

        debug!(path = %self.source.path.display(), bytes = self.source.size, "Video staged");
        Ok(self.source)
    }
}

/// Raw upload form
#[derive(Clone, Debug, Default)]
pub struct UploadRequest {
    pub video: Option<VideoSource>,
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: Option<String>,
    pub publish_time: String,
}

/// Split a comma-separated tag list, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Validated request with final metadata
#[derive(Clone, Debug)]
pub struct UploadJob {
    pub job_id: Uuid,
    pub video: VideoSource,
    /// Caller's own reference for the video
    pub video_id: String,
    /// Title with the configured suffix applied
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub publish_at: DateTime<Utc>,
}

impl UploadJob {
    /// `snippet` + `status` body for `videos.insert`. The video stays private
    /// until YouTube publishes it at `publish_at`.
    pub fn metadata(&self) -> Value {
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": "private",
                "publishAt": self.publish_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                "license": "youtube",
                "selfDeclaredMadeForKids": false,
            },
        })
    }

    fn content_type(&self) -> String {
        self.video
            .content_type
            .as_deref()
            .filter(|ct| ct.starts_with("video/"))
            .map(String::from)
            .unwrap_or_else(|| guess_content_type(&self.video.filename).to_string())
    }

    fn total_bytes(&self) -> u64 {
        self.video.size
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "video/*",
    }
}

/// Result of a finished upload
#[derive(Clone, Debug, Serialize)]
pub struct UploadOutcome {
    /// Provider-assigned video id
    pub video_id: String,
    /// Raw `Video` resource returned by the provider
    pub response: Value,
}

/// Progress notifications for one job
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Started {
        job_id: Uuid,
        total_bytes: u64,
    },
    Progress {
        job_id: Uuid,
        bytes_sent: u64,
        total_bytes: u64,
        fraction: f64,
    },
    Completed {
        job_id: Uuid,
        video_id: String,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
}

/// Runs upload jobs against the resumable `videos.insert` endpoint
pub struct VideoUploader {
    config: UploadConfig,
    local_offset: FixedOffset,
    chunk_size: usize,
    credentials: Arc<CredentialStore>,
    http: reqwest::Client,
    events: broadcast::Sender<UploadEvent>,
}

impl VideoUploader {
    pub fn new(config: UploadConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        let local_offset = local_offset(config.publish_offset_minutes)?;
        let chunk_size = normalize_chunk_size(config.chunk_size_bytes);
        if chunk_size != config.chunk_size_bytes {
            warn!(
                configured = config.chunk_size_bytes,
                effective = chunk_size,
                "Upload chunk size rounded to a multiple of 256 KiB"
            );
        }

        // A 308 here is "resume incomplete", never a redirect to follow
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build upload HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            local_offset,
            chunk_size,
            credentials,
            http,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate `request` and compute the final metadata.
    ///
    /// Touches neither the network nor the filesystem.
    pub fn prepare(&self, request: UploadRequest) -> Result<UploadJob> {
        let mut missing = Vec::new();
        if request.video_id.trim().is_empty() {
            missing.push("video_id");
        }
        if request.title.trim().is_empty() {
            missing.push("title");
        }
        if request.description.trim().is_empty() {
            missing.push("description");
        }
        if request.tags.iter().all(|t| t.trim().is_empty()) {
            missing.push("tags");
        }
        if request.publish_time.trim().is_empty() {
            missing.push("publish_time");
        }
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )));
        }

        let video = request
            .video
            .ok_or_else(|| Error::validation("No video file provided"))?;
        if video.size == 0 {
            return Err(Error::validation("Uploaded video file is empty"));
        }
        if video.size > self.config.max_video_bytes as u64 {
            return Err(Error::Validation(format!(
                "Video file exceeds the {} byte limit",
                self.config.max_video_bytes
            )));
        }

        let publish_at = parse_publish_time(&request.publish_time, self.local_offset)?;

        let category_id = request
            .category_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.config.default_category_id.clone());

        Ok(UploadJob {
            job_id: Uuid::new_v4(),
            video,
            video_id: request.video_id.trim().to_string(),
            title: format!("{}{}", request.title.trim(), self.config.title_suffix),
            description: request.description,
            tags: request
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            category_id,
            publish_at,
        })
    }

    /// Open a scratch directory for one request's video.
    pub fn scratch(&self) -> Result<UploadScratch> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("socialkit-upload-");

        let dir = match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("Failed to create {}", root.display()))
                    .map_err(Error::Storage)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };

        let dir = dir
            .context("Failed to create upload scratch directory")
            .map_err(Error::Storage)?;

        Ok(UploadScratch {
            dir,
            max_video_bytes: self.config.max_video_bytes as u64,
        })
    }

    /// Upload the video staged in `scratch` and return the provider's
    /// resource. `scratch` is removed before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    /// * `Validation` - bad or missing fields, nothing sent
    /// * `NotAuthenticated` / `ReauthenticationRequired` - no usable upload
    ///   credential
    /// * `Upload` - the provider rejected the session or a chunk
    pub async fn upload(
        &self,
        scratch: UploadScratch,
        request: UploadRequest,
        refresher: &dyn TokenRefresher,
    ) -> Result<UploadOutcome> {
        let result = match self.prepare(request) {
            Ok(job) => self.execute(&job, refresher).await,
            Err(e) => Err(e),
        };

        scratch.close();
        result
    }

    async fn execute(&self, job: &UploadJob, refresher: &dyn TokenRefresher) -> Result<UploadOutcome> {
        let result = self.run(job, refresher).await;

        match &result {
            Ok(outcome) => {
                info!(
                    job_id = %job.job_id,
                    video_id = %outcome.video_id,
                    publish_at = %job.publish_at,
                    "Video upload complete"
                );
                self.emit(UploadEvent::Completed {
                    job_id: job.job_id,
                    video_id: outcome.video_id.clone(),
                });
            }
            Err(e) => {
                warn!(job_id = %job.job_id, error = %e, "Video upload failed");
                self.emit(UploadEvent::Failed {
                    job_id: job.job_id,
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn run(&self, job: &UploadJob, refresher: &dyn TokenRefresher) -> Result<UploadOutcome> {
        let video_path = &job.video.path;
        let credential = self.credentials.load_or_refresh(refresher).await?;

        let total_bytes = job.total_bytes();
        let content_type = job.content_type();

        info!(
            job_id = %job.job_id,
            video_id = %job.video_id,
            title = %job.title,
            total_bytes,
            publish_at = %job.publish_at,
            "Starting video upload"
        );

        let session_uri = resumable::initiate(
            &self.http,
            &self.config.endpoint,
            &credential.access_token,
            &job.metadata(),
            &content_type,
            total_bytes,
        )
        .await?;

        self.emit(UploadEvent::Started {
            job_id: job.job_id,
            total_bytes,
        });

        let mut file = tokio::fs::File::open(video_path)
            .await
            .with_context(|| format!("Failed to open {}", video_path.display()))
            .map_err(Error::Storage)?;

        let mut offset = 0u64;
        loop {
            if offset >= total_bytes {
                return Err(Error::Upload(
                    "Provider still reports the upload incomplete after all bytes were sent"
                        .to_string(),
                ));
            }

            let len = (total_bytes - offset).min(self.chunk_size as u64) as usize;
            let mut chunk = vec![0u8; len];
            file.seek(SeekFrom::Start(offset))
                .await
                .context("Failed to seek video file")
                .map_err(Error::Storage)?;
            file.read_exact(&mut chunk)
                .await
                .context("Failed to read video file")
                .map_err(Error::Storage)?;

            let outcome = resumable::put_chunk(
                &self.http,
                &session_uri,
                &credential.access_token,
                &content_type,
                chunk,
                offset,
                total_bytes,
            )
            .await?;

            match outcome {
                ChunkOutcome::Incomplete { next_offset } => {
                    if next_offset <= offset {
                        return Err(Error::Upload(format!(
                            "Provider made no progress past byte {}",
                            offset
                        )));
                    }
                    offset = next_offset.min(total_bytes);

                    let fraction = offset as f64 / total_bytes as f64;
                    debug!(job_id = %job.job_id, bytes_sent = offset, total_bytes, "Uploaded {:.0}%", fraction * 100.0);
                    self.emit(UploadEvent::Progress {
                        job_id: job.job_id,
                        bytes_sent: offset,
                        total_bytes,
                        fraction,
                    });
                }
                ChunkOutcome::Complete(response) => {
                    self.emit(UploadEvent::Progress {
                        job_id: job.job_id,
                        bytes_sent: total_bytes,
                        total_bytes,
                        fraction: 1.0,
                    });

                    let video_id = response["id"]
                        .as_str()
                        .map(String::from)
                        .ok_or_else(|| {
                            Error::Upload("Upload response did not include a video id".to_string())
                        })?;
                    return Ok(UploadOutcome { video_id, response });
                }
            }
        }
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;
    use async_trait::async_trait;
    use chrono::Duration;
    use mockito::Matcher;

    const CHUNK: usize = CHUNK_GRANULARITY;
    const TOTAL: usize = 300_000;

    struct NoRefresh;

    #[async_trait]
    impl TokenRefresher for NoRefresh {
        async fn refresh(&self, _credential: &Credential) -> Result<Credential> {
            Err(Error::TokenExchange("refresh not expected".to_string()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        temp_root: PathBuf,
        uploader: VideoUploader,
    }

    fn fixture(endpoint: &str, authenticated: bool) -> Fixture {
        fixture_with_limit(endpoint, authenticated, UploadConfig::default().max_video_bytes)
    }

    fn fixture_with_limit(endpoint: &str, authenticated: bool, max_video_bytes: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let temp_root = dir.path().join("scratch");
        std::fs::create_dir_all(&temp_root).unwrap();

        let store = CredentialStore::new(dir.path().join("youtube_credentials.json"), None).unwrap();
        if authenticated {
            store
                .save(&Credential {
                    access_token: "ya29.upload".to_string(),
                    refresh_token: Some("1//r".to_string()),
                    scopes: ["https://www.googleapis.com/auth/youtube.upload".to_string()].into(),
                    expiry: Utc::now() + Duration::hours(1),
                })
                .unwrap();
        }

        let config = UploadConfig {
            endpoint: endpoint.to_string(),
            chunk_size_bytes: CHUNK,
            temp_root: Some(temp_root.clone()),
            max_video_bytes,
            ..UploadConfig::default()
        };

        Fixture {
            _dir: dir,
            temp_root,
            uploader: VideoUploader::new(config, Arc::new(store)).unwrap(),
        }
    }

    fn scratch_is_empty(fixture: &Fixture) -> bool {
        std::fs::read_dir(&fixture.temp_root).unwrap().next().is_none()
    }

    /// Stage a `TOTAL`-byte video the way the multipart handler does, in
    /// pieces, and build a complete request around it.
    async fn staged(fixture: &Fixture) -> (UploadScratch, UploadRequest) {
        let scratch = fixture.uploader.scratch().unwrap();
        let mut writer = scratch
            .create_video("clip.mp4", Some("video/mp4".to_string()))
            .await
            .unwrap();
        for piece in vec![7u8; TOTAL].chunks(64 * 1024) {
            writer.write(piece).await.unwrap();
        }
        let video = writer.finish().await.unwrap();
        (scratch, request(Some(video)))
    }

    fn request(video: Option<VideoSource>) -> UploadRequest {
        UploadRequest {
            video,
            video_id: "local-42".to_string(),
            title: "Morning run".to_string(),
            description: "5k along the river".to_string(),
            tags: parse_tags("running, fitness ,, shorts"),
            category_id: None,
            publish_time: "2025-02-01T18:30:00".to_string(),
        }
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" a, b ,,c ,"), vec!["a", "b", "c"]);
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn test_prepare_builds_metadata() {
        let fixture = fixture("http://127.0.0.1:1/upload", true);
        let video = VideoSource {
            filename: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            path: PathBuf::from("clip.mp4"),
            size: TOTAL as u64,
        };
        let job = fixture.uploader.prepare(request(Some(video))).unwrap();

        assert_eq!(job.title, "Morning run #shorts");
        assert_eq!(job.tags, vec!["running", "fitness", "shorts"]);
        assert_eq!(job.category_id, "24");

        let metadata = job.metadata();
        assert_eq!(metadata["snippet"]["categoryId"], "24");
        assert_eq!(metadata["status"]["privacyStatus"], "private");
        assert_eq!(metadata["status"]["publishAt"], "2025-02-01T13:00:00Z");
        assert_eq!(metadata["status"]["selfDeclaredMadeForKids"], false);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_without_io() {
        let mut server = mockito::Server::new_async().await;
        let initiate = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let fixture = fixture(&format!("{}/upload", server.url()), true);

        let cases: Vec<fn(&mut UploadRequest)> = vec![
            |r| r.video_id.clear(),
            |r| r.title = "  ".to_string(),
            |r| r.description.clear(),
            |r| r.tags.clear(),
            |r| r.publish_time.clear(),
            |r| r.video = None,
        ];

        for mutate in cases {
            let (scratch, mut req) = staged(&fixture).await;
            mutate(&mut req);
            let result = fixture.uploader.upload(scratch, req, &NoRefresh).await;
            assert!(matches!(result, Err(Error::Validation(_))), "got {:?}", result);
            assert!(scratch_is_empty(&fixture));
        }

        initiate.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_publish_time_rejected_before_auth() {
        // No credential stored: a validation error proves auth was never reached
        let fixture = fixture("http://127.0.0.1:1/upload", false);
        let (scratch, mut req) = staged(&fixture).await;
        req.publish_time = "next tuesday".to_string();

        let result = fixture.uploader.upload(scratch, req, &NoRefresh).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(scratch_is_empty(&fixture));
    }

    #[tokio::test]
    async fn test_not_authenticated_cleans_up() {
        let fixture = fixture("http://127.0.0.1:1/upload", false);
        let (scratch, req) = staged(&fixture).await;
        let result = fixture.uploader.upload(scratch, req, &NoRefresh).await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert!(scratch_is_empty(&fixture));
    }

    #[tokio::test]
    async fn test_chunked_upload_completes() {
        let mut server = mockito::Server::new_async().await;
        let session_uri = format!("{}/session/abc", server.url());

        let initiate = server
            .mock("POST", "/upload")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "resumable".into()),
                Matcher::UrlEncoded("part".into(), "snippet,status".into()),
            ]))
            .match_header("authorization", "Bearer ya29.upload")
            .match_header("x-upload-content-length", "300000")
            .match_body(Matcher::PartialJson(json!({
                "snippet": {"title": "Morning run #shorts", "categoryId": "24"},
                "status": {"publishAt": "2025-02-01T13:00:00Z", "privacyStatus": "private"}
            })))
            .with_status(200)
            .with_header("location", &session_uri)
            .create_async()
            .await;

        let first = server
            .mock("PUT", "/session/abc")
            .match_header("content-range", "bytes 0-262143/300000")
            .with_status(308)
            .with_header("range", "bytes=0-262143")
            .create_async()
            .await;

        let last = server
            .mock("PUT", "/session/abc")
            .match_header("content-range", "bytes 262144-299999/300000")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"kind":"youtube#video","id":"dQw4w9WgXcQ","status":{"privacyStatus":"private"}}"#)
            .create_async()
            .await;

        let fixture = fixture(&format!("{}/upload", server.url()), true);
        let mut events = fixture.uploader.subscribe();

        let (scratch, req) = staged(&fixture).await;
        let outcome = fixture.uploader.upload(scratch, req, &NoRefresh).await.unwrap();
        assert_eq!(outcome.video_id, "dQw4w9WgXcQ");
        assert_eq!(outcome.response["kind"], "youtube#video");

        initiate.assert_async().await;
        first.assert_async().await;
        last.assert_async().await;
        assert!(scratch_is_empty(&fixture));

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received.first(), Some(UploadEvent::Started { total_bytes: 300_000, .. })));
        assert!(received.iter().any(|e| matches!(
            e,
            UploadEvent::Progress { bytes_sent: 262_144, .. }
        )));
        assert!(matches!(
            received.last(),
            Some(UploadEvent::Completed { video_id, .. }) if video_id == "dQw4w9WgXcQ"
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_mid_upload_cleans_up() {
        let mut server = mockito::Server::new_async().await;
        let session_uri = format!("{}/session/xyz", server.url());

        let _initiate = server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("location", &session_uri)
            .create_async()
            .await;
        let _first = server
            .mock("PUT", "/session/xyz")
            .match_header("content-range", "bytes 0-262143/300000")
            .with_status(308)
            .with_header("range", "bytes=0-262143")
            .create_async()
            .await;
        let _last = server
            .mock("PUT", "/session/xyz")
            .match_header("content-range", "bytes 262144-299999/300000")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":500,"message":"Backend Error"}}"#)
            .create_async()
            .await;

        let fixture = fixture(&format!("{}/upload", server.url()), true);
        let mut events = fixture.uploader.subscribe();

        let (scratch, req) = staged(&fixture).await;
        let result = fixture.uploader.upload(scratch, req, &NoRefresh).await;
        match result {
            Err(Error::Upload(msg)) => assert!(msg.contains("Backend Error")),
            other => panic!("expected Upload error, got {:?}", other),
        }
        assert!(scratch_is_empty(&fixture));

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(UploadEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_stalled_session_is_aborted() {
        let mut server = mockito::Server::new_async().await;
        let session_uri = format!("{}/session/stall", server.url());

        let _initiate = server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("location", &session_uri)
            .create_async()
            .await;
        // 308 without a Range header: nothing was persisted
        let put = server
            .mock("PUT", "/session/stall")
            .with_status(308)
            .expect(1)
            .create_async()
            .await;

        let fixture = fixture(&format!("{}/upload", server.url()), true);
        let (scratch, req) = staged(&fixture).await;
        let result = fixture.uploader.upload(scratch, req, &NoRefresh).await;

        assert!(matches!(result, Err(Error::Upload(_))));
        put.assert_async().await;
        assert!(scratch_is_empty(&fixture));
    }

    #[tokio::test]
    async fn test_video_is_staged_on_disk() {
        let fixture = fixture("http://127.0.0.1:1/upload", true);
        let (scratch, req) = staged(&fixture).await;

        let video = req.video.clone().unwrap();
        assert_eq!(video.size, TOTAL as u64);
        assert!(video.path.starts_with(scratch.path()));
        assert_eq!(std::fs::metadata(&video.path).unwrap().len(), TOTAL as u64);

        // The job refers to the staged file; the bytes stay on disk
        let job = fixture.uploader.prepare(req).unwrap();
        assert_eq!(job.video.path, video.path);
        assert_eq!(job.total_bytes(), TOTAL as u64);

        scratch.close();
        assert!(!video.path.exists());
        assert!(scratch_is_empty(&fixture));
    }

    #[tokio::test]
    async fn test_oversized_video_rejected_while_staging() {
        let fixture = fixture_with_limit("http://127.0.0.1:1/upload", true, 1000);
        let scratch = fixture.uploader.scratch().unwrap();
        let mut writer = scratch.create_video("big.mp4", None).await.unwrap();

        writer.write(&[1u8; 600]).await.unwrap();
        let result = writer.write(&[1u8; 600]).await;
        assert!(matches!(result, Err(Error::Validation(msg)) if msg.contains("1000 byte limit")));

        scratch.close();
        assert!(scratch_is_empty(&fixture));
    }

    #[tokio::test]
    async fn test_staged_filename_keeps_final_component() {
        let fixture = fixture("http://127.0.0.1:1/upload", true);
        let scratch = fixture.uploader.scratch().unwrap();

        let writer = scratch.create_video("../../etc/clip.mp4", None).await.unwrap();
        let video = writer.finish().await.unwrap();
        assert_eq!(video.path, scratch.path().join("clip.mp4"));
        assert_eq!(video.filename, "../../etc/clip.mp4");

        let writer = scratch.create_video("", None).await.unwrap();
        let video = writer.finish().await.unwrap();
        assert_eq!(video.path, scratch.path().join(DEFAULT_VIDEO_FILENAME));
    }

    #[test]
    fn test_content_type_fallbacks() {
        assert_eq!(guess_content_type("a.MOV"), "video/quicktime");
        assert_eq!(guess_content_type("a.webm"), "video/webm");
        assert_eq!(guess_content_type("noext"), "video/*");
    }
}
