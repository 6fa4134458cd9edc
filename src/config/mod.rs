use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

/// HTTP server and session settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Externally visible base URL, used to derive default redirect URIs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Page the upload-auth callback redirects to
    #[serde(default = "default_services_path")]
    pub services_path: String,
    /// Page the login callback and logout redirect to
    #[serde(default = "default_home_path")]
    pub home_path: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: i64,
    /// How long an issued OAuth state stays redeemable
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_services_path() -> String {
    "/services".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_session_cookie() -> String {
    "socialkit_session".to_string()
}

fn default_session_ttl() -> i64 {
    86_400
}

fn default_state_ttl() -> i64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: default_public_base_url(),
            services_path: default_services_path(),
            home_path: default_home_path(),
            session_cookie: default_session_cookie(),
            session_ttl_seconds: default_session_ttl(),
            state_ttl_seconds: default_state_ttl(),
        }
    }
}

/// OAuth client settings, one section per flow purpose
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// "Who am I" endpoint queried after a login exchange
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default)]
    pub login: OAuthClientSection,
    #[serde(default)]
    pub upload: OAuthClientSection,
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            userinfo_url: default_userinfo_url(),
            login: OAuthClientSection::default(),
            upload: OAuthClientSection::default(),
        }
    }
}

/// One OAuth client. Unset fields fall back to the client-secrets file,
/// then to per-purpose defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthClientSection {
    /// Google client-secret JSON (`web` or `installed` section)
    #[serde(default)]
    pub client_secrets_file: Option<PathBuf>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

/// Persisted record locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
    /// Base64 32-byte key. When set, stored tokens are sealed with AES-256-GCM.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("youtube_credentials.json")
}

fn default_users_file() -> PathBuf {
    PathBuf::from("user_data.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_file: default_credentials_file(),
            users_file: default_users_file(),
            encryption_key: None,
        }
    }
}

/// Video upload settings
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Resumable `videos.insert` endpoint
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
    #[serde(default = "default_category_id")]
    pub default_category_id: String,
    /// Offset of naive `publish_time` values, in minutes east of UTC
    #[serde(default = "default_publish_offset")]
    pub publish_offset_minutes: i32,
    /// Parent directory for per-upload scratch directories
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: usize,
}

fn default_upload_endpoint() -> String {
    "https://www.googleapis.com/upload/youtube/v3/videos".to_string()
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}

fn default_title_suffix() -> String {
    " #shorts".to_string()
}

fn default_category_id() -> String {
    "24".to_string()
}

fn default_publish_offset() -> i32 {
    330
}

fn default_max_video_bytes() -> usize {
    256 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_upload_endpoint(),
            chunk_size_bytes: default_chunk_size(),
            title_suffix: default_title_suffix(),
            default_category_id: default_category_id(),
            publish_offset_minutes: default_publish_offset(),
            temp_root: None,
            max_video_bytes: default_max_video_bytes(),
        }
    }
}

/// Generative-text API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_content_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_content_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_output_tokens() -> u32 {
    1024
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_content_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl AppConfig {
    /// Load from `SOCIALKIT_CONFIG` (default `socialkit.toml`), then apply
    /// environment overrides. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SOCIALKIT_CONFIG").unwrap_or_else(|_| "socialkit.toml".into());
        let mut config = if Path::new(&path).exists() {
            load_config(&path)?
        } else {
            tracing::info!(path = %path, "Config file not found, using defaults");
            AppConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay environment variables onto file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SOCIALKIT_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("SOCIALKIT_PUBLIC_BASE_URL") {
            self.server.public_base_url = v;
        }
        if let Ok(v) = std::env::var("SOCIALKIT_ENCRYPTION_KEY") {
            self.storage.encryption_key = Some(v);
        }
        if let Ok(v) = std::env::var("GEMINI_API_KEY") {
            self.content.api_key = Some(v);
        }

        for (prefix, section) in [
            ("LOGIN", &mut self.oauth.login),
            ("UPLOAD", &mut self.oauth.upload),
        ] {
            if let Ok(v) = std::env::var(format!("SOCIALKIT_OAUTH_{}_CLIENT_ID", prefix)) {
                section.client_id = Some(v);
            }
            if let Ok(v) = std::env::var(format!("SOCIALKIT_OAUTH_{}_CLIENT_SECRET", prefix)) {
                section.client_secret = Some(v);
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AppConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.upload.title_suffix, " #shorts");
        assert_eq!(config.upload.default_category_id, "24");
        assert_eq!(config.upload.publish_offset_minutes, 330);
        assert_eq!(config.server.state_ttl_seconds, 600);
        assert!(config.storage.encryption_key.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:8080"
            public_base_url = "https://social.example.com"

            [oauth.login]
            client_secrets_file = "client_secret_login.json"

            [oauth.upload]
            client_id = "upload-id"
            client_secret = "upload-secret"
            redirect_uri = "https://social.example.com/youtube_auth_callback"

            [storage]
            credentials_file = "/var/lib/socialkit/youtube.json"

            [upload]
            chunk_size_bytes = 524288
            publish_offset_minutes = 0
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(
            config.oauth.login.client_secrets_file,
            Some(PathBuf::from("client_secret_login.json"))
        );
        assert_eq!(config.oauth.upload.client_id.as_deref(), Some("upload-id"));
        assert_eq!(
            config.storage.credentials_file,
            PathBuf::from("/var/lib/socialkit/youtube.json")
        );
        assert_eq!(config.upload.chunk_size_bytes, 524288);
        assert_eq!(config.upload.publish_offset_minutes, 0);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [upload]
            title_suffix = ""
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.upload.title_suffix, "");
        assert_eq!(config.upload.default_category_id, "24"); // Default
        assert_eq!(config.server.session_cookie, "socialkit_session"); // Default
        assert!(config.oauth.login.client_id.is_none());
    }
}
