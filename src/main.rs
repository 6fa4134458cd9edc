use anyhow::{Context, Result};
use socialkit::api::{create_router, AppState};
use socialkit::config::AppConfig;
use socialkit::content::{ContentService, GeminiClient};
use socialkit::credentials::CredentialStore;
use socialkit::oauth::OAuthManager;
use socialkit::session::{run_session_cleanup, SessionStore};
use socialkit::upload::VideoUploader;
use socialkit::users::UserStore;
use std::sync::Arc;
use tracing::info;

const SESSION_CLEANUP_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialkit=info,tower_http=info".into()),
        )
        .init();

    info!("SocialKit starting...");

    let config = AppConfig::load()?;

    info!(
        bind_addr = %config.server.bind_addr,
        public_base_url = %config.server.public_base_url,
        credentials_file = %config.storage.credentials_file.display(),
        users_file = %config.storage.users_file.display(),
        sealed = config.storage.encryption_key.is_some(),
        "Configuration loaded"
    );

    let credentials = Arc::new(
        CredentialStore::new(
            &config.storage.credentials_file,
            config.storage.encryption_key.as_deref(),
        )
        .context("Failed to initialize credential store")?,
    );
    info!(authenticated = credentials.exists(), "Credential store initialized");

    let users = Arc::new(UserStore::new(&config.storage.users_file));

    let oauth = Arc::new(
        OAuthManager::from_config(&config).context("Failed to configure OAuth clients")?,
    );

    let uploader = Arc::new(
        VideoUploader::new(config.upload.clone(), Arc::clone(&credentials))
            .context("Failed to initialize video uploader")?,
    );

    if config.content.api_key.is_none() {
        info!("No generative API key configured, content endpoints will serve fallback output");
    }
    let content = Arc::new(ContentService::new(Arc::new(GeminiClient::new(
        &config.content,
    ))));

    let sessions = SessionStore::new(
        config.server.session_cookie.clone(),
        config.server.session_ttl_seconds,
        config.server.state_ttl_seconds,
    );
    tokio::spawn(run_session_cleanup(
        sessions.clone(),
        SESSION_CLEANUP_INTERVAL_SECS,
    ));

    let state = AppState {
        server: config.server.clone(),
        sessions,
        oauth,
        users,
        uploader,
        content,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("SocialKit stopped");

    Ok(())
}
