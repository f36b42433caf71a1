//! Forge Server
//!
//! HTTP front end for the generator: chat generation with per-user daily
//! quotas, and publishing of single-file documents under shareable URLs.

mod error;
mod handlers;
mod services;
mod storage;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use forge_core::{forge_home, ConfigManager, ImageChecker, OpenAiProvider, TextGenerator};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use services::QuotaRegistry;
use storage::PublishStore;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8787";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8787";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub quotas: Arc<QuotaRegistry>,
    pub sites: Arc<PublishStore>,
    pub images: Option<ImageChecker>,
    pub public_base_url: Arc<str>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forge_server=info,tower_http=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Forge Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, public_url={}",
        config.bind_address, config.public_base_url
    );

    let forge = config.forge;
    if forge.provider.api_key.is_none() {
        warn!("No API key configured; chat requests will fail");
    }
    let provider = OpenAiProvider::new(forge.provider.clone())
        .context("Failed to create text-generation client")?;

    let state = AppState {
        generator: Arc::new(provider),
        quotas: Arc::new(QuotaRegistry::new(
            forge.quota.daily_limit,
            forge.quota.enabled,
        )),
        sites: Arc::new(PublishStore::new()),
        images: Some(ImageChecker::new()),
        public_base_url: config.public_base_url.into(),
    };

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}

/// Router with every route and layer
fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/publish", post(handlers::publish::publish))
        .route("/view/:id", get(handlers::publish::view))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: String,
    public_base_url: String,
    forge: forge_core::ForgeConfig,
}

fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let (forge, source) = ConfigManager::new().resolve(&cwd, &forge_home())?;
    match source {
        Some(path) => info!("Using Forge configuration from {}", path.display()),
        None => info!("Using default Forge configuration"),
    }

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let public_base_url =
        std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string());

    Ok(Config {
        bind_address,
        public_base_url,
        forge,
    })
}
