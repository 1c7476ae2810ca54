//! PDF Translate API Server
//!
//! Accepts one PDF per request and returns it translated by the BabelDOC
//! engine, with layout preserved. Provides REST API endpoints for:
//!
//! - Health checks
//! - PDF translation (translated-only or bilingual output)
//!
//! ## Architecture
//!
//! Requests are rate limited per client before the upload is read. Each
//! accepted upload becomes one engine run in an isolated workspace, driven by
//! `pdf-translate-core`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use pdf_translate_core::{EngineConfig, EngineCredentials, Orchestrator, RateLimitConfig, RateLimiter};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
#[cfg(test)]
mod tests;

use api::{handle_health, handle_translate_pdf};

/// Allowance for multipart boundaries and the small text fields on top of the file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Command-line arguments for the translation server
#[derive(Parser, Debug)]
#[command(name = "pdf-translate-api")]
#[command(about = "PDF translation service backed by BabelDOC")]
struct Args {
    /// Host address to bind to
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "APP_PORT", default_value = "8080")]
    port: u16,

    /// BabelDOC executable name or path
    #[arg(long, env = "BABELDOC_BIN", default_value = "babeldoc")]
    babeldoc_bin: String,

    /// Wall-clock limit for one engine run, in seconds
    #[arg(long, env = "BABELDOC_TIMEOUT_SECONDS", default_value = "900")]
    babeldoc_timeout_seconds: u64,

    /// Extra engine arguments, split with shell quoting rules
    #[arg(long, env = "BABELDOC_EXTRA_ARGS", default_value = "", allow_hyphen_values = true)]
    babeldoc_extra_args: String,

    /// Directory holding per-job workspaces
    #[arg(long, env = "BABELDOC_WORK_ROOT", default_value = ".tmp/babeldoc-jobs")]
    babeldoc_work_root: PathBuf,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "TRANSLATE_PDF_MAX_BYTES", default_value = "26214400")]
    translate_pdf_max_bytes: usize,

    /// Longest accepted language token
    #[arg(long, env = "TRANSLATE_LANGUAGE_TOKEN_MAX_LENGTH", default_value = "16")]
    translate_language_token_max_length: usize,

    /// Rate limit window, in seconds
    #[arg(long, env = "TRANSLATE_RATE_LIMIT_WINDOW_SECONDS", default_value = "600")]
    translate_rate_limit_window_seconds: u64,

    /// Requests allowed per client per window
    #[arg(long, env = "TRANSLATE_RATE_LIMIT_MAX_REQUESTS", default_value = "4")]
    translate_rate_limit_max_requests: u32,

    /// API key passed to the engine as OPENAI_API_KEY
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    openai_api_key: String,

    /// Base URL passed to the engine as OPENAI_BASE_URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "")]
    openai_base_url: String,

    /// Model passed to the engine as OPENAI_MODEL
    #[arg(long, env = "OPENAI_MODEL", default_value = "")]
    openai_model: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.babeldoc_timeout_seconds > 0, "BABELDOC_TIMEOUT_SECONDS must be at least 1");
        ensure!(self.translate_pdf_max_bytes > 0, "TRANSLATE_PDF_MAX_BYTES must be at least 1");
        ensure!(
            self.translate_language_token_max_length > 0,
            "TRANSLATE_LANGUAGE_TOKEN_MAX_LENGTH must be at least 1"
        );
        ensure!(
            self.translate_rate_limit_window_seconds > 0,
            "TRANSLATE_RATE_LIMIT_WINDOW_SECONDS must be at least 1"
        );
        ensure!(
            self.translate_rate_limit_max_requests > 0,
            "TRANSLATE_RATE_LIMIT_MAX_REQUESTS must be at least 1"
        );
        Ok(())
    }

    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let config = EngineConfig {
            binary: self.babeldoc_bin.clone(),
            timeout: Duration::from_secs(self.babeldoc_timeout_seconds),
            extra_args: Vec::new(),
            work_root: self.babeldoc_work_root.clone(),
            credentials: EngineCredentials {
                api_key: self.openai_api_key.clone(),
                base_url: self.openai_base_url.clone(),
                model: self.openai_model.clone(),
            },
        };
        config
            .with_extra_args(&self.babeldoc_extra_args)
            .context("BABELDOC_EXTRA_ARGS")
    }

    fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(self.translate_rate_limit_window_seconds),
            max_requests: self.translate_rate_limit_max_requests,
        }
    }
}

/// Per-request upload bounds
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub language_token_max_length: usize,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub limiter: Arc<RateLimiter>,
    pub limits: UploadLimits,
}

/// Full router with middleware applied
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .limits
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/translate/pdf", post(handle_translate_pdf))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    args.validate()?;
    let engine_config = args.engine_config()?;

    info!("Starting pdf-translate-api on {}:{}", args.host, args.port);
    info!(
        "Engine: {} (timeout {}s, {} extra arg(s)), work root {}",
        engine_config.binary,
        engine_config.timeout.as_secs(),
        engine_config.extra_args.len(),
        engine_config.work_root.display()
    );
    info!(
        "Rate limit: {} requests per {}s per client",
        args.translate_rate_limit_max_requests, args.translate_rate_limit_window_seconds
    );

    let state = AppState {
        orchestrator: Orchestrator::new(engine_config),
        limiter: Arc::new(RateLimiter::new(args.rate_limit_config())),
        limits: UploadLimits {
            max_upload_bytes: args.translate_pdf_max_bytes,
            language_token_max_length: args.translate_language_token_max_length,
        },
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
