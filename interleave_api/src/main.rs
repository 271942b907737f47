/**
 * This is the main entrypoint for the `interleave_api` service.
 *
 * It accepts uploaded videos, interleaves them with `interleave_job` inside
 * a per-request session directory and serves the result for download.
 */
use std::{net::IpAddr, net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{
        Request, StatusCode,
        header::{self, ACCEPT, CONTENT_TYPE, ORIGIN},
    },
    routing::{get, post},
};
use interleave_job::{FfmpegBackend, JobConfig, MediaBackend, Pipeline};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod error;
mod handlers;
mod session;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    host: IpAddr,
    port: u16,
    /// Parent of the per-request session directories.
    temp_dir: PathBuf,
    /// Where finished videos are kept for download.
    output_dir: PathBuf,
    min_videos: usize,
    max_videos: usize,
    /// Bounds of the requested duration, in seconds.
    min_duration: i64,
    max_duration: i64,
    max_upload_bytes: usize,
    #[serde(flatten)]
    job: JobConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            min_videos: 2,
            max_videos: 10,
            min_duration: 6,
            max_duration: 600,
            max_upload_bytes: 1024 * 1024 * 1024,
            job: JobConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct AppContext<B> {
    config: Arc<Config>,
    pipeline: Arc<Pipeline<B>>,
}

impl<B> Clone for AppContext<B> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl vi_app::ContextProvider<Config> for AppContext<FfmpegBackend> {
    async fn new(config: Config) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::from_config(&config.job)),
            config: Arc::new(config),
        }
    }
}

pub fn router<B: MediaBackend>(context: AppContext<B>) -> Router {
    // Set up a trace layer
    let trace_layer = TraceLayer::new_for_http().on_request(
        |request: &Request<Body>, _: &tracing::Span| {
            tracing::info!(
                "received request: {method} {uri}",
                method = request.method(),
                uri = request.uri()
            );
        },
    );

    // Set up a CORS layer
    let cors_layer = CorsLayer::new()
        .allow_headers([ACCEPT, CONTENT_TYPE, ORIGIN])
        .allow_methods(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any);

    let body_limit = DefaultBodyLimit::max(context.config.max_upload_bytes);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/process", post(handlers::process::<B>))
        .route("/download/{filename}", get(handlers::download::<B>))
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "application/json")],
                Json(json!({
                    "error": "not found",
                })),
            )
        })
        .layer(body_limit)
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(context)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging and the application context
    let context = vi_app::create_app_context::<AppContext<FfmpegBackend>, Config>()
        .await?;

    tokio::fs::create_dir_all(&context.config.temp_dir).await?;
    tokio::fs::create_dir_all(&context.config.output_dir).await?;

    let addr = SocketAddr::from((context.config.host, context.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::warn!("signal received, starting graceful shutdown");
}
