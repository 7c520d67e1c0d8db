// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lookup;
pub mod state;

use crate::handlers::{check_gstin, health_check};
use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use state::AppState;

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/gstin/check", post(check_gstin))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Middleware attaching a request ID and a tracing span to every request.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        response.headers_mut().insert(
            "X-Request-ID",
            HeaderValue::from_str(&request_id.to_string()).unwrap(),
        );

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads configuration, initializes state, and assembles the router.
pub fn run(config_path_override: Option<PathBuf>) -> Result<(Router, AppConfig)> {
    info!("Starting GSTIN lookup service...");

    let (app_config, _config_path) = setup_configuration(config_path_override)?;
    let app_state = Arc::new(AppState::new(&app_config)?);
    info!("Application state initialized successfully.");

    let app = create_router(app_state).layer(axum::middleware::from_fn(trace_requests));

    Ok((app, app_config))
}

/// Loads, validates, and logs the application configuration.
pub fn setup_configuration(
    config_path_override: Option<PathBuf>,
) -> Result<(AppConfig, PathBuf)> {
    let config_path = config_path_override.unwrap_or_else(|| {
        std::env::var("GSTIN_LOOKUP_CONFIG")
            .map_or_else(|_| PathBuf::from("config.yaml"), PathBuf::from)
    });

    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(config.path = %config_path_display, "Optional configuration file not found. Using defaults and environment variables.");
    }

    let app_config = config::load_config(&config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;

    info!(
        lookup.endpoint = %app_config.lookup.endpoint,
        lookup.key_slots = app_config.lookup.key_slots,
        server.port = app_config.server.port,
        "Configuration loaded and validated successfully."
    );

    Ok((app_config, config_path))
}
