// src/main.rs

use axum::serve;
use clap::Parser;
use gstin_lookup::{
    cli::{Cli, Commands},
    config, run, setup_configuration, AppError, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));

    if cli.json_logs {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        None | Some(Commands::Serve) => serve_forever(cli.config, cli.port).await,
        Some(Commands::Check { gstin, retries }) => one_shot_check(cli.config, gstin, retries).await,
        Some(Commands::Config { file }) => validate_config_file(file.or(cli.config)),
    }
}

async fn serve_forever(
    config_override: Option<std::path::PathBuf>,
    port_override: Option<u16>,
) -> Result<(), AppError> {
    let (app, config) = run(config_override).map_err(|e| {
        eprintln!("Application setup error: {e:?}");
        e
    })?;

    let port = port_override.unwrap_or(config.server.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        AppError::from(e)
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            AppError::from(e)
        })?;

    info!("Server shut down gracefully.");
    Ok(())
}

/// Mirrors the HTTP surface for operators: look up one GSTIN from the command
/// line and print the verbatim registry payload.
async fn one_shot_check(
    config_override: Option<std::path::PathBuf>,
    gstin: String,
    retries: Option<u32>,
) -> Result<(), AppError> {
    let (config, _) = setup_configuration(config_override)?;
    let state = AppState::new(&config)?;

    let gstin = gstin.trim().to_string();
    if gstin.is_empty() {
        return Err(AppError::MissingGstin);
    }

    let mut policy = config.lookup.retry_policy();
    if let Some(max_retries) = retries {
        policy.max_retries_per_key = max_retries.max(1);
    }
    let client = state.lookup.clone().with_policy(policy);

    match client.lookup(&config.api_keys, &gstin).await {
        Ok(success) => {
            info!(
                used_key_index = success.used_key_index,
                used_key_label = %success.used_key_label,
                "Lookup succeeded"
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&success.result)
                    .map_err(|e| AppError::Internal(format!("Failed to render payload: {e}")))?
            );
            Ok(())
        }
        Err(report) => {
            eprintln!("Failed to retrieve GSTIN details:");
            eprintln!("{report}");
            std::process::exit(1);
        }
    }
}

fn validate_config_file(file: Option<std::path::PathBuf>) -> Result<(), AppError> {
    let path = file.unwrap_or_else(|| std::path::PathBuf::from("config.yaml"));
    let config = config::load_config(&path)?;
    println!("Configuration OK:");
    println!("  endpoint:            {}", config.lookup.endpoint);
    println!("  key slots:           {}", config.lookup.key_slots);
    println!("  retries per key:     {}", config.lookup.max_retries_per_key);
    println!("  initial backoff:     {}ms", config.lookup.initial_backoff_ms);
    println!("  attempt timeout:     {}s", config.lookup.timeout_secs);
    println!(
        "  listen address:      {}:{}",
        config.server.host, config.server.port
    );
    Ok(())
}
