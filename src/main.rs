//! OrgHub - student organization management server
//!
//! Serves the JSON API for accounts, organizations, memberships, join
//! requests and organization content.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use orghub::{
    api,
    config::{LogFormat, LogTarget, LoggingConfig},
    db, middleware,
    services::AuthService,
    AppConfig, AppState,
};

/// How often idle per-organization locks are dropped
const ORG_LOCK_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("OrgHub {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration before logging so the log format is known
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&config.logging);

    info!("OrgHub {} starting up", env!("CARGO_PKG_VERSION"));

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    if let Some(ref admin) = config.bootstrap_admin {
        AuthService::new(db.clone())
            .ensure_bootstrap_admin(admin)
            .await
            .context("Failed to create bootstrap administrator")?;
    }

    let state = AppState::new(config.clone(), db);
    state.org_locks.spawn_cleanup(ORG_LOCK_CLEANUP_INTERVAL);

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

/// Initialize tracing for the configured target and format
///
/// Returns the file writer guard when logs go to a file.
fn init_logging(log_config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let to_console = matches!(log_config.target, LogTarget::Console | LogTarget::Both);
    let (file_writer, guard) = match log_config.target {
        LogTarget::Console => (None, None),
        LogTarget::File | LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            (Some(writer), Some(guard))
        }
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match log_config.format {
        LogFormat::Json => registry
            .with(to_console.then(|| fmt::layer().json().with_target(true)))
            .with(file_writer.map(|w| fmt::layer().json().with_target(true).with_writer(w)))
            .init(),
        LogFormat::Compact => registry
            .with(to_console.then(|| fmt::layer().compact().with_target(false)))
            .with(file_writer.map(|w| {
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(w)
            }))
            .init(),
        LogFormat::Pretty => registry
            .with(to_console.then(|| fmt::layer().with_target(true).with_thread_ids(false)))
            .with(file_writer.map(|w| {
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(w)
            }))
            .init(),
    }

    guard
}

/// Non-blocking file writer, rotated daily when configured
fn create_file_writer(
    log_config: &LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Directory holding the SQLite file, if the URL names one
fn data_directory(database_url: &str) -> Option<&std::path::Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    std::path::Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}

fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(parent) = data_directory(&config.database.url) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
            info!("Created data directory: {:?}", parent);
        }
    }
    Ok(())
}

/// Build the application router
///
/// Protected routes run authentication first, then the maintenance gate.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .nest("/api/v1", api::public_routes())
        .nest(
            "/api/v1",
            api::protected_routes()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::maintenance_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        )
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_help() {
    println!(
        r#"OrgHub {}

USAGE:
    orghub [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    ORGHUB_CONFIG           Path to configuration file
    ORGHUB_HOST             Listen address
    ORGHUB_PORT             Listen port
    DATABASE_URL            SQLite database URL
    JWT_SECRET              Token signing secret (at least 32 characters)
    ORGHUB_ADMIN_EMAIL      Bootstrap administrator email
    ORGHUB_ADMIN_PASSWORD   Bootstrap administrator password
    RUST_LOG                Log filter (overrides logging.level)

CONFIGURATION:
    The configuration file is looked up in this order:
    1. Path given by ORGHUB_CONFIG
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/orghub/config.yaml
    5. <user config dir>/orghub/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
