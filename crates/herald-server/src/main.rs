//! `herald-server`: serves the channel registry over HTTP.
//!
//! Usage: `herald-server [CONFIG_PATH]`. Without an argument the path comes
//! from `HERALD_CONFIG_PATH`, then falls back to `config.toml`. A missing
//! file means defaults plus `HERALD_*` environment overrides.

use std::net::SocketAddr;
use std::process::ExitCode;

use herald_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings, MigrationError, PoolError};
use herald_server::config::{self, Config, ConfigError, LoggingConfig};
use herald_server::{app, AppState};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Anything that stops the server before or while it serves.
#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("no database connection for migrations: {0}")]
    Connection(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server terminated: {0}")]
    Serve(#[source] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be up yet, so stderr as well.
            tracing::error!(error = %e, "herald-server exiting");
            eprintln!("herald-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HERALD_CONFIG_PATH").ok())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = config::load_config(Some(&config_path))?;
    init_tracing(&config.logging);
    tracing::info!(path = %config_path, "configuration loaded");

    let pool = open_database(&config)?;
    let state = AppState::new(pool, config.stream.capacity);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_requested())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Builds the pool and brings the schema up to date before any request is
/// accepted.
fn open_database(config: &Config) -> Result<DbPool, StartupError> {
    let pool = create_pool(
        &config.database.path,
        DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;

    let conn = pool.get()?;
    let applied = run_migrations(&conn)?;
    tracing::info!(
        path = %config.database.path,
        applied,
        "database ready"
    );
    Ok(pool)
}

/// Resolves on Ctrl+C, or on SIGTERM where signals exist.
async fn shutdown_requested() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("interrupt received, draining connections"),
        () = terminate => tracing::info!("SIGTERM received, draining connections"),
    }
}
