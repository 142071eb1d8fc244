use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripmate::api::rate_limit::spawn_cleanup_task;
use tripmate::cli::Cli;
use tripmate::config::Config;
use tripmate::notifications::build_mailer;
use tripmate::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command.is_some() {
        return tripmate::cli::run_command(&cli).await;
    }

    let config = Config::load(&cli.config)?;

    // RUST_LOG wins, then --log-level, then the config file
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();
    init_logging(&log_level);

    tracing::info!("Starting Tripmate v{}", env!("CARGO_PKG_VERSION"));
    if config.auth.generated_secret {
        tracing::warn!("No jwt_secret configured; sessions will not survive a restart");
    }

    let db = tripmate::db::init(&config.server.data_dir)
        .await
        .context("Failed to initialize database")?;

    let mailer = build_mailer(&config.email);
    let state = Arc::new(AppState::new(config.clone(), db, mailer));

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    let app = tripmate::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
