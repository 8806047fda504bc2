use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use syncbot::config::AppConfig;
use syncbot::server::{create_router, AppState};
use syncbot::shutdown::{graceful_shutdown, wait_for_shutdown};

#[derive(Parser)]
#[command(
    name = "syncbot",
    about = "Mirror GitHub pull requests, issues and comments into a database"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

// Single-threaded: bulk sync and webhook handling interleave but never run in parallel.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        "Starting syncbot"
    );

    let state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            // Keep running without serving until a signal arrives.
            tracing::error!(error = %e, "Failed to initialize; not serving webhooks or syncing");
            wait_for_shutdown().await;
            return Ok(());
        }
    };

    // Start the task queue processor
    let queue_state = Arc::clone(&state);
    tokio::spawn(async move {
        syncbot::queue::run_queue_processor(queue_state).await;
    });

    let startup_state = Arc::clone(&state);
    tokio::spawn(async move {
        syncbot::queue::startup::enqueue_startup_sync(&startup_state).await;
    });

    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}
