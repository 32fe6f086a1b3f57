//! PointNote annotation service entry point.
//!
//! # Responsibility
//! - Read configuration, initialise logging and prepare the store schema.
//! - Serve the annotation router until Ctrl-C.

mod config;

use anyhow::{anyhow, Context};
use config::ServerConfig;
use log::{info, warn};
use pointnote_api::{router, AppState};
use pointnote_core::db::open_db;
use pointnote_core::{core_version, init_logging, init_stderr_logging};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    let logging = match &config.log_dir {
        Some(dir) => init_logging(config.log_level, &dir.to_string_lossy()),
        None => init_stderr_logging(config.log_level),
    };
    logging
        .map_err(|message| anyhow!(message))
        .context("failed to initialise logging")?;

    // Migrate once up front so a broken store fails boot, not the first request.
    open_db(&config.db_path)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        "event=server_start module=server status=ok addr={} db_path={} version={}",
        listener.local_addr()?,
        config.db_path.display(),
        core_version()
    );

    let app = router(AppState::new(config.db_path));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated abnormally")?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=server_signal module=server status=error error={err}");
        std::future::pending::<()>().await;
    }
}
