use crate::api::{self, AppState};
use crate::audit::AuditLogger;
use crate::config::types::AppConfig;
use crate::context::AppContext;
use crate::metrics::MetricsRegistry;
use crate::store::InventoryStore;
use crate::terminal::SessionManager;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Open the store, make sure an administrator exists and wire the shared
/// services together.
pub fn build_context(config: AppConfig) -> Result<Arc<AppContext>> {
    let config = Arc::new(config);

    let store = match &config.storage.data_dir {
        Some(dir) => InventoryStore::open(dir)
            .with_context(|| format!("opening inventory store in {}", dir.display()))?,
        None => {
            warn!("No storage.data_dir configured, inventory is kept in memory only");
            InventoryStore::in_memory()
        }
    };
    let store = Arc::new(store);

    let audit = Arc::new(AuditLogger::new(config.logging.audit_log_path.clone()));
    let metrics = Arc::new(MetricsRegistry::new());
    let ctx = Arc::new(AppContext::new(config, store, audit, metrics));

    ctx.auth
        .bootstrap_admin(&ctx.config.bootstrap)
        .context("bootstrapping administrator")?;
    Ok(ctx)
}

/// Run the terminal server until Ctrl-C or SIGTERM.
pub async fn run(config: AppConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            token.cancel();
        });
    }
    run_until(config, shutdown).await
}

/// Run the terminal server until `shutdown` is cancelled, then give open
/// connections `server.shutdown_timeout` seconds to finish.
pub async fn run_until(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    let listen = config.server.listen.clone();
    let shutdown_timeout = config.server.shutdown_timeout;

    let ctx = build_context(config)?;
    let sessions = Arc::new(SessionManager::new(ctx.clone()));
    let state = AppState::new(sessions.clone());

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {}", listen))?;
    info!(addr = %listen, "Terminal server listening");

    let mut server = tokio::spawn(api::start_api_server_on_listener(
        listener,
        state,
        shutdown.clone(),
    ));

    tokio::select! {
        res = &mut server => {
            return match res {
                Ok(inner) => inner,
                Err(e) => Err(anyhow::anyhow!("server task failed: {}", e)),
            };
        }
        _ = shutdown.cancelled() => {}
    }

    info!(timeout = shutdown_timeout, "Initiating graceful shutdown");
    match tokio::time::timeout(Duration::from_secs(shutdown_timeout), &mut server).await {
        Ok(Ok(Ok(()))) => info!("Graceful shutdown complete"),
        Ok(Ok(Err(e))) => error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "Server task failed during shutdown"),
        Err(_) => {
            warn!(
                active_sessions = sessions.active_sessions(),
                "Shutdown timeout reached, forcing exit"
            );
            server.abort();
        }
    }
    if let Err(e) = ctx.store.flush() {
        error!(error = %e, "Failed to save system log on shutdown");
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, initiating graceful shutdown");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("Ctrl-C received, initiating graceful shutdown"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        },
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, initiating graceful shutdown"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
