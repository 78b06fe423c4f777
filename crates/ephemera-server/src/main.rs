mod config;
mod sweeper;

use std::sync::Arc;

use tracing::info;

use ephemera_api::routes::router;
use ephemera_api::state::{AppState, AppStateInner};
use ephemera_core::RecordStore;
use ephemera_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "ephemera=debug,ephemera_core=debug,ephemera_db=info,ephemera_api=debug,\
                     tower_http=debug"
                        .into()
                }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Database::open(&config.db_path, config.store_timeout)?;
    let store: Arc<dyn RecordStore> = Arc::new(db);

    // Deadlines are enforced even if nobody comes back to look
    tokio::spawn(sweeper::run_sweep_loop(store.clone(), config.sweep_interval));

    let state: AppState = Arc::new(AppStateInner {
        store,
        jwt_secret: config.jwt_secret.clone(),
        public_base_url: config.public_base_url.clone(),
    });

    let app = router(state);

    info!("Ephemera listening on {}", config.addr);
    info!("Sweeping overdue messages every {:?}", config.sweep_interval);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
