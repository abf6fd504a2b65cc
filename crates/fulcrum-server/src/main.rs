//! Fulcrum Server — Application entry point.

use fulcrum_db::{DbManager, SurrealStore};
use fulcrum_domain::Sweeper;
use fulcrum_server::{AppState, ServerConfig, StartupError, router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fulcrum=info")),
        )
        .json()
        .init();

    tracing::info!("Starting Fulcrum server...");

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Fulcrum server failed");
        std::process::exit(1);
    }

    tracing::info!("Fulcrum server stopped.");
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::load()?;
    if config.auth.bootstrap_admin_token.is_some() {
        tracing::warn!("bootstrap admin token is configured");
    }

    let db = DbManager::connect(&config.database).await?;
    fulcrum_db::run_migrations(db.client()).await?;
    let store = SurrealStore::new(db.client().clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(Sweeper::new(store.clone(), config.domain.clone()).run(shutdown_rx));

    let app = router(AppState::new(store, config.auth, config.domain));
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| StartupError::Listen {
            addr: config.listen_addr.clone(),
            source,
        })?;
    tracing::info!(addr = %config.listen_addr, "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| StartupError::Listen {
            addr: config.listen_addr.clone(),
            source,
        });

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "sweeper task panicked");
    }
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
