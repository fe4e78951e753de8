//! # TeamSync Worker
//!
//! Periodically reconciles cached roles and team memberships against team
//! leadership in PostgreSQL.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p teamsync-worker
//! ```

use std::sync::Arc;

use teamsync_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::PgStore,
};
use teamsync_worker::{config::WorkerConfig, reconciler::RoleReconciler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamsync_worker=debug,teamsync_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TeamSync Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let reconciler = RoleReconciler::new(
        Arc::new(PgStore::new(pool.clone())),
        config.reconcile_interval(),
    );
    let shutdown = reconciler.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received, exiting...");
        shutdown.cancel();
    });

    reconciler.run().await;

    close_pool(pool).await;
    Ok(())
}
