use anyhow::Result;
use api::{router, AppState};
use engine::telemetry::init_tracing;
use engine::EngineState;
use migration::{Migrator, MigratorTrait};
use shared::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(git_hash = api::routes::meta::GIT_HASH, "Starting binary trading API server...");

    let config = Config::from_env()?;
    let state = EngineState::connect(&config).await?;

    if config.run_migrations {
        if let Some(db) = &state.db {
            Migrator::up(db.as_ref(), None).await?;
            info!("Database migrations applied");
        }
    }

    let sweep = state.start_settlement().await?;
    let app = router(AppState::new(state.trading.clone()));

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    info!("API server listening on http://{}", config.api_bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweep.abort();
    info!(pending = state.settlement.pending(), "API server stopped");
    Ok(())
}
