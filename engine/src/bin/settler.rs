//! Standalone settlement worker: settles every active trade when it expires and keeps
//! sweeping for trades without a timer.

use engine::telemetry::init_tracing;
use engine::EngineState;
use shared::Config;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let state = EngineState::connect(&config).await?;
    let sweep = state.start_settlement().await?;

    info!(interval_secs = state.recovery_interval.as_secs(), "Settler running");
    tokio::signal::ctrl_c().await?;
    info!(pending = state.settlement.pending(), "Shutting down settler");
    sweep.abort();
    Ok(())
}
