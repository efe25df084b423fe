mod catalog;
mod config;
mod lifecycle;

use std::sync::Arc;

use anyhow::Result;
use app_updates::ReqwestFetcher;
use compliance::{ReportingDevice, ShellCommandRunner, SystemClock};
use tokio::runtime::Handle;
use tokio::signal;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog::{build_catalog, open_store};
use config::AgentConfig;
use lifecycle::{now_unix, AgentRuntime, TeamClient, TICK_POLL_INTERVAL};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::load()?;
    let store = open_store(&config)?;
    let http = ReqwestFetcher::new(Handle::current(), config.fetch_timeout())?;
    let runner = Arc::new(ShellCommandRunner);
    let device = ReportingDevice::collect(
        runner.as_ref(),
        &config.device_id,
        config.team.send_hw_info,
    );
    let catalog = build_catalog(
        &config,
        &device,
        store,
        runner,
        Arc::new(http),
        Arc::new(SystemClock),
    )?;
    let team_client = TeamClient::from_config(&config.team, config.fetch_timeout())?;

    info!(
        device_id = %config.device_id,
        platform = platform_macos::platform_name(),
        storage = ?config.storage_backend,
        macos_version = %device.macos_version,
        enrolled = team_client.is_some(),
        "posture agent started"
    );

    let mut runtime = AgentRuntime::new(config, catalog.registry, catalog.team, team_client)
        .with_device(device);

    loop {
        let now = now_unix();
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            tick_result = async {
                runtime.tick(now).await?;
                sleep(TICK_POLL_INTERVAL).await;
                Ok::<(), anyhow::Error>(())
            } => {
                tick_result?;
            }
        }
    }

    info!("posture agent stopped");
    Ok(())
}
