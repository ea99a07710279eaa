//! `nspanel run`: connect to Home Assistant and serve every panel until
//! interrupted.

use tokio_util::sync::CancellationToken;
use tracing::info;

use nspanel_api::HassClient;
use nspanel_api::websocket::ReconnectConfig;
use nspanel_config::AppConfig;
use nspanel_core::HassBridge;

use crate::error::CliError;

pub async fn handle(config: AppConfig) -> Result<(), CliError> {
    let ha = &config.home_assistant;
    let url = ha.base_url()?;
    let token = ha.resolve_token()?;
    let client = HassClient::new(url.clone(), &token, &ha.transport())?;

    let cancel = CancellationToken::new();
    let bridge = HassBridge::start(
        client,
        &token,
        config.panels,
        ReconnectConfig::default(),
        cancel,
    )
    .await?;
    info!(%url, panels = bridge.panels().len(), "serving panels");

    shutdown_signal().await?;
    info!("shutting down");
    bridge.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), CliError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
