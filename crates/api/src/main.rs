use anyhow::Context;

use keystone_infra::{AppConfig, LogFormat};
use keystone_observability::LogOutput;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    let output = match config.log.format {
        LogFormat::Json => LogOutput::Json,
        LogFormat::Pretty => LogOutput::Pretty,
    };
    keystone_observability::init_with(output, &config.log.filter);

    let app = keystone_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
