//! consult-relay：流式问诊中继服务
//!
//! Configuration comes from the environment; see `consult_relay::config`.
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::Context;
use consult_relay::RelayConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    consult_relay::server::serve(config)
        .await
        .context("relay server failed")?;
    Ok(())
}
