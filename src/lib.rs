pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Gateway pipeline and HTTP surface
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use modules::{logger, SqliteStore};
use proxy::upstream::client::UpstreamClient;
use proxy::{AxumServer, ProxyExecutor};

/// Start the gateway and serve until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let data_dir = modules::get_data_dir().context("resolving data directory")?;
    logger::init_logger(&data_dir);

    let config = modules::load_app_config().context("loading config.json")?;
    let db_path = modules::resolve_database_path(&config)?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let upstream = UpstreamClient::new(Some(config.proxy.upstream_proxy.clone()))
        .context("building upstream HTTP client")?;
    let executor = Arc::new(ProxyExecutor::new(Arc::new(store), Arc::new(upstream)));

    let (server, handle) = AxumServer::start(
        config.proxy.get_bind_address().to_string(),
        config.proxy.port,
        executor,
        &config.proxy,
    )
    .await
    .context("starting gateway server")?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    server.stop();
    handle.await.context("gateway task panicked")?;
    Ok(())
}
