use reqwest::{Client, Proxy};

use crate::error::{AppError, AppResult};
use crate::proxy::config::UpstreamProxyConfig;

const USER_AGENT: &str = concat!("api_bridge/", env!("CARGO_PKG_VERSION"));

/// Create the HTTP client used for upstream calls.
///
/// No client-wide timeout is set; each call carries the timeout from the
/// current settings.
pub fn create_client_with_proxy(proxy_config: Option<UpstreamProxyConfig>) -> AppResult<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);

    if let Some(config) = proxy_config {
        if config.enabled && !config.url.is_empty() {
            let proxy = Proxy::all(&config.url).map_err(|e| {
                AppError::Config(format!("Invalid upstream proxy {}: {}", config.url, e))
            })?;
            builder = builder.proxy(proxy);
            tracing::info!("HTTP client upstream proxy enabled: {}", config.url);
        }
    }

    Ok(builder.build()?)
}
