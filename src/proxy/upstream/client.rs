// Upstream client: one outbound HTTP exchange per proxied call

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use thiserror::Error;
use tokio::time::Duration;

use crate::error::AppResult;
use crate::proxy::config::UpstreamProxyConfig;

/// Raw upstream response, body fully read
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport-level failure: no usable response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no response within {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Transport(String),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout(_))
    }
}

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(proxy_config: Option<UpstreamProxyConfig>) -> AppResult<Self> {
        let http_client = crate::utils::http::create_client_with_proxy(proxy_config)?;
        Ok(Self { http_client })
    }

    /// Send one request and read the whole response body.
    ///
    /// `timeout` bounds the entire exchange; when it fires the in-flight
    /// request is dropped.
    pub async fn dispatch(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<UpstreamResponse, DispatchError> {
        let timeout_ms = timeout.as_millis() as u64;

        let mut builder = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(UpstreamResponse {
                status,
                headers,
                body,
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(DispatchError::Timeout(timeout_ms)),
            Ok(Err(e)) => Err(DispatchError::Transport(describe(e))),
            Err(_) => Err(DispatchError::Timeout(timeout_ms)),
        }
    }
}

/// Error text with its source chain. The URL is dropped since it may carry
/// query-string credentials.
fn describe(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
