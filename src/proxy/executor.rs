//! Proxy execution pipeline.
//!
//! `validate -> build URL + inject credentials -> dispatch -> audit`.
//! Validation failures return before anything is sent or audited; every call
//! that gets past validation yields exactly one audit entry.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::audit::{self, AuditDraft};
use super::credentials::inject_credentials;
use super::errors::{GatewayError, ProxyErrorKind};
use super::request::{ProxyRequest, ProxyResult, ProxySuccess, ResponseBody};
use super::store::ProxyStore;
use super::target_url::build_target_url;
use super::upstream::client::{DispatchError, UpstreamClient, UpstreamResponse};
use super::validator::{self, ValidatedRequest};
use crate::models::{Connection, Settings};

/// Caller headers that never reach upstream
const STRIPPED_HEADERS: [&str; 4] = ["host", "x-client-token", "connection", "content-length"];

/// Failure after validation, before a usable upstream response
enum ForwardError {
    Timeout(String),
    Upstream(String),
}

impl ForwardError {
    fn kind(&self) -> ProxyErrorKind {
        match self {
            ForwardError::Timeout(_) => ProxyErrorKind::UpstreamTimeout,
            ForwardError::Upstream(_) => ProxyErrorKind::UpstreamError,
        }
    }

    fn message(&self) -> &str {
        match self {
            ForwardError::Timeout(m) | ForwardError::Upstream(m) => m,
        }
    }
}

impl From<DispatchError> for ForwardError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Timeout(_) => ForwardError::Timeout(err.to_string()),
            DispatchError::Transport(message) => ForwardError::Upstream(message),
        }
    }
}

/// Decoded upstream reply
struct Forwarded {
    status: u16,
    headers: BTreeMap<String, String>,
    data: ResponseBody,
}

pub struct ProxyExecutor {
    store: Arc<dyn ProxyStore>,
    upstream: Arc<UpstreamClient>,
}

impl ProxyExecutor {
    pub fn new(store: Arc<dyn ProxyStore>, upstream: Arc<UpstreamClient>) -> Self {
        Self { store, upstream }
    }

    /// Run one proxy call for the client owning `client_token`.
    ///
    /// Any upstream HTTP response, including 4xx/5xx, is a success at this
    /// layer; only transport failures become `UPSTREAM_ERROR`/`UPSTREAM_TIMEOUT`.
    pub async fn execute(
        &self,
        request: ProxyRequest,
        client_token: &str,
        source_ip: &str,
    ) -> ProxyResult {
        let started = Instant::now();

        let ValidatedRequest { client, connection } =
            validator::validate(self.store.as_ref(), &request, client_token).await?;

        let settings = match self.store.get_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                Settings::default()
            }
        };

        let target_url = build_target_url(&connection, &request.path, &request.query);
        let draft = AuditDraft {
            client: &client,
            connection: &connection,
            method: request.method.to_uppercase(),
            host: target_host(&target_url, &connection),
            path: &request.path,
            ip_address: source_ip,
        };

        debug!(
            "Forwarding {} {} for client {} via connection {}",
            draft.method, request.path, client.id, connection.id
        );

        let outcome = self
            .forward(&connection, &request, &target_url, &settings)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(forwarded) => {
                let entry = draft.success(
                    forwarded.status,
                    latency_ms,
                    forwarded.data.serialized_len(),
                );
                audit::record(self.store.as_ref(), entry).await;

                Ok(ProxySuccess {
                    success: true,
                    status: forwarded.status,
                    headers: forwarded.headers,
                    data: forwarded.data,
                    latency_ms,
                })
            }
            Err(err) => {
                let kind = err.kind();
                let entry = draft.failure(kind.code(), latency_ms, err.message().to_string());
                audit::record(self.store.as_ref(), entry).await;

                Err(GatewayError::with_detail(kind, err.message()).latency(latency_ms))
            }
        }
    }

    async fn forward(
        &self,
        connection: &Connection,
        request: &ProxyRequest,
        target_url: &str,
        settings: &Settings,
    ) -> Result<Forwarded, ForwardError> {
        // Parsing errors never echo the URL, it may hold query credentials
        url::Url::parse(target_url)
            .map_err(|e| ForwardError::Upstream(format!("invalid target URL: {}", e)))?;

        let headers = outbound_headers(connection, request)?;

        let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|_| {
            ForwardError::Upstream(format!("invalid HTTP method: {}", request.method))
        })?;

        let body = request
            .body
            .as_ref()
            .map(|body| serde_json::to_vec(body))
            .transpose()
            .map_err(|e| ForwardError::Upstream(format!("failed to encode request body: {}", e)))?;

        let response = self
            .upstream
            .dispatch(
                method,
                target_url,
                headers,
                body,
                Duration::from_millis(settings.upstream_timeout_ms),
            )
            .await?;

        decode_response(response)
    }
}

/// Caller headers plus credentials, with the stripped pass-through headers
/// removed. A body gets a JSON content type unless the caller chose one; a
/// content type coming only from `extra_headers` does not count.
fn outbound_headers(
    connection: &Connection,
    request: &ProxyRequest,
) -> Result<HeaderMap, ForwardError> {
    let mut headers = inject_credentials(connection, &request.headers)
        .map_err(|e| ForwardError::Upstream(format!("credential injection failed: {}", e)))?;

    if request.body.is_some() && !request.headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for name in STRIPPED_HEADERS {
        headers.remove(name);
    }

    Ok(headers)
}

fn decode_response(response: UpstreamResponse) -> Result<Forwarded, ForwardError> {
    let is_json = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    let data = if is_json {
        let value = serde_json::from_slice(&response.body).map_err(|e| {
            ForwardError::Upstream(format!("invalid JSON in upstream response: {}", e))
        })?;
        ResponseBody::Json(value)
    } else {
        ResponseBody::Text(String::from_utf8_lossy(&response.body).into_owned())
    };

    Ok(Forwarded {
        status: response.status,
        headers: flatten_headers(&response.headers),
        data,
    })
}

/// Multi-valued headers are joined with ", "; non-UTF-8 values are skipped
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

fn target_host(target_url: &str, connection: &Connection) -> String {
    url::Url::parse(target_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| connection.base_url.clone())
}
