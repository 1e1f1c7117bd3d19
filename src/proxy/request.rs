use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::errors::GatewayError;

/// One call a client wants forwarded to a connection
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    pub connection_id: String,
    pub method: String,
    /// Path relative to the connection's base URL
    pub path: String,
    /// Query parameters in caller order
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ProxyRequest {
    pub fn new(
        connection_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Upstream response body, decoded by content type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Length of the body as it would be re-serialized to the caller
    pub fn serialized_len(&self) -> usize {
        match self {
            ResponseBody::Json(value) => value.to_string().len(),
            ResponseBody::Text(text) => text.len(),
        }
    }
}

/// Any response received from upstream, whatever its status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySuccess {
    pub success: bool,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub data: ResponseBody,
    pub latency_ms: u64,
}

pub type ProxyResult = Result<ProxySuccess, GatewayError>;
