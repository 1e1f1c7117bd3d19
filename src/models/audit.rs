use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One proxied call, written once and never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub connection_id: String,
    pub connection_name: String,
    pub client_id: String,
    pub client_name: String,
    pub method: String,
    pub host: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u64,
    pub response_size: usize,
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditLogEntry {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
