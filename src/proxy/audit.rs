//! Audit trail for dispatched proxy calls.
//!
//! Each call that reaches the dispatch stage produces exactly one
//! `AuditLogEntry`, persisted through the store and mirrored as a structured
//! `tracing` event. Credentials and request bodies are never included.

use chrono::Utc;
use tracing::{info, warn};

use super::store::ProxyStore;
use crate::models::{AuditLogEntry, Client, Connection};

/// Identity of one call, known once validation has passed
pub struct AuditDraft<'a> {
    pub client: &'a Client,
    pub connection: &'a Connection,
    pub method: String,
    pub host: String,
    pub path: &'a str,
    pub ip_address: &'a str,
}

impl AuditDraft<'_> {
    pub fn success(&self, status: u16, latency_ms: u64, response_size: usize) -> AuditLogEntry {
        self.entry(status, latency_ms, response_size, None)
    }

    pub fn failure(&self, status: u16, latency_ms: u64, error: String) -> AuditLogEntry {
        self.entry(status, latency_ms, 0, Some(error))
    }

    fn entry(
        &self,
        status: u16,
        latency_ms: u64,
        response_size: usize,
        error: Option<String>,
    ) -> AuditLogEntry {
        AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            connection_id: self.connection.id.clone(),
            connection_name: self.connection.name.clone(),
            client_id: self.client.id.clone(),
            client_name: self.client.name.clone(),
            method: self.method.clone(),
            host: self.host.clone(),
            path: self.path.to_string(),
            status,
            latency_ms,
            response_size,
            ip_address: self.ip_address.to_string(),
            error,
        }
    }
}

/// Persist an entry. A failed write is logged and otherwise ignored.
pub async fn record<S: ProxyStore + ?Sized>(store: &S, entry: AuditLogEntry) {
    log_entry(&entry);
    let id = entry.id.clone();
    if let Err(e) = store.add_audit_log(entry).await {
        warn!("Failed to write audit log {}: {}", id, e);
    }
}

fn log_entry(entry: &AuditLogEntry) {
    info!(
        target: "api_bridge::audit",
        connection = %entry.connection_id,
        client = %entry.client_id,
        method = %entry.method,
        host = %entry.host,
        path = %entry.path,
        status = entry.status,
        latency_ms = entry.latency_ms,
        response_size = entry.response_size,
        ip = %entry.ip_address,
        error = entry.error.as_deref().unwrap_or(""),
        "proxy call completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::Settings;
    use crate::proxy::store::MemoryStore;
    use crate::test_support::{sample_client, sample_connection};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl ProxyStore for FailingStore {
        async fn get_connection_by_id(&self, _id: &str) -> AppResult<Option<Connection>> {
            Ok(None)
        }
        async fn get_client_by_token(&self, _token: &str) -> AppResult<Option<Client>> {
            Ok(None)
        }
        async fn get_settings(&self) -> AppResult<Settings> {
            Ok(Settings::default())
        }
        async fn add_audit_log(&self, _entry: AuditLogEntry) -> AppResult<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
    }

    fn draft<'a>(client: &'a Client, connection: &'a Connection) -> AuditDraft<'a> {
        AuditDraft {
            client,
            connection,
            method: "GET".to_string(),
            host: "api.example.com".to_string(),
            path: "/orders",
            ip_address: "10.0.0.1",
        }
    }

    #[tokio::test]
    async fn test_record_appends_entry() {
        let client = sample_client();
        let connection = sample_connection("https://api.example.com");
        let store = MemoryStore::new();

        record(&store, draft(&client, &connection).success(200, 12, 34)).await;

        let logs = store.audit_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, 200);
        assert_eq!(logs[0].response_size, 34);
        assert_eq!(logs[0].client_name, "Test Client");
        assert!(!logs[0].is_failure());
    }

    #[tokio::test]
    async fn test_record_swallows_store_errors() {
        let client = sample_client();
        let connection = sample_connection("https://api.example.com");
        record(
            &FailingStore,
            draft(&client, &connection).failure(502, 5, "refused".to_string()),
        )
        .await;
    }
}
