//! Storage seam consumed by the proxy pipeline.
//!
//! The pipeline only ever performs single reads and single appends; the
//! backing store is responsible for making each one atomic.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{AppError, AppResult};
use crate::models::{AuditLogEntry, Client, Connection, Settings};

#[async_trait]
pub trait ProxyStore: Send + Sync {
    async fn get_connection_by_id(&self, id: &str) -> AppResult<Option<Connection>>;

    async fn get_client_by_token(&self, token: &str) -> AppResult<Option<Client>>;

    async fn get_settings(&self) -> AppResult<Settings>;

    async fn add_audit_log(&self, entry: AuditLogEntry) -> AppResult<()>;
}

#[async_trait]
impl<T: ProxyStore + ?Sized> ProxyStore for Arc<T> {
    async fn get_connection_by_id(&self, id: &str) -> AppResult<Option<Connection>> {
        (**self).get_connection_by_id(id).await
    }

    async fn get_client_by_token(&self, token: &str) -> AppResult<Option<Client>> {
        (**self).get_client_by_token(token).await
    }

    async fn get_settings(&self) -> AppResult<Settings> {
        (**self).get_settings().await
    }

    async fn add_audit_log(&self, entry: AuditLogEntry) -> AppResult<()> {
        (**self).add_audit_log(entry).await
    }
}

/// In-process store, useful for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    connections: DashMap<String, Connection>, // connection id -> Connection
    clients: DashMap<String, Client>,         // token -> Client
    settings: RwLock<Settings>,
    audit_logs: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_connection(&self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    pub fn upsert_client(&self, client: Client) {
        // A client keeps one token; drop the entry for a rotated one
        self.clients.retain(|_, existing| existing.id != client.id);
        self.clients.insert(client.token.clone(), client);
    }

    pub fn save_settings(&self, settings: Settings) -> AppResult<()> {
        let mut current = self
            .settings
            .write()
            .map_err(|e| AppError::Storage(format!("settings lock poisoned: {}", e)))?;
        *current = settings;
        Ok(())
    }

    pub fn audit_logs(&self) -> Vec<AuditLogEntry> {
        self.audit_logs
            .lock()
            .map(|logs| logs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProxyStore for MemoryStore {
    async fn get_connection_by_id(&self, id: &str) -> AppResult<Option<Connection>> {
        Ok(self.connections.get(id).map(|c| c.value().clone()))
    }

    async fn get_client_by_token(&self, token: &str) -> AppResult<Option<Client>> {
        Ok(self.clients.get(token).map(|c| c.value().clone()))
    }

    async fn get_settings(&self) -> AppResult<Settings> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|e| AppError::Storage(format!("settings lock poisoned: {}", e)))
    }

    async fn add_audit_log(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.audit_logs
            .lock()
            .map_err(|e| AppError::Storage(format!("audit log lock poisoned: {}", e)))?
            .push(entry);
        Ok(())
    }
}
