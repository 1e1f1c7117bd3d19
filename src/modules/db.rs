use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection as DbConnection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{AppError, AppResult};
use crate::models::{AuditLogEntry, Client, Connection, Settings};
use crate::proxy::store::ProxyStore;

const SETTINGS_KEY: &str = "settings";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS connections (
        id   TEXT PRIMARY KEY,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS clients (
        id    TEXT PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        data  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS settings (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS audit_logs (
        id              TEXT PRIMARY KEY,
        timestamp       TEXT NOT NULL,
        connection_id   TEXT NOT NULL,
        connection_name TEXT NOT NULL,
        client_id       TEXT NOT NULL,
        client_name     TEXT NOT NULL,
        method          TEXT NOT NULL,
        host            TEXT NOT NULL,
        path            TEXT NOT NULL,
        status          INTEGER NOT NULL,
        latency_ms      INTEGER NOT NULL,
        response_size   INTEGER NOT NULL,
        ip_address      TEXT NOT NULL,
        error           TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs (timestamp);
";

/// SQLite-backed store.
///
/// Connections, clients and settings are kept as JSON documents; audit
/// entries are appended to their own table. Database work runs on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<DbConnection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = DbConnection::open(path)?;
        tracing::info!("Opened database {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(DbConnection::open_in_memory()?)
    }

    fn init(conn: DbConnection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&DbConnection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| AppError::Storage(format!("database lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| AppError::Unknown(format!("database task failed: {}", e)))?
    }

    pub async fn upsert_connection(&self, connection: Connection) -> AppResult<()> {
        let data = serde_json::to_string(&connection)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO connections (id, data) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                params![connection.id, data],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn upsert_client(&self, client: Client) -> AppResult<()> {
        let data = serde_json::to_string(&client)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO clients (id, token, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET token = excluded.token, data = excluded.data",
                params![client.id, client.token, data],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn save_settings(&self, settings: Settings) -> AppResult<()> {
        let value = serde_json::to_string(&settings)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![SETTINGS_KEY, value],
            )?;
            Ok(())
        })
        .await
    }

    /// Most recent entries first
    pub async fn list_audit_logs(&self, limit: usize) -> AppResult<Vec<AuditLogEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, connection_id, connection_name, client_id, client_name,
                        method, host, path, status, latency_ms, response_size, ip_address, error
                 FROM audit_logs ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    AuditLogEntry {
                        id: row.get(0)?,
                        timestamp: DateTime::<Utc>::default(),
                        connection_id: row.get(2)?,
                        connection_name: row.get(3)?,
                        client_id: row.get(4)?,
                        client_name: row.get(5)?,
                        method: row.get(6)?,
                        host: row.get(7)?,
                        path: row.get(8)?,
                        status: row.get(9)?,
                        latency_ms: row.get(10)?,
                        response_size: row.get(11)?,
                        ip_address: row.get(12)?,
                        error: row.get(13)?,
                    },
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (timestamp, mut entry) = row?;
                entry.timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| AppError::Storage(format!("bad audit timestamp: {}", e)))?
                    .with_timezone(&Utc);
                entries.push(entry);
            }
            Ok(entries)
        })
        .await
    }
}

#[async_trait]
impl ProxyStore for SqliteStore {
    async fn get_connection_by_id(&self, id: &str) -> AppResult<Option<Connection>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM connections WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
        .await
    }

    async fn get_client_by_token(&self, token: &str) -> AppResult<Option<Client>> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM clients WHERE token = ?1",
                    params![token],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
        .await
    }

    async fn get_settings(&self) -> AppResult<Settings> {
        self.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![SETTINGS_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            match value {
                Some(v) => Ok(serde_json::from_str(&v)?),
                None => Ok(Settings::default()),
            }
        })
        .await
    }

    async fn add_audit_log(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO audit_logs (id, timestamp, connection_id, connection_name, client_id,
                     client_name, method, host, path, status, latency_ms, response_size,
                     ip_address, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    entry.id,
                    entry.timestamp.to_rfc3339(),
                    entry.connection_id,
                    entry.connection_name,
                    entry.client_id,
                    entry.client_name,
                    entry.method,
                    entry.host,
                    entry.path,
                    entry.status,
                    entry.latency_ms as i64,
                    entry.response_size as i64,
                    entry.ip_address,
                    entry.error,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthScheme;
    use crate::proxy::executor::ProxyExecutor;
    use crate::proxy::request::ProxyRequest;
    use crate::proxy::upstream::client::UpstreamClient;
    use crate::test_support::{sample_client, sample_connection, TEST_TOKEN};

    #[tokio::test]
    async fn test_connection_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut connection = sample_connection("https://api.example.com/v1");
        connection.auth_scheme = AuthScheme::Basic;
        connection.api_key = Some("user".to_string());
        connection.allowed_methods = vec!["GET".to_string()];
        store.upsert_connection(connection).await.unwrap();

        let loaded = store.get_connection_by_id("conn-1").await.unwrap().unwrap();
        assert_eq!(loaded.auth_scheme, AuthScheme::Basic);
        assert_eq!(loaded.api_key(), Some("user"));
        assert_eq!(loaded.allowed_methods, vec!["GET"]);
        assert!(store.get_connection_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_client_lookup_follows_token_rotation() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_client(sample_client()).await.unwrap();
        assert!(store.get_client_by_token(TEST_TOKEN).await.unwrap().is_some());

        let mut rotated = sample_client();
        rotated.token = "ab_rotated".to_string();
        store.upsert_client(rotated).await.unwrap();

        assert!(store.get_client_by_token(TEST_TOKEN).await.unwrap().is_none());
        let client = store.get_client_by_token("ab_rotated").await.unwrap().unwrap();
        assert_eq!(client.id, "client-1");
    }

    #[tokio::test]
    async fn test_settings_default_then_saved() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_settings().await.unwrap(), Settings::default());

        store
            .save_settings(Settings {
                upstream_timeout_ms: 2_500,
            })
            .await
            .unwrap();
        assert_eq!(store.get_settings().await.unwrap().upstream_timeout_ms, 2_500);
    }

    #[tokio::test]
    async fn test_executor_writes_one_audit_row() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .upsert_connection(sample_connection("http://127.0.0.1:1/v1"))
            .await
            .unwrap();
        store.upsert_client(sample_client()).await.unwrap();

        let executor = ProxyExecutor::new(
            store.clone(),
            Arc::new(UpstreamClient::new(None).unwrap()),
        );
        let err = executor
            .execute(ProxyRequest::new("conn-1", "GET", "/orders"), TEST_TOKEN, "10.0.0.5")
            .await
            .unwrap_err();
        assert_eq!(err.code(), 502);

        let logs = store.list_audit_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, 502);
        assert_eq!(logs[0].connection_name, "Test Connection");
        assert_eq!(logs[0].ip_address, "10.0.0.5");
        assert!(logs[0].error.is_some());
    }
}
