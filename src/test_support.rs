use axum::Router;
use std::ffi::{OsStr, OsString};
use std::net::SocketAddr;
use std::sync::Mutex;

use crate::models::{Client, Connection};

/// Serializes tests that touch process-wide environment variables
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

pub const TEST_TOKEN: &str = "ab_test_token_0001";

/// RAII guard for temporarily setting an environment variable in tests.
///
/// Pair usage with `ENV_LOCK`.
pub struct ScopedEnvVar {
    key: String,
    old: Option<OsString>,
}

impl ScopedEnvVar {
    pub fn set(key: &str, value: impl AsRef<OsStr>) -> Self {
        let old = std::env::var_os(key);
        std::env::set_var(key, value);
        Self {
            key: key.to_string(),
            old,
        }
    }
}

impl Drop for ScopedEnvVar {
    fn drop(&mut self) {
        match &self.old {
            Some(v) => std::env::set_var(&self.key, v),
            None => std::env::remove_var(&self.key),
        }
    }
}

pub fn sample_client() -> Client {
    Client::new("client-1", "Test Client", TEST_TOKEN)
}

pub fn sample_connection(base_url: &str) -> Connection {
    Connection::new("conn-1", "Test Connection", base_url)
}

/// Serve `router` on an ephemeral local port for the rest of the test
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
