use crate::error::{AppError, AppResult};
use crate::proxy::config::ProxyConfig;
use crate::proxy::executor::ProxyExecutor;
use crate::proxy::handlers::proxy::PeerAddr;
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower::Layer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<ProxyExecutor>,
    pub trust_forwarded_for: bool,
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

/// Gateway routes with middleware applied
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    use crate::proxy::handlers;

    Router::new()
        .route(
            "/api/proxy/:connection_id",
            any(handlers::proxy::handle_proxy),
        )
        // `*path` does not match an empty tail
        .route(
            "/api/proxy/:connection_id/",
            any(handlers::proxy::handle_proxy),
        )
        .route(
            "/api/proxy/:connection_id/*path",
            any(handlers::proxy::handle_proxy),
        )
        .route("/healthz", get(health_check_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::client_token_middleware,
        ))
        .layer(crate::proxy::middleware::cors_layer())
        .with_state(state)
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        host: String,
        port: u16,
        executor: Arc<ProxyExecutor>,
        config: &ProxyConfig,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let state = AppState {
            executor,
            trust_forwarded_for: config.trust_forwarded_for,
        };
        let app = build_router(state, config.max_body_bytes);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind address {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!("API gateway started at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(
                                    Extension(PeerAddr(peer)).layer(app.clone()),
                                );

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("API gateway stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
