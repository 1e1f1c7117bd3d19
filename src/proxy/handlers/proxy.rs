// Proxy Handler
use axum::{
    body::{Body, Bytes},
    extract::{Extension, Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::debug;
use url::form_urlencoded;

use crate::proxy::errors::{GatewayError, ProxyErrorKind};
use crate::proxy::middleware::ClientToken;
use crate::proxy::request::{ProxyRequest, ProxySuccess, ResponseBody};
use crate::proxy::server::AppState;

pub const PROXY_ROUTE_PREFIX: &str = "/api/proxy/";
pub const LATENCY_HEADER: &str = "x-upstream-latency-ms";

/// Caller headers that only make sense on the inbound hop
const HOP_HEADERS: [&str; 7] = [
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// TCP peer of the inbound connection, attached by the server accept loop
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub SocketAddr);

/// Handle `/api/proxy/:connection_id[/*path]` for any method
pub async fn handle_proxy(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Extension(token): Extension<ClientToken>,
    peer: Option<Extension<PeerAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(connection_id) = params.get("connection_id").filter(|id| !id.is_empty()).cloned()
    else {
        return error_response(GatewayError::with_detail(
            ProxyErrorKind::InvalidRequest,
            "missing connection id",
        ));
    };
    let path = upstream_path(uri.path());

    let body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return error_response(GatewayError::with_detail(
                    ProxyErrorKind::InvalidRequest,
                    format!("request body must be JSON: {}", e),
                ))
            }
        }
    };

    let source_ip = source_ip(&headers, peer.map(|Extension(p)| p), state.trust_forwarded_for);
    debug!(
        "Proxy call {} {} on connection {} from {}",
        method, path, connection_id, source_ip
    );

    let request = ProxyRequest {
        connection_id,
        method: method.as_str().to_string(),
        path,
        query: parse_query(uri.query()),
        headers: forwardable_headers(&headers, &token),
        body,
    };

    match state
        .executor
        .execute(request, &token.token, &source_ip)
        .await
    {
        Ok(success) => success_response(success),
        Err(err) => error_response(err),
    }
}

/// `/api/proxy/c1/orders/7` -> `/orders/7`; a bare connection maps to `/`.
/// The raw (still percent-encoded) path is kept so it reaches upstream unchanged.
fn upstream_path(raw: &str) -> String {
    let rest = raw.strip_prefix(PROXY_ROUTE_PREFIX).unwrap_or(raw);
    match rest.find('/') {
        Some(idx) => rest[idx..].to_string(),
        None => "/".to_string(),
    }
}

fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Drop hop-by-hop headers, compression negotiation (bodies are decoded here),
/// and the gateway credential when it arrived as a bearer token
fn forwardable_headers(headers: &HeaderMap, token: &ClientToken) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_HEADERS {
        out.remove(name);
    }
    out.remove(header::ACCEPT_ENCODING);
    if token.from_authorization {
        out.remove(header::AUTHORIZATION);
    }
    out
}

fn source_ip(headers: &HeaderMap, peer: Option<PeerAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }
    peer.map(|PeerAddr(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn success_response(success: ProxySuccess) -> Response {
    let status = StatusCode::from_u16(success.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let upstream_type = success.headers.get("content-type").cloned();

    let (default_type, bytes) = match success.data {
        ResponseBody::Json(value) => ("application/json", value.to_string().into_bytes()),
        ResponseBody::Text(text) => ("text/plain; charset=utf-8", text.into_bytes()),
    };
    let content_type = upstream_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(default_type));

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
        .headers_mut()
        .insert(LATENCY_HEADER, HeaderValue::from(success.latency_ms));
    response
}

fn error_response(err: GatewayError) -> Response {
    let status = StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_path() {
        assert_eq!(upstream_path("/api/proxy/c1/orders/7"), "/orders/7");
        assert_eq!(upstream_path("/api/proxy/c1"), "/");
        assert_eq!(upstream_path("/api/proxy/c1/"), "/");
        assert_eq!(upstream_path("/api/proxy/my%20conn/x%2Fy"), "/x%2Fy");
    }

    #[test]
    fn test_parse_query_keeps_order() {
        assert_eq!(
            parse_query(Some("z=1&a=two%20words&z=3")),
            vec![
                ("z".to_string(), "1".to_string()),
                ("a".to_string(), "two words".to_string()),
                ("z".to_string(), "3".to_string()),
            ]
        );
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_forwardable_headers_drop_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer ab_x"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert("x-request-id", HeaderValue::from_static("r1"));

        let bearer = ClientToken {
            token: "ab_x".to_string(),
            from_authorization: true,
        };
        let out = forwardable_headers(&headers, &bearer);
        assert!(out.get(header::AUTHORIZATION).is_none());
        assert!(out.get(header::ACCEPT_ENCODING).is_none());
        assert_eq!(out.get("x-request-id").unwrap(), "r1");

        let explicit = ClientToken {
            token: "ab_x".to_string(),
            from_authorization: false,
        };
        assert!(forwardable_headers(&headers, &explicit)
            .get(header::AUTHORIZATION)
            .is_some());
    }

    #[test]
    fn test_source_ip() {
        let peer = Some(PeerAddr("192.168.1.9:5555".parse().unwrap()));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        assert_eq!(source_ip(&headers, peer, false), "192.168.1.9");
        assert_eq!(source_ip(&headers, peer, true), "203.0.113.7");
        assert_eq!(source_ip(&HeaderMap::new(), None, true), "unknown");
    }
}
