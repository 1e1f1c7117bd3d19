//! Gateway error catalog.
//!
//! Every failure surfaced by the proxy pipeline is one of a fixed set of
//! named errors with an HTTP status. Callers mirror `code` back to their own
//! caller and render `message`.

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyErrorKind {
    Unauthorized,
    ClientDisabled,
    Forbidden,
    ConnectionNotFound,
    ConnectionDisabled,
    MethodNotAllowed,
    PathNotAllowed,
    InvalidRequest,
    UpstreamError,
    UpstreamTimeout,
}

impl ProxyErrorKind {
    /// HTTP status mirrored to the caller
    pub fn code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::ClientDisabled
            | Self::Forbidden
            | Self::ConnectionDisabled
            | Self::MethodNotAllowed
            | Self::PathNotAllowed => 403,
            Self::ConnectionNotFound => 404,
            Self::InvalidRequest => 400,
            Self::UpstreamError => 502,
            Self::UpstreamTimeout => 504,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ClientDisabled => "CLIENT_DISABLED",
            Self::Forbidden => "FORBIDDEN",
            Self::ConnectionNotFound => "CONNECTION_NOT_FOUND",
            Self::ConnectionDisabled => "CONNECTION_DISABLED",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::PathNotAllowed => "PATH_NOT_ALLOWED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Unauthorized => "Invalid or missing client token",
            Self::ClientDisabled => "Client is disabled",
            Self::Forbidden => "Client is not allowed to use this connection",
            Self::ConnectionNotFound => "Connection not found",
            Self::ConnectionDisabled => "Connection is disabled",
            Self::MethodNotAllowed => "HTTP method is not allowed for this connection",
            Self::PathNotAllowed => "Path is not allowed for this connection",
            Self::InvalidRequest => "Invalid proxy request",
            Self::UpstreamError => "Upstream request failed",
            Self::UpstreamTimeout => "Upstream request timed out",
        }
    }
}

impl std::fmt::Display for ProxyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProxyErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Tagged error returned by the proxy pipeline.
///
/// Serializes as `{"code":403,"error":"FORBIDDEN","message":"...","latencyMs":12}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ProxyErrorKind,
    pub message: String,
    pub latency_ms: Option<u64>,
}

impl GatewayError {
    /// Error carrying the catalog message for `kind`
    pub fn new(kind: ProxyErrorKind) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
            latency_ms: None,
        }
    }

    /// Catalog message followed by a detail, e.g. `"Upstream request failed: connection refused"`
    pub fn with_detail(kind: ProxyErrorKind, detail: impl std::fmt::Display) -> Self {
        Self {
            kind,
            message: format!("{}: {}", kind.message(), detail),
            latency_ms: None,
        }
    }

    pub fn latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

impl Serialize for GatewayError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let len = if self.latency_ms.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("GatewayError", len)?;
        state.serialize_field("code", &self.kind.code())?;
        state.serialize_field("error", &self.kind)?;
        state.serialize_field("message", &self.message)?;
        if let Some(latency_ms) = self.latency_ms {
            state.serialize_field("latencyMs", &latency_ms)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_codes() {
        assert_eq!(ProxyErrorKind::Unauthorized.code(), 401);
        assert_eq!(ProxyErrorKind::ClientDisabled.code(), 403);
        assert_eq!(ProxyErrorKind::Forbidden.code(), 403);
        assert_eq!(ProxyErrorKind::ConnectionNotFound.code(), 404);
        assert_eq!(ProxyErrorKind::ConnectionDisabled.code(), 403);
        assert_eq!(ProxyErrorKind::MethodNotAllowed.code(), 403);
        assert_eq!(ProxyErrorKind::PathNotAllowed.code(), 403);
        assert_eq!(ProxyErrorKind::InvalidRequest.code(), 400);
        assert_eq!(ProxyErrorKind::UpstreamError.code(), 502);
        assert_eq!(ProxyErrorKind::UpstreamTimeout.code(), 504);
    }

    #[test]
    fn test_serialize_without_latency() {
        let err = GatewayError::new(ProxyErrorKind::Unauthorized);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": 401,
                "error": "UNAUTHORIZED",
                "message": "Invalid or missing client token"
            })
        );
    }

    #[test]
    fn test_serialize_with_latency_and_detail() {
        let err = GatewayError::with_detail(ProxyErrorKind::UpstreamError, "connection refused")
            .latency(42);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 502);
        assert_eq!(json["error"], "UPSTREAM_ERROR");
        assert_eq!(json["message"], "Upstream request failed: connection refused");
        assert_eq!(json["latencyMs"], 42);
    }

    #[test]
    fn test_display() {
        let err = GatewayError::new(ProxyErrorKind::PathNotAllowed);
        assert_eq!(
            err.to_string(),
            "PATH_NOT_ALLOWED: Path is not allowed for this connection"
        );
    }
}
