// Client token extraction middleware
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

pub const CLIENT_TOKEN_HEADER: &str = "x-client-token";

/// Token presented by the caller, and whether it came from `Authorization`
#[derive(Debug, Clone, Default)]
pub struct ClientToken {
    pub token: String,
    pub from_authorization: bool,
}

/// Resolve the caller's token: `X-Client-Token` first, then `Authorization: Bearer`.
pub fn extract_client_token(headers: &HeaderMap) -> Option<ClientToken> {
    if let Some(token) = headers
        .get(CLIENT_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(ClientToken {
            token: token.to_string(),
            from_authorization: false,
        });
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| ClientToken {
            token: token.trim().to_string(),
            from_authorization: true,
        })
}

/// Attach the caller's token as a request extension.
///
/// A missing token is not rejected here; the proxy pipeline reports it as
/// `UNAUTHORIZED` so every refusal goes through the same error catalog.
pub async fn client_token_middleware(mut request: Request, next: Next) -> Response {
    tracing::debug!("Request: {} {}", request.method(), request.uri().path());

    let token = extract_client_token(request.headers()).unwrap_or_default();
    request.extensions_mut().insert(token);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_token_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_TOKEN_HEADER, HeaderValue::from_static("ab_one"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer ab_two"));

        let token = extract_client_token(&headers).unwrap();
        assert_eq!(token.token, "ab_one");
        assert!(!token.from_authorization);
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer ab_two"));

        let token = extract_client_token(&headers).unwrap();
        assert_eq!(token.token, "ab_two");
        assert!(token.from_authorization);
    }

    #[test]
    fn test_missing_or_non_bearer() {
        assert!(extract_client_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_client_token(&headers).is_none());
    }
}
