use url::form_urlencoded;

use crate::models::{AuthScheme, Connection};

/// Compose `base_url + path + ?query` for a connection.
///
/// Request parameters keep caller order; for `AuthScheme::Query`
/// `api_key` (and `api_secret` when set) follow them.
pub fn build_target_url(connection: &Connection, path: &str, query: &[(String, String)]) -> String {
    let base = connection
        .base_url
        .strip_suffix('/')
        .unwrap_or(&connection.base_url);

    let mut url = String::with_capacity(base.len() + path.len() + 1);
    url.push_str(base);
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        serializer.append_pair(key, value);
    }
    if connection.auth_scheme == AuthScheme::Query {
        if let Some(api_key) = connection.api_key() {
            serializer.append_pair("api_key", api_key);
        }
        if let Some(secret) = connection.secret() {
            serializer.append_pair("api_secret", secret);
        }
    }

    let query_string = serializer.finish();
    if !query_string.is_empty() {
        url.push('?');
        url.push_str(&query_string);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_base_path_and_query() {
        let conn = Connection::new("c1", "Test", "https://api.example.com/v1");
        assert_eq!(
            build_target_url(&conn, "/orders", &pairs(&[("page", "1")])),
            "https://api.example.com/v1/orders?page=1"
        );
    }

    #[test]
    fn test_trailing_slash_and_missing_leading_slash() {
        let conn = Connection::new("c1", "Test", "https://api.example.com/v1/");
        assert_eq!(
            build_target_url(&conn, "orders", &[]),
            "https://api.example.com/v1/orders"
        );
        assert_eq!(build_target_url(&conn, "", &[]), "https://api.example.com/v1/");
    }

    #[test]
    fn test_query_order_is_preserved() {
        let conn = Connection::new("c1", "Test", "https://api.example.com");
        assert_eq!(
            build_target_url(&conn, "/s", &pairs(&[("z", "1"), ("a", "2"), ("m", "3")])),
            "https://api.example.com/s?z=1&a=2&m=3"
        );
    }

    #[test]
    fn test_query_values_are_encoded() {
        let conn = Connection::new("c1", "Test", "https://api.example.com");
        assert_eq!(
            build_target_url(&conn, "/s", &pairs(&[("q", "a&b=c"), ("name", "é")])),
            "https://api.example.com/s?q=a%26b%3Dc&name=%C3%A9"
        );
    }

    #[test]
    fn test_query_scheme_appends_credentials_after_request_params() {
        let mut conn = Connection::new("c1", "Test", "https://api.example.com");
        conn.auth_scheme = AuthScheme::Query;
        conn.api_key = Some("k1".to_string());
        assert_eq!(
            build_target_url(&conn, "/items", &pairs(&[("foo", "bar")])),
            "https://api.example.com/items?foo=bar&api_key=k1"
        );

        conn.secret = Some("s1".to_string());
        assert_eq!(
            build_target_url(&conn, "/items", &[]),
            "https://api.example.com/items?api_key=k1&api_secret=s1"
        );
    }

    #[test]
    fn test_other_schemes_never_put_credentials_in_url() {
        let mut conn = Connection::new("c1", "Test", "https://api.example.com");
        conn.auth_scheme = AuthScheme::Bearer;
        conn.api_key = Some("k1".to_string());
        assert_eq!(
            build_target_url(&conn, "/items", &[]),
            "https://api.example.com/items"
        );
    }
}
