//! Origin and redirect URI helpers

use axum::http::{HeaderMap, header};
use reqwest::Url;

pub const CALLBACK_PATH: &str = "/api/auth/callback";

const FALLBACK_ORIGIN: &str = "http://localhost:3000";

/// Origin the browser used to reach us
///
/// Prefers the configured site URL, then forwarded/Host headers.
pub fn request_origin(headers: &HeaderMap, site_url: Option<&str>) -> String {
    if let Some(site_url) = site_url.map(str::trim).filter(|s| !s.is_empty()) {
        return site_url.trim_end_matches('/').to_string();
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header_str("x-forwarded-host").or_else(|| header_str(header::HOST.as_str()));
    match host {
        Some(host) => {
            let proto = header_str("x-forwarded-proto").unwrap_or("http");
            format!("{}://{}", proto, host)
        }
        None => FALLBACK_ORIGIN.to_string(),
    }
}

/// Callback URL registered with the identity provider
pub fn redirect_uri(origin: &str) -> String {
    format!("{}{}", origin, CALLBACK_PATH)
}

/// Callback URL carrying the post-login destination
pub fn redirect_uri_with_next(origin: &str, next: &str) -> String {
    format!("{}?next={}", redirect_uri(origin), urlencoding::encode(next))
}

/// Check that `uri` is an http(s) URL pointing at the callback route
pub fn validate_redirect_uri(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && url.path().ends_with(CALLBACK_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_origin_prefers_site_url() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));

        assert_eq!(
            request_origin(&headers, Some("https://app.example.test/")),
            "https://app.example.test"
        );
    }

    #[test]
    fn test_origin_from_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("app.example.test"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));

        assert_eq!(request_origin(&headers, None), "https://app.example.test");
    }

    #[test]
    fn test_origin_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));

        assert_eq!(request_origin(&headers, Some("  ")), "http://localhost:3000");
    }

    #[test]
    fn test_origin_fallback() {
        assert_eq!(request_origin(&HeaderMap::new(), None), "http://localhost:3000");
    }

    #[test]
    fn test_redirect_uri_with_next() {
        assert_eq!(
            redirect_uri_with_next("http://localhost:3000", "/dashboard/chat"),
            "http://localhost:3000/api/auth/callback?next=%2Fdashboard%2Fchat"
        );
    }

    #[test]
    fn test_validate_redirect_uri() {
        assert!(validate_redirect_uri("http://localhost:3000/api/auth/callback"));
        assert!(validate_redirect_uri("https://app.test/api/auth/callback?next=%2F"));
        assert!(!validate_redirect_uri("ftp://app.test/api/auth/callback"));
        assert!(!validate_redirect_uri("https://app.test/api/auth/callback/"));
        assert!(!validate_redirect_uri("not a url"));
    }
}
