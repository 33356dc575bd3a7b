//! Cookie helpers for the session and PKCE cookies

use axum::http::{HeaderMap, header};

/// Read a cookie value from the request `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
}

/// Build a `Set-Cookie` value for an HTTP-only, path-wide cookie
pub fn build_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build a `Set-Cookie` value that expires `name` immediately
pub fn clear_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}
