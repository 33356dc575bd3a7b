//! Common authentication utility functions

use axum::http::{HeaderMap, header};
use subtle::ConstantTimeEq;

use super::cookie;

/// Extract the user's access token from a request
///
/// Supports two sources:
/// - `Authorization: Bearer <token>` header
/// - session cookie named `cookie_name`
pub fn extract_access_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    // First check Authorization: Bearer
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    // Then the session cookie
    cookie::read_cookie(headers, cookie_name).filter(|t| !t.is_empty())
}

/// Constant-time byte comparison to prevent timing attacks
///
/// Uses the security-audited `subtle` crate implementation
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
