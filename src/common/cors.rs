//! CORS configuration

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer for the API
///
/// With a configured site URL only that origin is allowed, with credentials,
/// so the session cookies travel on cross-origin calls from the frontend.
/// Without one every origin is allowed and no credentials are shared.
pub fn cors_layer(site_url: Option<&str>) -> CorsLayer {
    let origin = site_url.and_then(|url| HeaderValue::from_str(url.trim_end_matches('/')).ok());

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
