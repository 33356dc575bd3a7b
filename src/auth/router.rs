//! Auth Router
//!
//! Defines the browser-facing sign-in, callback, session and sign-out routes

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::common::auth::extract_access_token;
use crate::common::cookie::{build_cookie, clear_cookie, read_cookie};
use crate::common::error::ApiError;
use crate::model::config::Config;

use super::handler::CallbackHandler;
use super::pkce;
use super::provider::IdentityProvider;
use super::redirect::{redirect_uri_with_next, request_origin, validate_redirect_uri};
use super::types::*;

/// PKCE verifier cookie lifetime; the whole OAuth round trip must fit in it
const VERIFIER_COOKIE_MAX_AGE_SECS: i64 = 600;

/// Refresh token cookie lifetime (400 days)
const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Used when the provider does not report a token lifetime
const DEFAULT_ACCESS_MAX_AGE_SECS: i64 = 3600;

/// Cookie and origin settings shared by the auth-aware routes
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub site_url: Option<String>,
    pub cookie_prefix: String,
    pub secure_cookies: bool,
    pub default_provider: String,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            site_url: config.site_url.clone(),
            cookie_prefix: config.cookie_prefix.clone(),
            secure_cookies: config.secure_cookies,
            default_provider: config.oauth_provider.clone(),
        }
    }

    pub fn access_cookie(&self) -> String {
        format!("{}-access-token", self.cookie_prefix)
    }

    pub fn refresh_cookie(&self) -> String {
        format!("{}-refresh-token", self.cookie_prefix)
    }

    pub fn verifier_cookie(&self) -> String {
        format!("{}-code-verifier", self.cookie_prefix)
    }
}

/// Auth state for handlers
#[derive(Clone)]
pub struct AuthState {
    pub handler: Arc<CallbackHandler>,
    pub provider: Arc<dyn IdentityProvider>,
    pub settings: Arc<AuthSettings>,
}

impl AuthState {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: AuthSettings) -> Self {
        Self {
            handler: Arc::new(CallbackHandler::new(provider.clone())),
            provider,
            settings: Arc::new(settings),
        }
    }
}

/// Create auth router
///
/// # Endpoints
/// - `GET /callback` - OAuth redirect target
/// - `GET /sign-in` - Start an OAuth sign-in
/// - `GET /session` - Current session or `null`
/// - `POST /sign-out` - Revoke the session and clear cookies
pub fn create_auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/callback", get(handle_callback))
        .route("/sign-in", get(handle_sign_in))
        .route("/session", get(handle_session))
        .route("/sign-out", post(handle_sign_out))
        .with_state(state)
}

/// Handle OAuth callback (GET /api/auth/callback)
async fn handle_callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let settings = &state.settings;
    let origin = request_origin(&headers, settings.site_url.as_deref());
    let verifier = read_cookie(&headers, &settings.verifier_cookie());
    let params = CallbackParams::from_query(CallbackQuery::from_pairs(pairs), verifier);

    let code_state = if params.code.is_present() { "present" } else { "missing" };
    tracing::info!(
        code = code_state,
        error = ?params.error.as_deref(),
        error_description = ?params.error_description.as_deref(),
        origin = %origin,
        next = %params.next,
        "Auth callback received"
    );

    let result = state.handler.handle(&params).await;

    let mut cookies = vec![(
        header::SET_COOKIE,
        clear_cookie(&settings.verifier_cookie(), settings.secure_cookies),
    )];
    if let Some(session) = &result.session {
        let access_max_age = if session.expires_in > 0 {
            session.expires_in
        } else {
            DEFAULT_ACCESS_MAX_AGE_SECS
        };
        cookies.push((
            header::SET_COOKIE,
            build_cookie(
                &settings.access_cookie(),
                &session.access_token,
                access_max_age,
                settings.secure_cookies,
            ),
        ));
        cookies.push((
            header::SET_COOKIE,
            build_cookie(
                &settings.refresh_cookie(),
                &session.refresh_token,
                REFRESH_COOKIE_MAX_AGE_SECS,
                settings.secure_cookies,
            ),
        ));
    }

    let location = result.outcome.location(&origin);
    tracing::debug!(success = result.outcome.is_success(), "Auth callback completed");
    (AppendHeaders(cookies), Redirect::temporary(&location)).into_response()
}

/// Handle sign-in start (GET /api/auth/sign-in)
async fn handle_sign_in(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<SignInQuery>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    let provider = query
        .provider
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| settings.default_provider.clone());
    if !provider
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(format!("Unknown provider: {}", provider)));
    }

    let origin = request_origin(&headers, settings.site_url.as_deref());
    let next = sanitize_next(query.next);
    let mut redirect_to = redirect_uri_with_next(&origin, &next);
    if !validate_redirect_uri(&redirect_to) {
        tracing::warn!(origin = %origin, "Rejecting sign-in with unusable origin");
        return Err(ApiError::BadRequest("Invalid request origin".to_string()));
    }
    for (name, value) in [
        ("accepted_terms", &query.accepted_terms),
        ("data_consent", &query.data_consent),
    ] {
        if let Some(value) = value {
            redirect_to.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }
    }

    let verifier = pkce::generate_verifier();
    let url = state
        .provider
        .authorize_url(&provider, &redirect_to, &pkce::challenge(&verifier));

    tracing::info!(provider = %provider, next = %next, "Starting OAuth sign-in");

    let cookie = build_cookie(
        &settings.verifier_cookie(),
        &verifier,
        VERIFIER_COOKIE_MAX_AGE_SECS,
        settings.secure_cookies,
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::temporary(&url),
    )
        .into_response())
}

/// Handle session lookup (GET /api/auth/session)
async fn handle_session(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Json<Option<SessionResponse>> {
    let Some(token) = extract_access_token(&headers, &state.settings.access_cookie()) else {
        return Json(None);
    };

    match state.provider.get_user(&token).await {
        Ok(Some(user)) => Json(Some(SessionResponse {
            session: SessionInfo {
                user_id: user.id.clone(),
                user,
            },
        })),
        Ok(None) => Json(None),
        Err(e) => {
            tracing::error!("Session retrieval error: {}", e);
            Json(None)
        }
    }
}

/// Handle sign-out (POST /api/auth/sign-out)
async fn handle_sign_out(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let settings = &state.settings;
    if let Some(token) = extract_access_token(&headers, &settings.access_cookie()) {
        if let Err(e) = state.provider.sign_out(&token).await {
            tracing::warn!("Provider sign-out failed: {}", e);
        }
    }

    let cookies = [
        (
            header::SET_COOKIE,
            clear_cookie(&settings.access_cookie(), settings.secure_cookies),
        ),
        (
            header::SET_COOKIE,
            clear_cookie(&settings.refresh_cookie(), settings.secure_cookies),
        ),
    ];
    (StatusCode::NO_CONTENT, AppendHeaders(cookies)).into_response()
}
