//! Supabase wire types

use serde::Deserialize;

use crate::auth::types::{Session, User};

/// Error body returned by GoTrue, PostgREST and Storage
///
/// The services disagree on field names, so every known variant is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SupabaseErrorResponse {
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl SupabaseErrorResponse {
    /// Parse an error body, `None` if it is not a recognizable error
    pub fn parse(body: &str) -> Option<Self> {
        let parsed: Self = serde_json::from_str(body).ok()?;
        parsed.message().is_some().then_some(parsed)
    }

    /// Human-readable message, most specific first
    pub fn message(&self) -> Option<String> {
        self.msg
            .as_ref()
            .or(self.message.as_ref())
            .or(self.error_description.as_ref())
            .or(self.error.as_ref())
            .cloned()
    }

    /// Machine-readable error code
    pub fn code(&self) -> Option<String> {
        self.error_code.as_ref().or(self.error.as_ref()).cloned()
    }
}

/// Token endpoint response
///
/// A 2xx response without an access token carries no session.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: Option<User>,
}

impl TokenResponse {
    pub fn into_session(self) -> Option<Session> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(Session {
            access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            token_type: self.token_type,
            expires_in: self.expires_in.unwrap_or_default(),
            expires_at: self.expires_at,
            user: self.user?,
        })
    }
}
