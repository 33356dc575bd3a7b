//! OAuth callback types

use serde::{Deserialize, Serialize};

/// Redirect target used when `next` is absent
pub const DEFAULT_NEXT: &str = "/dashboard";

/// Error page the browser is sent to on any failure
pub const ERROR_PAGE_PATH: &str = "/auth/auth-code-error";

pub const NO_CODE_DESCRIPTION: &str = "No authorization code was provided";

pub const UNEXPECTED_ERROR_DESCRIPTION: &str = "An unexpected error occurred during authentication";

/// An optional query parameter, keeping "absent" distinct from any value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryParam {
    Present(String),
    #[default]
    Absent,
}

impl QueryParam {
    /// Any supplied value, including an empty one, counts as present
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(v) => QueryParam::Present(v),
            None => QueryParam::Absent,
        }
    }

    /// An empty value counts as absent
    pub fn non_empty(value: Option<String>) -> Self {
        Self::from_option(value.filter(|v| !v.is_empty()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            QueryParam::Present(v) => Some(v.as_str()),
            QueryParam::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, QueryParam::Present(_))
    }

    /// True only for the literal value "true"
    pub fn is_true(&self) -> bool {
        matches!(self, QueryParam::Present(v) if v == "true")
    }
}

/// Raw query string of `GET /api/auth/callback`
#[derive(Debug, Default)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub next: Option<String>,
    pub accepted_terms: Option<String>,
    pub data_consent: Option<String>,
}

impl CallbackQuery {
    /// Build from decoded query pairs; a repeated key keeps its first value
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "code" => &mut query.code,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                "next" => &mut query.next,
                "accepted_terms" => &mut query.accepted_terms,
                "data_consent" => &mut query.data_consent,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

/// Parsed callback request
#[derive(Debug, Clone)]
pub struct CallbackParams {
    pub code: QueryParam,
    pub error: QueryParam,
    pub error_description: QueryParam,
    /// Relative path to land on after sign-in
    pub next: String,
    pub accepted_terms: QueryParam,
    pub data_consent: QueryParam,
    /// PKCE verifier stored by the sign-in step
    pub code_verifier: Option<String>,
}

impl CallbackParams {
    pub fn from_query(query: CallbackQuery, code_verifier: Option<String>) -> Self {
        Self {
            code: QueryParam::non_empty(query.code),
            error: QueryParam::non_empty(query.error),
            error_description: QueryParam::non_empty(query.error_description),
            next: sanitize_next(query.next),
            accepted_terms: QueryParam::from_option(query.accepted_terms),
            data_consent: QueryParam::from_option(query.data_consent),
            code_verifier,
        }
    }
}

/// `next` as given, or the dashboard when absent
///
/// The value is appended to the origin verbatim. Control characters cannot go
/// into a `Location` header, so such a value falls back to the default.
pub fn sanitize_next(next: Option<String>) -> String {
    match next {
        Some(n) if !n.chars().any(char::is_control) => n,
        _ => DEFAULT_NEXT.to_string(),
    }
}

/// Error code reported to the error page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackErrorCode {
    /// `error` forwarded verbatim from the identity provider
    Provider(String),
    /// The provider rejected the code exchange
    ExchangeFailed,
    /// No authorization code (or no session) was obtained
    NoCode,
    /// Transport or decoding failure during the exchange
    UnexpectedError,
}

impl CallbackErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            CallbackErrorCode::Provider(code) => code,
            CallbackErrorCode::ExchangeFailed => "exchange_failed",
            CallbackErrorCode::NoCode => "no_code",
            CallbackErrorCode::UnexpectedError => "unexpected_error",
        }
    }
}

/// Where the browser goes after the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success {
        target: String,
    },
    Failure {
        error: CallbackErrorCode,
        description: Option<String>,
    },
}

impl RedirectOutcome {
    pub fn failure(error: CallbackErrorCode, description: Option<String>) -> Self {
        RedirectOutcome::Failure { error, description }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RedirectOutcome::Success { .. })
    }

    /// Absolute redirect URL for this outcome
    ///
    /// Success targets are appended verbatim; failure parameters are URL-encoded.
    pub fn location(&self, origin: &str) -> String {
        match self {
            RedirectOutcome::Success { target } => format!("{}{}", origin, target),
            RedirectOutcome::Failure { error, description } => {
                let mut url = format!(
                    "{}{}?error={}",
                    origin,
                    ERROR_PAGE_PATH,
                    urlencoding::encode(error.as_str())
                );
                if let Some(description) = description {
                    url.push_str("&error_description=");
                    url.push_str(&urlencoding::encode(description));
                }
                url
            }
        }
    }
}

/// Result of handling one callback
///
/// `session` is only set when `outcome` is a success.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub outcome: RedirectOutcome,
    pub session: Option<Session>,
}

impl CallbackResult {
    pub fn failure(error: CallbackErrorCode, description: Option<String>) -> Self {
        Self {
            outcome: RedirectOutcome::failure(error, description),
            session: None,
        }
    }

    pub fn success(target: String, session: Session) -> Self {
        Self {
            outcome: RedirectOutcome::Success { target },
            session: Some(session),
        }
    }
}

/// Authenticated user as returned by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Session issued on a successful code exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp of access token expiry
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Consent flags written to user metadata after sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsentMetadata {
    pub accepted_terms: bool,
    pub data_consent: bool,
}

impl ConsentMetadata {
    /// Build the metadata patch, or `None` when neither flag was supplied
    pub fn from_params(accepted_terms: &QueryParam, data_consent: &QueryParam) -> Option<Self> {
        if !accepted_terms.is_present() && !data_consent.is_present() {
            return None;
        }
        Some(Self {
            accepted_terms: accepted_terms.is_true(),
            data_consent: data_consent.is_true(),
        })
    }
}

/// Query of `GET /api/auth/sign-in`
#[derive(Debug, Default, Deserialize)]
pub struct SignInQuery {
    pub provider: Option<String>,
    pub next: Option<String>,
    pub accepted_terms: Option<String>,
    pub data_consent: Option<String>,
}

/// Body of `GET /api/auth/session` when signed in
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub user: User,
}
