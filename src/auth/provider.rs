//! Identity provider seam

use std::fmt;

use async_trait::async_trait;

use super::types::{ConsentMetadata, Session, User};

/// Why a code exchange did not yield a session
#[derive(Debug)]
pub enum ExchangeError {
    /// Structured rejection returned by the provider itself
    Rejected {
        code: Option<String>,
        message: String,
    },

    /// Transport failure or a response that could not be understood
    Unexpected(anyhow::Error),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Rejected {
                code: Some(code),
                message,
            } => write!(f, "Code exchange rejected ({}): {}", code, message),
            ExchangeError::Rejected { code: None, message } => {
                write!(f, "Code exchange rejected: {}", message)
            }
            ExchangeError::Unexpected(e) => write!(f, "Code exchange failed: {}", e),
        }
    }
}

impl std::error::Error for ExchangeError {}

/// Identity provider operations used by the auth, upload and session routes
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Redeem an authorization code
    ///
    /// `Ok(None)` means the provider reported success without issuing a session.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Option<Session>, ExchangeError>;

    /// Patch the signed-in user's metadata
    async fn update_user_metadata(
        &self,
        session: &Session,
        metadata: &ConsentMetadata,
    ) -> anyhow::Result<()>;

    /// Resolve an access token to a user; `Ok(None)` for a rejected token
    async fn get_user(&self, access_token: &str) -> anyhow::Result<Option<User>>;

    /// Revoke the session behind an access token
    async fn sign_out(&self, access_token: &str) -> anyhow::Result<()>;

    /// URL that starts an OAuth sign-in with `provider`
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;
}
