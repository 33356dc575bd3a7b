//! Test doubles for the identity provider seam

use async_trait::async_trait;
use parking_lot::Mutex;

use super::provider::{ExchangeError, IdentityProvider};
use super::types::{ConsentMetadata, Session, User};

/// What the stub returns from `exchange_code`
#[derive(Clone)]
pub(crate) enum ExchangeBehavior {
    Session,
    NoSession,
    Reject(&'static str),
    Unexpected,
}

/// Scriptable identity provider recording every call
pub(crate) struct StubProvider {
    pub exchange: ExchangeBehavior,
    pub metadata_fails: bool,
    pub user: Option<User>,
    pub exchanges: Mutex<Vec<(String, Option<String>)>>,
    pub metadata_calls: Mutex<Vec<ConsentMetadata>>,
    pub sign_outs: Mutex<Vec<String>>,
}

impl StubProvider {
    pub(crate) fn new(exchange: ExchangeBehavior) -> Self {
        Self {
            exchange,
            metadata_fails: false,
            user: None,
            exchanges: Mutex::new(Vec::new()),
            metadata_calls: Mutex::new(Vec::new()),
            sign_outs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }
}

pub(crate) fn test_user() -> User {
    User {
        id: "user-1".to_string(),
        email: Some("user@example.test".to_string()),
        user_metadata: serde_json::json!({}),
        app_metadata: serde_json::json!({}),
        created_at: None,
    }
}

pub(crate) fn test_session() -> Session {
    Session {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        token_type: Some("bearer".to_string()),
        expires_in: 3600,
        expires_at: None,
        user: test_user(),
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Option<Session>, ExchangeError> {
        self.exchanges
            .lock()
            .push((code.to_string(), code_verifier.map(str::to_string)));
        match &self.exchange {
            ExchangeBehavior::Session => Ok(Some(test_session())),
            ExchangeBehavior::NoSession => Ok(None),
            ExchangeBehavior::Reject(message) => Err(ExchangeError::Rejected {
                code: Some("invalid_grant".to_string()),
                message: message.to_string(),
            }),
            ExchangeBehavior::Unexpected => Err(ExchangeError::Unexpected(anyhow::anyhow!(
                "connection reset by peer"
            ))),
        }
    }

    async fn update_user_metadata(
        &self,
        _session: &Session,
        metadata: &ConsentMetadata,
    ) -> anyhow::Result<()> {
        self.metadata_calls.lock().push(*metadata);
        if self.metadata_fails {
            anyhow::bail!("metadata service unavailable");
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> anyhow::Result<Option<User>> {
        if access_token == "valid-token" {
            Ok(self.user.clone())
        } else {
            Ok(None)
        }
    }

    async fn sign_out(&self, access_token: &str) -> anyhow::Result<()> {
        self.sign_outs.lock().push(access_token.to_string());
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "https://idp.test/authorize?provider={}&redirect_to={}&code_challenge={}",
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }
}
