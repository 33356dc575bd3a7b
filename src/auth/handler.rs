//! OAuth Callback Handler
//!
//! Turns the provider's redirect into exactly one redirect outcome

use std::sync::Arc;

use super::provider::{ExchangeError, IdentityProvider};
use super::types::*;

/// OAuth callback handler
///
/// Stateless; safe to share across concurrent requests.
pub struct CallbackHandler {
    provider: Arc<dyn IdentityProvider>,
}

impl CallbackHandler {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Handle one callback request
    pub async fn handle(&self, params: &CallbackParams) -> CallbackResult {
        // A provider error always wins, even if a code came along with it
        if let Some(error) = params.error.as_deref() {
            let description = params.error_description.as_deref().map(str::to_string);
            tracing::error!(
                error = %error,
                error_description = ?description,
                "OAuth provider error"
            );
            return CallbackResult::failure(CallbackErrorCode::Provider(error.to_string()), description);
        }

        if let Some(code) = params.code.as_deref() {
            match self
                .provider
                .exchange_code(code, params.code_verifier.as_deref())
                .await
            {
                Ok(Some(session)) => {
                    self.apply_consent(params, &session).await;
                    tracing::info!(next = %params.next, user_id = %session.user.id, "Auth successful");
                    return CallbackResult::success(params.next.clone(), session);
                }
                Ok(None) => {
                    tracing::warn!("Code exchange succeeded but no session was issued");
                }
                Err(ExchangeError::Rejected { code, message }) => {
                    tracing::error!(code = ?code, message = %message, "Code exchange error");
                    return CallbackResult::failure(CallbackErrorCode::ExchangeFailed, Some(message));
                }
                Err(ExchangeError::Unexpected(e)) => {
                    tracing::error!(error = ?e, "Unexpected error during auth");
                    return CallbackResult::failure(
                        CallbackErrorCode::UnexpectedError,
                        Some(UNEXPECTED_ERROR_DESCRIPTION.to_string()),
                    );
                }
            }
        }

        tracing::error!("No authorization code provided");
        CallbackResult::failure(CallbackErrorCode::NoCode, Some(NO_CODE_DESCRIPTION.to_string()))
    }

    /// Best-effort consent metadata patch; failures are logged and swallowed
    async fn apply_consent(&self, params: &CallbackParams, session: &Session) {
        let Some(metadata) = ConsentMetadata::from_params(&params.accepted_terms, &params.data_consent)
        else {
            return;
        };

        match self.provider.update_user_metadata(session, &metadata).await {
            Ok(()) => tracing::debug!(
                accepted_terms = metadata.accepted_terms,
                data_consent = metadata.data_consent,
                "Consent metadata updated"
            ),
            Err(e) => tracing::warn!(
                user_id = %session.user.id,
                "Failed to update consent metadata: {}",
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::*;

    fn params() -> CallbackParams {
        CallbackParams::from_query(CallbackQuery::default(), Some("verifier".to_string()))
    }

    fn handler(provider: StubProvider) -> (CallbackHandler, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        (CallbackHandler::new(provider.clone()), provider)
    }

    fn assert_failure(result: &CallbackResult, code: &str) -> Option<String> {
        assert!(result.session.is_none());
        match &result.outcome {
            RedirectOutcome::Failure { error, description } => {
                assert_eq!(error.as_str(), code);
                description.clone()
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_error_wins_over_code() {
        let (handler, provider) = handler(StubProvider::new(ExchangeBehavior::Session));
        let mut p = params();
        p.error = QueryParam::Present("access_denied".into());
        p.error_description = QueryParam::Present("User cancelled".into());
        p.code = QueryParam::Present("abc".into());

        let result = handler.handle(&p).await;

        let description = assert_failure(&result, "access_denied");
        assert_eq!(description.as_deref(), Some("User cancelled"));
        assert!(provider.exchanges.lock().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_without_description() {
        let (handler, _) = handler(StubProvider::new(ExchangeBehavior::Session));
        let mut p = params();
        p.error = QueryParam::Present("server_error".into());

        let result = handler.handle(&p).await;

        assert!(assert_failure(&result, "server_error").is_none());
    }

    #[tokio::test]
    async fn test_no_code_and_no_error() {
        let (handler, provider) = handler(StubProvider::new(ExchangeBehavior::Session));

        let result = handler.handle(&params()).await;

        let description = assert_failure(&result, "no_code");
        assert_eq!(description.as_deref(), Some(NO_CODE_DESCRIPTION));
        assert!(provider.exchanges.lock().is_empty());
    }

    #[tokio::test]
    async fn test_successful_exchange_redirects_to_next() {
        let (handler, provider) = handler(StubProvider::new(ExchangeBehavior::Session));
        let mut p = params();
        p.code = QueryParam::Present("abc".into());
        p.next = "/dashboard/chat".into();

        let result = handler.handle(&p).await;

        assert_eq!(
            result.outcome,
            RedirectOutcome::Success {
                target: "/dashboard/chat".into()
            }
        );
        assert_eq!(result.session, Some(test_session()));
        assert_eq!(
            provider.exchanges.lock().as_slice(),
            &[("abc".to_string(), Some("verifier".to_string()))]
        );
        assert!(provider.metadata_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_successful_exchange_defaults_to_dashboard() {
        let (handler, _) = handler(StubProvider::new(ExchangeBehavior::Session));
        let query = CallbackQuery {
            code: Some("abc".into()),
            ..CallbackQuery::default()
        };

        let result = handler.handle(&CallbackParams::from_query(query, None)).await;

        assert_eq!(
            result.outcome,
            RedirectOutcome::Success {
                target: "/dashboard".into()
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_exchange() {
        let (handler, _) = handler(StubProvider::new(ExchangeBehavior::Reject(
            "invalid flow state, no valid flow state found",
        )));
        let mut p = params();
        p.code = QueryParam::Present("abc".into());

        let result = handler.handle(&p).await;

        let description = assert_failure(&result, "exchange_failed");
        assert_eq!(
            description.as_deref(),
            Some("invalid flow state, no valid flow state found")
        );
    }

    #[tokio::test]
    async fn test_exchange_without_session_falls_through_to_no_code() {
        let (handler, provider) = handler(StubProvider::new(ExchangeBehavior::NoSession));
        let mut p = params();
        p.code = QueryParam::Present("abc".into());
        p.accepted_terms = QueryParam::Present("true".into());

        let result = handler.handle(&p).await;

        assert_failure(&result, "no_code");
        assert_eq!(provider.exchanges.lock().len(), 1);
        assert!(provider.metadata_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_does_not_change_outcome() {
        let mut stub = StubProvider::new(ExchangeBehavior::Session);
        stub.metadata_fails = true;
        let (handler, provider) = handler(stub);
        let mut p = params();
        p.code = QueryParam::Present("abc".into());
        p.accepted_terms = QueryParam::Present("true".into());
        p.data_consent = QueryParam::Present("false".into());

        let result = handler.handle(&p).await;

        assert!(result.outcome.is_success());
        assert_eq!(
            provider.metadata_calls.lock().as_slice(),
            &[ConsentMetadata {
                accepted_terms: true,
                data_consent: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_single_consent_flag_sends_other_as_false() {
        let (handler, provider) = handler(StubProvider::new(ExchangeBehavior::Session));
        let mut p = params();
        p.code = QueryParam::Present("abc".into());
        p.data_consent = QueryParam::Present("true".into());

        handler.handle(&p).await;

        assert_eq!(
            provider.metadata_calls.lock().as_slice(),
            &[ConsentMetadata {
                accepted_terms: false,
                data_consent: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_unexpected_exchange_failure() {
        let (handler, _) = handler(StubProvider::new(ExchangeBehavior::Unexpected));
        let mut p = params();
        p.code = QueryParam::Present("abc".into());

        let result = handler.handle(&p).await;

        let description = assert_failure(&result, "unexpected_error");
        assert_eq!(description.as_deref(), Some(UNEXPECTED_ERROR_DESCRIPTION));
    }
}
