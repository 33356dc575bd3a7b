//! Supabase Auth (GoTrue) client
//!
//! Implements the identity provider operations over the GoTrue REST API

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::auth::types::{ConsentMetadata, Session, User};
use crate::auth::{ExchangeError, IdentityProvider};

use super::types::{SupabaseErrorResponse, TokenResponse};

const PKCE_VERIFIER_MISSING: &str = "PKCE code verifier not found in storage. \
This can happen if the auth flow was initiated in a different browser or device, \
or if the storage was cleared.";

/// GoTrue client scoped to one project
pub struct SupabaseAuth {
    base_url: String,
    anon_key: String,
    client: Client,
}

impl SupabaseAuth {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    /// Request carrying the project key and a bearer token
    fn request(&self, method: reqwest::Method, path: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Option<Session>, ExchangeError> {
        let Some(code_verifier) = code_verifier else {
            return Err(ExchangeError::Rejected {
                code: Some("pkce_code_verifier_not_found".to_string()),
                message: PKCE_VERIFIER_MISSING.to_string(),
            });
        };

        let response = self
            .request(reqwest::Method::POST, "/token?grant_type=pkce", &self.anon_key)
            .json(&json!({
                "auth_code": code,
                "code_verifier": code_verifier,
            }))
            .send()
            .await
            .map_err(|e| ExchangeError::Unexpected(e.into()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Unexpected(e.into()))?;

        if !status.is_success() {
            return Err(match SupabaseErrorResponse::parse(&body) {
                Some(err) => ExchangeError::Rejected {
                    code: err.code(),
                    message: err.message().unwrap_or_default(),
                },
                None => ExchangeError::Unexpected(anyhow::anyhow!(
                    "Token exchange failed (status {}): {}",
                    status,
                    body
                )),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .context("Malformed token response")
            .map_err(ExchangeError::Unexpected)?;
        Ok(token.into_session())
    }

    async fn update_user_metadata(
        &self,
        session: &Session,
        metadata: &ConsentMetadata,
    ) -> anyhow::Result<()> {
        let response = self
            .request(reqwest::Method::PUT, "/user", &session.access_token)
            .json(&json!({ "data": metadata }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to update user metadata (status {}): {}", status, body);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> anyhow::Result<Option<User>> {
        let response = self
            .request(reqwest::Method::GET, "/user", access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to fetch user (status {}): {}", status, body);
        }

        let user: User = response.json().await.context("Malformed user response")?;
        Ok(Some(user))
    }

    async fn sign_out(&self, access_token: &str) -> anyhow::Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/logout?scope=local", access_token)
            .send()
            .await?;

        let status = response.status();
        // An already-invalid session is as good as signed out
        if status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::NOT_FOUND
        {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        bail!("Failed to sign out (status {}): {}", status, body);
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.endpoint("/authorize"),
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }
}
