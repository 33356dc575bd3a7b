//! PostgREST client for server-side table writes

use anyhow::bail;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::billing::SubscriptionStore;
use crate::billing::types::{SUBSCRIPTION_TABLE, SubscriptionRow};

/// Table access with the service role key
pub struct SupabaseRest {
    base_url: String,
    service_key: String,
    client: Client,
}

impl SupabaseRest {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client,
        }
    }

    /// Insert `row`, merging into the existing row on `on_conflict`
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
        on_conflict: &str,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{}/rest/v1/{}?on_conflict={}",
            self.base_url,
            table,
            urlencoding::encode(on_conflict)
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Upsert into {} failed (status {}): {}", table, status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SupabaseRest {
    async fn upsert_subscription(&self, row: &SubscriptionRow) -> anyhow::Result<()> {
        self.upsert(SUBSCRIPTION_TABLE, row, "id").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::types::Subscription;
    use mockito::Matcher;

    fn row() -> SubscriptionRow {
        SubscriptionRow::from(Subscription {
            id: "sub_1".to_string(),
            status: Some("active".to_string()),
            customer_id: Some("cus_1".to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_upsert_subscription() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/subscription")
            .match_query(Matcher::UrlEncoded("on_conflict".into(), "id".into()))
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_header("prefer", Matcher::Regex("resolution=merge-duplicates".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": "sub_1",
                "user_id": "cus_1",
                "status": "active"
            })))
            .with_status(201)
            .create_async()
            .await;

        let rest = SupabaseRest::new(server.url(), "service-key", Client::new());
        rest.upsert_subscription(&row()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/subscription")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"message":"duplicate key value violates unique constraint"}"#)
            .create_async()
            .await;

        let rest = SupabaseRest::new(server.url(), "service-key", Client::new());
        let err = rest.upsert_subscription(&row()).await.unwrap_err();

        assert!(err.to_string().contains("status 409"));
    }
}
