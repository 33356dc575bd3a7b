//! Supabase Storage client

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};

use crate::upload::ObjectStore;

/// Uploads into one public bucket
pub struct SupabaseStorage {
    base_url: String,
    service_key: String,
    bucket: String,
    client: Client,
}

impl SupabaseStorage {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            client,
        }
    }

    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn store(&self, bytes: Bytes, name: &str, content_type: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Storage upload of {} failed (status {}): {}", name, status, body);
        }

        Ok(self.public_url(name))
    }
}
