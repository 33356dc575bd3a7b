use async_trait::async_trait;
use bytes::Bytes;

/// Object storage for uploaded files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `name` and return its public URL
    async fn store(&self, bytes: Bytes, name: &str, content_type: &str) -> anyhow::Result<String>;
}
