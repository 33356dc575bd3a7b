use async_trait::async_trait;

use super::types::SubscriptionRow;

/// Persistence for billing subscription rows
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or update the row with the same `id`
    async fn upsert_subscription(&self, row: &SubscriptionRow) -> anyhow::Result<()>;
}
