//! Billing webhook types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Table the subscription rows are upserted into
pub const SUBSCRIPTION_TABLE: &str = "subscription";

/// Event types that carry a subscription and update the stored row
pub const SUBSCRIPTION_EVENTS: &[&str] = &[
    "subscription.created",
    "subscription.updated",
    "subscription.active",
    "subscription.canceled",
    "subscription.uncanceled",
    "subscription.revoked",
];

/// Outer webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, alias = "payload")]
    pub data: Value,
}

impl WebhookEnvelope {
    pub fn is_subscription_event(&self) -> bool {
        SUBSCRIPTION_EVENTS.contains(&self.event_type.as_str())
    }
}

/// Subscription object as sent by the billing provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring_interval: Option<String>,
    pub status: Option<String>,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<String>,
    pub started_at: Option<String>,
    pub ends_at: Option<String>,
    pub ended_at: Option<String>,
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub discount_id: Option<String>,
    pub checkout_id: Option<String>,
    pub customer_cancellation_reason: Option<String>,
    pub customer_cancellation_comment: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub custom_field_data: Value,
}

/// Row written to the `subscription` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRow {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring_interval: Option<String>,
    pub status: Option<String>,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<String>,
    pub started_at: Option<String>,
    pub ends_at: Option<String>,
    pub ended_at: Option<String>,
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub discount_id: Option<String>,
    pub checkout_id: Option<String>,
    pub customer_cancellation_reason: Option<String>,
    pub customer_cancellation_comment: Option<String>,
    pub metadata: Value,
    pub custom_field_data: Value,
}

impl From<Subscription> for SubscriptionRow {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            // Rows are keyed to the customer until accounts are linked
            user_id: sub.customer_id.clone(),
            created_at: sub.created_at,
            modified_at: sub.modified_at,
            amount: sub.amount,
            currency: sub.currency,
            recurring_interval: sub.recurring_interval,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            canceled_at: sub.canceled_at,
            started_at: sub.started_at,
            ends_at: sub.ends_at,
            ended_at: sub.ended_at,
            customer_id: sub.customer_id,
            product_id: sub.product_id,
            discount_id: sub.discount_id,
            checkout_id: sub.checkout_id,
            customer_cancellation_reason: sub.customer_cancellation_reason,
            customer_cancellation_comment: sub.customer_cancellation_comment,
            metadata: sub.metadata,
            custom_field_data: sub.custom_field_data,
        }
    }
}
