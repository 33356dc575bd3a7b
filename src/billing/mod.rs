//! Billing Module
//!
//! Receives subscription lifecycle webhooks from the billing provider,
//! verifies them and mirrors the subscription into storage

mod replay;
mod router;
pub mod signature;
mod store;
pub mod types;

pub use router::{BillingState, create_billing_router};
pub use signature::WebhookVerifier;
pub use store::SubscriptionStore;
