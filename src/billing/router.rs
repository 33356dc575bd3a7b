//! Billing webhook router

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};

use super::replay::ReplayGuard;
use super::signature::WebhookVerifier;
use super::store::SubscriptionStore;
use super::types::{Subscription, SubscriptionRow, WebhookEnvelope};

/// Billing webhook state
#[derive(Clone)]
pub struct BillingState {
    pub verifier: Arc<WebhookVerifier>,
    pub store: Arc<dyn SubscriptionStore>,
    pub replay: Arc<ReplayGuard>,
}

impl BillingState {
    pub fn new(verifier: WebhookVerifier, store: Arc<dyn SubscriptionStore>) -> Self {
        let replay = ReplayGuard::new(verifier.tolerance_secs());
        Self {
            verifier: Arc::new(verifier),
            store,
            replay: Arc::new(replay),
        }
    }
}

/// Create billing router
///
/// # Endpoints
/// - `POST /webhooks/polar` - Subscription lifecycle events
pub fn create_billing_router(state: BillingState) -> Router {
    Router::new()
        .route("/webhooks/polar", post(handle_polar_webhook))
        .with_state(state)
}

fn webhook_error(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, format!("Webhook Error: {}", message)).into_response()
}

/// Handle a billing webhook delivery (POST /api/webhooks/polar)
async fn handle_polar_webhook(
    State(state): State<BillingState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let now = chrono::Utc::now().timestamp();

    let delivery = match state.verifier.verify(&headers, &body, now) {
        Ok(delivery) => delivery,
        Err(e) => {
            tracing::warn!("Webhook verification failed: {}", e);
            return webhook_error(StatusCode::BAD_REQUEST, e);
        }
    };

    tracing::debug!(
        webhook_id = %delivery.id,
        timestamp = delivery.timestamp,
        "Webhook signature verified"
    );

    let envelope: WebhookEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(webhook_id = %delivery.id, "Malformed webhook body: {}", e);
            return webhook_error(StatusCode::BAD_REQUEST, e);
        }
    };

    if !state.replay.check_and_record(&delivery.id, now) {
        tracing::info!(webhook_id = %delivery.id, "Duplicate webhook delivery ignored");
        return StatusCode::OK.into_response();
    }

    if !envelope.is_subscription_event() {
        tracing::info!("Unhandled event type {}", envelope.event_type);
        return StatusCode::OK.into_response();
    }

    let subscription: Subscription = match serde_json::from_value(envelope.data) {
        Ok(subscription) => subscription,
        Err(e) => {
            state.replay.forget(&delivery.id);
            tracing::warn!(
                webhook_id = %delivery.id,
                event_type = %envelope.event_type,
                "Malformed subscription payload: {}",
                e
            );
            return webhook_error(StatusCode::BAD_REQUEST, e);
        }
    };

    let row = SubscriptionRow::from(subscription);
    if let Err(e) = state.store.upsert_subscription(&row).await {
        // Let the provider redeliver
        state.replay.forget(&delivery.id);
        tracing::error!(
            subscription_id = %row.id,
            event_type = %envelope.event_type,
            "Failed to upsert subscription: {}",
            e
        );
        return webhook_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store subscription");
    }

    tracing::info!(
        subscription_id = %row.id,
        event_type = %envelope.event_type,
        status = ?row.status,
        "Subscription stored"
    );
    StatusCode::OK.into_response()
}
