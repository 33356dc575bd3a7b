//! Chat Router

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::Response,
    routing::post,
};
use uuid::Uuid;

use crate::common::error::ApiError;

use super::provider::CompletionProvider;
use super::stream::{DATA_STREAM_HEADER, DATA_STREAM_VERSION, create_data_stream};
use super::types::ChatRequest;

#[derive(Clone)]
pub struct ChatState {
    pub provider: Arc<dyn CompletionProvider>,
}

/// Create chat router
///
/// # Endpoints
/// - `POST /chat` - Stream an assistant reply
pub fn create_chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/chat", post(handle_chat))
        .with_state(state)
}

/// Handle chat completion (POST /api/chat)
async fn handle_chat(
    State(state): State<ChatState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.messages.is_empty() {
        return Err(ApiError::BadRequest("Messages are required".to_string()));
    }

    let message_id = format!("msg-{}", Uuid::new_v4().simple());
    tracing::info!(
        message_id = %message_id,
        message_count = payload.messages.len(),
        "Received chat request"
    );

    let chunks = state
        .provider
        .stream_completion(&payload.messages)
        .await
        .map_err(|e| {
            tracing::error!("Failed to open completion stream: {}", e);
            ApiError::Upstream("Failed to generate a response".to_string())
        })?;

    let body = Body::from_stream(create_data_stream(message_id, chunks));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(DATA_STREAM_HEADER, DATA_STREAM_VERSION)
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}
