//! Upload Router
//!
//! `POST /upload-image` accepts one image in multipart field `file` from a
//! signed-in user and returns its public URL

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::HeaderMap,
    routing::post,
};
use bytes::BytesMut;
use serde::Serialize;

use crate::auth::IdentityProvider;
use crate::common::auth::extract_access_token;
use crate::common::error::ApiError;

use super::store::ObjectStore;
use super::validate::{check_size, check_type, generate_filename, resolve_mime};

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

/// Room for boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

const PROCESS_FAILED: &str = "Failed to process upload";

#[derive(Clone)]
pub struct UploadState {
    pub provider: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ObjectStore>,
    pub access_cookie: String,
    pub max_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Create upload router
///
/// # Endpoints
/// - `POST /upload-image` - Store an image for the signed-in user
pub fn create_upload_router(state: UploadState) -> Router {
    let body_limit = state.max_bytes + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/upload-image", post(handle_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn process_failed(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Upload error: {}", e);
    ApiError::Internal(PROCESS_FAILED.to_string())
}

/// Handle image upload (POST /api/upload-image)
async fn handle_upload(
    State(state): State<UploadState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let token = extract_access_token(&headers, &state.access_cookie).ok_or(ApiError::Unauthorized)?;
    let user = state
        .provider
        .get_user(&token)
        .await
        .map_err(|e| {
            tracing::error!("User lookup failed: {}", e);
            ApiError::Unauthorized
        })?
        .ok_or(ApiError::Unauthorized)?;

    let mut multipart = multipart.map_err(process_failed)?;

    while let Some(mut field) = multipart.next_field().await.map_err(process_failed)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let client_name = field.file_name().unwrap_or_default().to_string();
        let mime = resolve_mime(field.content_type(), &client_name);
        check_type(&mime)?;

        // Stop reading as soon as the limit is crossed
        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(process_failed)? {
            check_size(buffer.len() + chunk.len(), state.max_bytes)?;
            buffer.extend_from_slice(&chunk);
        }
        let size = buffer.len();

        let name = generate_filename(&client_name, chrono::Utc::now().timestamp_millis());
        let url = state
            .store
            .store(buffer.freeze(), &name, &mime)
            .await
            .map_err(process_failed)?;

        tracing::info!(
            user_id = %user.id,
            object = %name,
            content_type = %mime,
            size,
            "Image uploaded"
        );
        return Ok(Json(UploadResponse { url }));
    }

    Err(ApiError::BadRequest("No file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{ExchangeBehavior, StubProvider, test_user};
    use async_trait::async_trait;
    use bytes::Bytes;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary";

    #[derive(Default)]
    struct MemoryStore {
        fail: bool,
        objects: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn store(&self, bytes: Bytes, name: &str, content_type: &str) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("bucket not found");
            }
            self.objects
                .lock()
                .push((name.to_string(), content_type.to_string(), bytes.len()));
            Ok(format!("https://cdn.test/{}", name))
        }
    }

    fn app(store: MemoryStore, max_bytes: usize) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let provider = StubProvider::new(ExchangeBehavior::Session).with_user(test_user());
        let state = UploadState {
            provider: Arc::new(provider),
            store: store.clone(),
            access_cookie: "sb-access-token".to_string(),
            max_bytes,
        };
        (create_upload_router(state), store)
    }

    fn multipart_body(field: &str, filename: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            BOUNDARY, field, filename
        );
        if let Some(content_type) = content_type {
            body.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        body.push_str("\r\n");
        let mut bytes = body.into_bytes();
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        bytes
    }

    fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri("/upload-image")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        request.body(Body::from(body)).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_upload_stores_image() {
        let (app, store) = app(MemoryStore::default(), 1024);
        let body = multipart_body("file", "cat.jpeg", Some("image/jpeg"), b"jpegdata");

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json(response).await;
        let url = json["url"].as_str().unwrap();
        assert!(url.starts_with("https://cdn.test/upload-"));
        assert!(url.ends_with(".jpeg"));

        let objects = store.objects.lock();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].1, "image/jpeg");
        assert_eq!(objects[0].2, 8);
    }

    #[tokio::test]
    async fn test_upload_requires_user() {
        let (app, store) = app(MemoryStore::default(), 1024);
        let body = multipart_body("file", "cat.png", Some("image/png"), b"png");

        let response = app.oneshot(upload_request(Some("expired"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["error"], "Unauthorized");
        assert!(store.objects.lock().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (app, _) = app(MemoryStore::default(), 1024);
        let body = multipart_body("avatar", "cat.png", Some("image/png"), b"png");

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let (app, _) = app(MemoryStore::default(), 1024);
        let body = multipart_body("file", "doc.pdf", Some("application/pdf"), b"%PDF");

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "Invalid file type. Only image files are allowed."
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_oversize_file() {
        let max = 10 * 1024 * 1024;
        let (app, store) = app(MemoryStore::default(), max);
        let body = multipart_body("file", "big.png", Some("image/png"), &vec![0u8; max + 1]);

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "File too large. Maximum size allowed is 10MB."
        );
        assert!(store.objects.lock().is_empty());
    }

    #[tokio::test]
    async fn test_type_is_checked_before_size() {
        let (app, _) = app(MemoryStore::default(), 16);
        let body = multipart_body("file", "clip.mp4", Some("video/mp4"), &[0u8; 64]);

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(response).await["error"],
            "Invalid file type. Only image files are allowed."
        );
    }

    #[tokio::test]
    async fn test_upload_guesses_missing_content_type() {
        let (app, store) = app(MemoryStore::default(), 1024);
        let body = multipart_body("file", "anim.gif", None, b"GIF89a");

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.objects.lock()[0].1, "image/gif");
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let (app, _) = app(
            MemoryStore {
                fail: true,
                ..Default::default()
            },
            1024,
        );
        let body = multipart_body("file", "cat.png", Some("image/png"), b"png");

        let response = app.oneshot(upload_request(Some("valid-token"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Failed to process upload");
    }
}
