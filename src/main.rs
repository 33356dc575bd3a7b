mod auth;
mod billing;
mod chat;
mod common;
mod http_client;
mod model;
mod supabase;
mod upload;

use std::sync::Arc;

use axum::Router;
use clap::Parser;

use auth::{AuthSettings, AuthState};
use billing::{BillingState, WebhookVerifier};
use chat::{ChatState, GeminiProvider};
use common::cors::cors_layer;
use http_client::{COMPLETION_TIMEOUT_SECS, ProxyConfig, SUPABASE_TIMEOUT_SECS, build_client};
use model::arg::Args;
use model::config::Config;
use supabase::{SupabaseAuth, SupabaseRest, SupabaseStorage};
use upload::UploadState;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    let Some(supabase_url) = config.supabase_url.clone() else {
        tracing::error!("supabaseUrl not set (config file or SUPABASE_URL)");
        std::process::exit(1);
    };
    let Some(anon_key) = config.supabase_anon_key.clone() else {
        tracing::error!("supabaseAnonKey not set (config file or SUPABASE_ANON_KEY)");
        std::process::exit(1);
    };
    if config.supabase_service_role_key.is_none() {
        tracing::warn!("supabaseServiceRoleKey not set, server-side writes use the anon key");
    }
    let service_key = config.service_key().unwrap_or(anon_key.as_str()).to_string();

    // Build HTTP clients
    let proxy_config = ProxyConfig::from_config(&config);
    if let Some(proxy) = &proxy_config {
        tracing::info!("HTTP proxy configured: {}", proxy.url);
    }
    let supabase_client = build_client(
        proxy_config.as_ref(),
        SUPABASE_TIMEOUT_SECS,
        config.tls_backend,
    )
    .unwrap_or_else(|e| {
        tracing::error!("Failed to create HTTP client: {}", e);
        std::process::exit(1);
    });

    // Auth routes
    let identity = Arc::new(SupabaseAuth::new(
        &supabase_url,
        &anon_key,
        supabase_client.clone(),
    ));
    let auth_settings = AuthSettings::from_config(&config);
    let access_cookie = auth_settings.access_cookie();
    let auth_app = auth::create_auth_router(AuthState::new(identity.clone(), auth_settings));

    // Upload route
    let storage = Arc::new(SupabaseStorage::new(
        &supabase_url,
        &service_key,
        &config.storage_bucket,
        supabase_client.clone(),
    ));
    let upload_app = upload::create_upload_router(UploadState {
        provider: identity,
        store: storage,
        access_cookie,
        max_bytes: config.max_upload_bytes,
    });

    let mut api = Router::new().nest("/auth", auth_app).merge(upload_app);

    // Chat route (if a Gemini API key is configured)
    let chat_enabled = match config.gemini_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(api_key) => {
            let completion_client = build_client(
                proxy_config.as_ref(),
                COMPLETION_TIMEOUT_SECS,
                config.tls_backend,
            )
            .unwrap_or_else(|e| {
                tracing::error!("Failed to create HTTP client: {}", e);
                std::process::exit(1);
            });
            let provider = GeminiProvider::new(
                &config.gemini_base_url,
                api_key,
                &config.gemini_model,
                completion_client,
            );
            api = api.merge(chat::create_chat_router(ChatState {
                provider: Arc::new(provider),
            }));
            true
        }
        None => {
            tracing::warn!("geminiApiKey not set, chat API not enabled");
            false
        }
    };

    // Billing webhook (if a webhook secret is configured)
    let webhook_enabled = match config.webhook_secret() {
        Some(secret) => {
            let verifier = WebhookVerifier::new(secret, config.webhook_tolerance_secs)
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to create webhook verifier: {}", e);
                    std::process::exit(1);
                });
            let store = Arc::new(SupabaseRest::new(
                &supabase_url,
                &service_key,
                supabase_client.clone(),
            ));
            api = api.merge(billing::create_billing_router(BillingState::new(
                verifier, store,
            )));
            true
        }
        None => {
            tracing::warn!("polarWebhookSecret not set, billing webhook not enabled");
            false
        }
    };

    let app = Router::new()
        .nest("/api", api)
        .layer(cors_layer(config.site_url.as_deref()));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server: {}", addr);
    tracing::info!("Supabase project: {}", supabase_url);
    tracing::info!("Available APIs:");
    tracing::info!("  GET  /api/auth/sign-in");
    tracing::info!("  GET  /api/auth/callback");
    tracing::info!("  GET  /api/auth/session");
    tracing::info!("  POST /api/auth/sign-out");
    tracing::info!("  POST /api/upload-image");
    if chat_enabled {
        tracing::info!("  POST /api/chat (model {})", config.gemini_model);
    }
    if webhook_enabled {
        tracing::info!("  POST /api/webhooks/polar");
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
