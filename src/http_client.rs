//! HTTP Client builder module
//!
//! Builds the reqwest clients shared by the Supabase and Gemini collaborators

use reqwest::{Client, Proxy};
use std::time::Duration;

use crate::model::config::{Config, TlsBackend};

/// Timeout for identity, storage and table calls
pub const SUPABASE_TIMEOUT_SECS: u64 = 30;

/// Timeout for a whole streamed completion
pub const COMPLETION_TIMEOUT_SECS: u64 = 720;

/// Proxy configuration
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Proxy URL, supports http/https/socks5
    pub url: String,
    /// Proxy authentication username
    pub username: Option<String>,
    /// Proxy authentication password
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Build from the proxy fields of the application config
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.proxy_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let mut proxy = Self {
            url: url.to_string(),
            username: None,
            password: None,
        };
        if let (Some(username), Some(password)) = (&config.proxy_username, &config.proxy_password) {
            proxy.username = Some(username.clone());
            proxy.password = Some(password.clone());
        }
        Some(proxy)
    }
}

/// Build HTTP Client
///
/// # Arguments
/// * `proxy` - Optional proxy configuration
/// * `timeout_secs` - Timeout in seconds
/// * `tls_backend` - TLS implementation to use
pub fn build_client(
    proxy: Option<&ProxyConfig>,
    timeout_secs: u64,
    tls_backend: TlsBackend,
) -> anyhow::Result<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

    if tls_backend == TlsBackend::Rustls {
        builder = builder.use_rustls_tls();
    }

    if let Some(proxy_config) = proxy {
        let mut proxy = Proxy::all(&proxy_config.url)?;

        if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(username, password);
        }

        builder = builder.proxy(proxy);
        tracing::debug!("HTTP Client using proxy: {}", proxy_config.url);
    }

    Ok(builder.build()?)
}
