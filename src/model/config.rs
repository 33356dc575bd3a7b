use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    Rustls,
    NativeTls,
}

impl Default for TlsBackend {
    fn default() -> Self {
        Self::Rustls
    }
}

/// Launchpad application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public origin of the site (e.g. https://app.example.com)
    /// Falls back to the request's Host header when not configured
    #[serde(default)]
    pub site_url: Option<String>,

    /// Supabase project URL (required)
    #[serde(default)]
    pub supabase_url: Option<String>,

    /// Supabase anon (public) key, used for user-scoped auth calls
    #[serde(default)]
    pub supabase_anon_key: Option<String>,

    /// Supabase service role key, used for storage and table writes
    /// Falls back to the anon key if not configured
    #[serde(default)]
    pub supabase_service_role_key: Option<String>,

    /// OAuth provider used when /sign-in does not specify one
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,

    /// Prefix for session cookies ("{prefix}-access-token", ...)
    #[serde(default = "default_cookie_prefix")]
    pub cookie_prefix: String,

    /// Mark session cookies as Secure
    #[serde(default)]
    pub secure_cookies: bool,

    /// Google Generative AI API key (enables /api/chat)
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Polar webhook secret (enables /api/webhooks/polar)
    #[serde(default)]
    pub polar_webhook_secret: Option<String>,

    /// Maximum accepted clock skew for webhook timestamps, in seconds
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,

    /// Storage bucket for uploaded images
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    /// Maximum upload size in bytes (default: 10MB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Proxy authentication username (optional)
    #[serde(default)]
    pub proxy_username: Option<String>,

    /// Proxy authentication password (optional)
    #[serde(default)]
    pub proxy_password: Option<String>,

    #[serde(default = "default_tls_backend")]
    pub tls_backend: TlsBackend,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_oauth_provider() -> String {
    "google".to_string()
}

fn default_cookie_prefix() -> String {
    "sb".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

fn default_storage_bucket() -> String {
    "images".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_tls_backend() -> TlsBackend {
    TlsBackend::Rustls
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            site_url: None,
            supabase_url: None,
            supabase_anon_key: None,
            supabase_service_role_key: None,
            oauth_provider: default_oauth_provider(),
            cookie_prefix: default_cookie_prefix(),
            secure_cookies: false,
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            polar_webhook_secret: None,
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            storage_bucket: default_storage_bucket(),
            max_upload_bytes: default_max_upload_bytes(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            tls_backend: default_tls_backend(),
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            // Config file doesn't exist, start from defaults
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override secret-bearing fields from the environment
    ///
    /// Empty values are ignored so a blank variable never clears a configured value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SUPABASE_URL") {
            self.supabase_url = Some(v);
        }
        if let Some(v) = get("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(v);
        }
        if let Some(v) = get("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase_service_role_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_GENERATIVE_AI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get("POLAR_WEBHOOK_SECRET") {
            self.polar_webhook_secret = Some(v);
        }
        if let Some(v) = get("NEXT_PUBLIC_SITE_URL") {
            self.site_url = Some(v);
        }
    }

    /// Key used for privileged (server-side) Supabase calls
    pub fn service_key(&self) -> Option<&str> {
        self.supabase_service_role_key
            .as_deref()
            .or(self.supabase_anon_key.as_deref())
    }

    /// Non-empty webhook secret, if any
    pub fn webhook_secret(&self) -> Option<&str> {
        self.polar_webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}
