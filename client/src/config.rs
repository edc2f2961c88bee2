use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// OAuth client registration for an external calendar provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub health_integration: bool,
    #[serde(default)]
    pub webhooks: bool,
}

/// Everything the client needs to know about the backend it talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Base URL every request path is joined onto
    pub api_url: String,

    #[serde(default)]
    pub google: OAuthClient,

    #[serde(default)]
    pub microsoft: OAuthClient,

    #[serde(default)]
    pub features: FeatureFlags,

    /// How long cached lists are considered fresh (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Background sync interval (seconds)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Per-attempt request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra attempts after the first failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause before each retry (milliseconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Also retry POST and PATCH
    #[serde(default)]
    pub retry_non_idempotent: bool,

    /// How long a login stays valid (days)
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_sync_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_session_days() -> i64 {
    10
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            google: OAuthClient::default(),
            microsoft: OAuthClient::default(),
            features: FeatureFlags::default(),
            cache_ttl_secs: default_cache_ttl(),
            sync_interval_secs: default_sync_interval(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
            retry_non_idempotent: false,
            session_days: default_session_days(),
        }
    }
}

impl Environment {
    /// Build from `DAYBOOK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_url: env::var("DAYBOOK_API_URL").unwrap_or(defaults.api_url),
            google: OAuthClient {
                client_id: env::var("DAYBOOK_GOOGLE_CLIENT_ID").unwrap_or_default(),
                redirect_uri: env::var("DAYBOOK_GOOGLE_REDIRECT_URI").unwrap_or_default(),
            },
            microsoft: OAuthClient {
                client_id: env::var("DAYBOOK_MICROSOFT_CLIENT_ID").unwrap_or_default(),
                redirect_uri: env::var("DAYBOOK_MICROSOFT_REDIRECT_URI").unwrap_or_default(),
            },
            features: FeatureFlags {
                offline_mode: flag("DAYBOOK_OFFLINE_MODE")?,
                push_notifications: flag("DAYBOOK_PUSH_NOTIFICATIONS")?,
                health_integration: flag("DAYBOOK_HEALTH_INTEGRATION")?,
                webhooks: flag("DAYBOOK_WEBHOOKS")?,
            },
            cache_ttl_secs: number("DAYBOOK_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            sync_interval_secs: number("DAYBOOK_SYNC_INTERVAL_SECS", defaults.sync_interval_secs)?,
            request_timeout_secs: number(
                "DAYBOOK_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            retry_attempts: number("DAYBOOK_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay_ms: number("DAYBOOK_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            retry_non_idempotent: flag("DAYBOOK_RETRY_NON_IDEMPOTENT")?,
            session_days: number("DAYBOOK_SESSION_DAYS", defaults.session_days)?,
        })
    }

    /// Load from a TOML file. Only `api_url` is required.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let environment: Environment =
            toml::from_str(&content).context("Failed to parse config file")?;
        Ok(environment)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be true or false", name)),
        Err(_) => Ok(false),
    }
}

fn number<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
