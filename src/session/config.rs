use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use crate::utils::get_env_with_prefix;

/// Session backend type
///
/// The two backends are mutually exclusive deployment shapes, selected once
/// at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// In-memory store. Single process only: sessions are lost on restart
    /// and are not shared between instances behind a load balancer.
    Memory,
    /// Redis store shared by every API process
    #[cfg(feature = "redis-store")]
    Redis,
}

impl Default for SessionBackend {
    fn default() -> Self {
        Self::Memory
    }
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            #[cfg(feature = "redis-store")]
            "redis" => Ok(Self::Redis),
            #[cfg(not(feature = "redis-store"))]
            "redis" => Err("SESSION_BACKEND=redis needs a build with the redis-store feature".to_string()),
            other => Err(format!("Unknown SESSION_BACKEND: {}", other)),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Session backend type
    #[serde(default)]
    pub backend: SessionBackend,

    /// Connection string for the durable store (e.g. `redis://127.0.0.1/`)
    #[serde(default)]
    pub store_url: Option<String>,

    /// Key prefix for records in a shared store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Sliding expiration window (in seconds)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie domain (optional)
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Secret used to sign the session cookie.
    ///
    /// Either 128 hex characters (a raw 64-byte key) or any string of at
    /// least 32 bytes, which is expanded into a signing key.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// Allow a randomly generated signing key (DEVELOPMENT ONLY)
    ///
    /// Sessions then break across restarts and across instances. Rejected
    /// in production.
    #[serde(default)]
    pub allow_generated_secret: bool,

    /// Interval between in-memory expiry sweeps (in seconds)
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            store_url: None,
            key_prefix: default_key_prefix(),
            ttl_seconds: default_ttl_seconds(),
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            secret: None,
            allow_generated_secret: false,
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl SessionConfig {
    /// Load session configuration from environment variables
    ///
    /// Unparseable values keep their defaults here; `ConfigBuilder::from_env`
    /// reports them so startup fails instead.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(backend) = get_env_with_prefix("SESSION_BACKEND") {
            if let Ok(backend) = backend.parse() {
                config.backend = backend;
            }
        }

        if let Some(url) = get_env_with_prefix("SESSION_STORE_URL") {
            config.store_url = Some(url);
        }

        if let Some(prefix) = get_env_with_prefix("SESSION_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Some(ttl) = get_env_with_prefix("SESSION_TTL_SECONDS") {
            if let Ok(seconds) = ttl.parse() {
                config.ttl_seconds = seconds;
            }
        }

        if let Some(name) = get_env_with_prefix("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(domain) = get_env_with_prefix("SESSION_COOKIE_DOMAIN") {
            config.cookie_domain = Some(domain);
        }

        if let Some(path) = get_env_with_prefix("SESSION_COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Some(secret) = get_env_with_prefix("SESSION_SECRET") {
            config.secret = Some(secret);
        }

        if let Some(allow) = get_env_with_prefix("SESSION_ALLOW_GENERATED_SECRET") {
            if let Ok(allow) = allow.parse() {
                config.allow_generated_secret = allow;
            }
        }

        if let Some(interval) = get_env_with_prefix("SESSION_CLEANUP_INTERVAL_SECONDS") {
            if let Ok(seconds) = interval.parse() {
                config.cleanup_interval_seconds = seconds;
            }
        }

        config
    }

    /// Sliding expiration window as Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Longest sliding window accepted at startup
pub const MAX_TTL_SECONDS: u64 = 3600 * 24 * 365;

fn default_key_prefix() -> String {
    "projecthub:session:".to_string()
}

fn default_ttl_seconds() -> u64 {
    3600 * 24 // 24 hours
}

fn default_cookie_name() -> String {
    "sessionId".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cleanup_interval_seconds() -> u64 {
    3600
}
