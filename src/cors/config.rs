use serde::{Deserialize, Serialize};
use crate::utils::{get_env_with_prefix, split_list};

/// Cross-origin configuration as loaded from the environment.
///
/// This is raw input; [`CorsPolicy`](super::CorsPolicy) is the validated form
/// the application actually runs with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// The single browser origin allowed to call the API with credentials
    /// (e.g. `https://app.example.com`). `None` means same-origin deployment.
    #[serde(default)]
    pub allowed_origin: Option<String>,

    /// Allowed HTTP methods
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the browser
    #[serde(default)]
    pub exposed_headers: Vec<String>,

    /// Whether cookies may accompany cross-origin requests
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,

    /// Maximum age for preflight caching (in seconds)
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: None,
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            exposed_headers: Vec::new(),
            allow_credentials: default_allow_credentials(),
            max_age_seconds: default_max_age(),
        }
    }
}

impl CorsConfig {
    /// Create a new CorsConfig builder
    pub fn builder() -> CorsConfigBuilder {
        CorsConfigBuilder::new()
    }

    /// Credentialed configuration for a browser client on `origin`
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            allowed_origin: Some(origin.into()),
            ..Default::default()
        }
    }

    /// Load CORS configuration from environment variables
    ///
    /// `CORS_ALLOWED_ORIGIN` wins over the `FRONTEND_ORIGIN` name the
    /// deployment platform usually provides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(origin) =
            get_env_with_prefix("CORS_ALLOWED_ORIGIN").or_else(|| get_env_with_prefix("FRONTEND_ORIGIN"))
        {
            let origin = origin.trim().to_string();
            if !origin.is_empty() {
                config.allowed_origin = Some(origin);
            }
        }

        if let Some(methods) = get_env_with_prefix("CORS_ALLOWED_METHODS") {
            config.allowed_methods = split_list(&methods);
        }

        if let Some(headers) = get_env_with_prefix("CORS_ALLOWED_HEADERS") {
            config.allowed_headers = split_list(&headers);
        }

        if let Some(exposed) = get_env_with_prefix("CORS_EXPOSED_HEADERS") {
            config.exposed_headers = split_list(&exposed);
        }

        if let Some(credentials) = get_env_with_prefix("CORS_ALLOW_CREDENTIALS") {
            if let Ok(credentials) = credentials.parse() {
                config.allow_credentials = credentials;
            }
        }

        if let Some(max_age) = get_env_with_prefix("CORS_MAX_AGE") {
            if let Ok(val) = max_age.parse() {
                config.max_age_seconds = val;
            }
        }

        config
    }
}

/// Builder for CorsConfig
#[must_use = "builder does nothing until you call build()"]
pub struct CorsConfigBuilder {
    config: CorsConfig,
}

impl CorsConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CorsConfig::default(),
        }
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.allowed_origin = Some(origin.into());
        self
    }

    pub fn allow_methods(mut self, methods: Vec<String>) -> Self {
        self.config.allowed_methods = methods;
        self
    }

    pub fn allow_headers(mut self, headers: Vec<String>) -> Self {
        self.config.allowed_headers = headers;
        self
    }

    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        self.config.exposed_headers.push(header.into());
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.config.max_age_seconds = seconds;
        self
    }

    pub fn build(self) -> CorsConfig {
        self.config
    }
}

impl Default for CorsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_allowed_headers() -> Vec<String> {
    vec!["Content-Type".to_string(), "Authorization".to_string()]
}

fn default_allow_credentials() -> bool {
    true
}

fn default_max_age() -> u64 {
    3600 // 1 hour
}
