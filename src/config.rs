use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::auth::DelegatedProviderConfig;
use crate::cors::{CorsConfig, CorsPolicy};
use crate::error::{AppError, Result};
use crate::session::{MAX_TTL_SECONDS, SessionBackend, SessionConfig};
use crate::utils::get_env_with_prefix;

/// Main configuration, resolved once at process start
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub environment: DeploymentEnvironment,
    pub cors: CorsConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub oauth: Option<DelegatedProviderConfig>,
}

/// Deployment topology, selecting the session cookie policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    /// Client and API on the same site, plain HTTP allowed
    #[default]
    Development,
    /// Client and API on different sites over HTTPS
    Production,
}

impl DeploymentEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for DeploymentEnvironment {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            "production" | "prod" | "staging" => Ok(Self::Production),
            other => Err(format!("Unknown deployment environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Path the API routes are mounted under
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            base_path: default_base_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_base_path() -> String {
    "/api".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
    invalid: Vec<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            invalid: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.server.base_path = base_path.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_environment(mut self, environment: DeploymentEnvironment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = cors;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn with_session_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.session.secret = Some(secret.into());
        self
    }

    pub fn with_oauth(mut self, oauth: DelegatedProviderConfig) -> Self {
        self.config.oauth = Some(oauth);
        self
    }

    /// Load configuration from environment variables with PROJECTHUB_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        // PROJECTHUB_PORT first, then PORT (for PaaS compatibility)
        if let Some(port) = get_env_with_prefix("PORT") {
            match port.parse() {
                Ok(p) => self.config.server.port = p,
                Err(_) => self.invalid.push(format!("PORT is not a valid port: {}", port)),
            }
        }
        if let Some(max_body_size) = get_env_with_prefix("MAX_BODY_SIZE") {
            match max_body_size.parse() {
                Ok(size) => self.config.server.max_body_size = size,
                Err(_) => self.invalid.push(format!("MAX_BODY_SIZE is not a number: {}", max_body_size)),
            }
        }
        if let Some(base_path) = get_env_with_prefix("BASE_PATH") {
            self.config.server.base_path = base_path;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        // DEPLOYMENT_ENV wins over NODE_ENV
        if let Some(env) = get_env_with_prefix("DEPLOYMENT_ENV").or_else(|| get_env_with_prefix("NODE_ENV")) {
            match env.parse() {
                Ok(environment) => self.config.environment = environment,
                Err(e) => self.invalid.push(e),
            }
        }

        if let Some(backend) = get_env_with_prefix("SESSION_BACKEND") {
            if let Err(e) = backend.parse::<SessionBackend>() {
                self.invalid.push(e);
            }
        }
        for name in ["SESSION_TTL_SECONDS", "SESSION_CLEANUP_INTERVAL_SECONDS", "CORS_MAX_AGE"] {
            if let Some(value) = get_env_with_prefix(name) {
                if value.parse::<u64>().is_err() {
                    self.invalid.push(format!("{} is not a number: {}", name, value));
                }
            }
        }
        for name in ["SESSION_ALLOW_GENERATED_SECRET", "CORS_ALLOW_CREDENTIALS"] {
            if let Some(value) = get_env_with_prefix(name) {
                if value.parse::<bool>().is_err() {
                    self.invalid.push(format!("{} must be true or false: {}", name, value));
                }
            }
        }

        self.config.cors = CorsConfig::from_env();
        self.config.session = SessionConfig::from_env();
        self.config.oauth = DelegatedProviderConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns `MisconfiguredPolicy` if any setting is invalid:
    /// - Unparseable environment values
    /// - Invalid server address, log level or base path
    /// - A CORS policy allowing credentials for a wildcard origin
    /// - A missing or short session secret
    /// - A zero or oversized session TTL
    /// - A zero cleanup interval
    /// - A Redis backend without a store URL
    pub fn build(self) -> Result<Config> {
        if let Some(first) = self.invalid.first() {
            return Err(AppError::misconfigured(first.clone()));
        }

        let config = self.config;

        config.server.addr().map_err(|e| {
            AppError::misconfigured(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(AppError::misconfigured(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if config.server.max_body_size == 0 {
            return Err(AppError::misconfigured("Maximum body size must be greater than 0"));
        }

        if !config.server.base_path.is_empty() && !config.server.base_path.starts_with('/') {
            return Err(AppError::misconfigured(format!(
                "Base path must start with '/': {}",
                config.server.base_path
            )));
        }

        CorsPolicy::from_config(&config.cors)?;

        if config.cors.allowed_origin.is_none() && config.environment.is_production() {
            tracing::warn!("No CORS origin configured in production; cross-origin clients will be refused");
        }

        validate_session(&config.session, config.environment)?;

        if let Some(oauth) = &config.oauth {
            url::Url::parse(&oauth.userinfo_url).map_err(|e| {
                AppError::misconfigured(format!("Invalid OAUTH_USERINFO_URL {}: {}", oauth.userinfo_url, e))
            })?;
        }

        Ok(config)
    }
}

fn validate_session(session: &SessionConfig, environment: DeploymentEnvironment) -> Result<()> {
    match &session.secret {
        Some(secret) if secret.len() < 32 => {
            return Err(AppError::misconfigured("SESSION_SECRET must be at least 32 bytes"));
        }
        Some(_) => {}
        None if session.allow_generated_secret && !environment.is_production() => {}
        None if session.allow_generated_secret => {
            return Err(AppError::misconfigured(
                "A generated session secret is not allowed in production; set SESSION_SECRET",
            ));
        }
        None => {
            return Err(AppError::misconfigured(
                "SESSION_SECRET is required. Generate one with: openssl rand -hex 64",
            ));
        }
    }

    if session.ttl_seconds == 0 || session.ttl_seconds > MAX_TTL_SECONDS {
        return Err(AppError::misconfigured(format!(
            "SESSION_TTL_SECONDS must be between 1 and {}",
            MAX_TTL_SECONDS
        )));
    }

    if session.cleanup_interval_seconds == 0 {
        return Err(AppError::misconfigured(
            "SESSION_CLEANUP_INTERVAL_SECONDS must be greater than zero",
        ));
    }

    if session.cookie_name.is_empty() {
        return Err(AppError::misconfigured("Session cookie name must not be empty"));
    }

    match session.backend {
        #[cfg(feature = "redis-store")]
        SessionBackend::Redis if session.store_url.is_none() => {
            return Err(AppError::misconfigured(
                "SESSION_BACKEND=redis requires SESSION_STORE_URL",
            ));
        }
        SessionBackend::Memory if environment.is_production() => {
            tracing::warn!("In-memory session store in production: sessions are not shared between processes");
        }
        _ => {}
    }

    Ok(())
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "config-test-secret-with-enough-bytes!";

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new().with_session_secret(SECRET)
    }

    #[test]
    fn test_defaults_build_with_secret() {
        let config = builder().build().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.base_path, "/api");
        assert_eq!(config.environment, DeploymentEnvironment::Development);
        assert_eq!(config.session.ttl_seconds, 86_400);
    }

    #[test]
    fn test_missing_secret_refuses_to_start() {
        let err = ConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
    }

    #[test]
    fn test_generated_secret_only_outside_production() {
        let session = SessionConfig {
            allow_generated_secret: true,
            ..Default::default()
        };
        assert!(ConfigBuilder::new().with_session(session.clone()).build().is_ok());

        let err = ConfigBuilder::new()
            .with_session(session)
            .with_environment(DeploymentEnvironment::Production)
            .build()
            .unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
    }

    #[test]
    fn test_wildcard_origin_with_credentials_refuses_to_start() {
        let cors = CorsConfig::builder().allow_origin("*").allow_credentials(true).build();
        let err = builder().with_cors(cors).build().unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let session = SessionConfig {
            secret: Some(SECRET.into()),
            ttl_seconds: 0,
            ..Default::default()
        };
        assert!(ConfigBuilder::new().with_session(session).build().is_err());
    }

    #[test]
    fn test_zero_cleanup_interval_is_rejected() {
        let session = SessionConfig {
            secret: Some(SECRET.into()),
            cleanup_interval_seconds: 0,
            ..Default::default()
        };
        let err = ConfigBuilder::new().with_session(session).build().unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
        assert!(err.to_string().contains("SESSION_CLEANUP_INTERVAL_SECONDS"));
    }

    // Single test so the env mutations cannot race each other
    #[test]
    fn test_unparseable_env_values_refuse_to_start() {
        let cases = [
            ("PROJECTHUB_SESSION_BACKEND", "reddis", "SESSION_BACKEND"),
            ("PROJECTHUB_CORS_ALLOW_CREDENTIALS", "yes please", "CORS_ALLOW_CREDENTIALS"),
            ("PROJECTHUB_SESSION_ALLOW_GENERATED_SECRET", "sure", "SESSION_ALLOW_GENERATED_SECRET"),
            ("PROJECTHUB_SESSION_CLEANUP_INTERVAL_SECONDS", "hourly", "SESSION_CLEANUP_INTERVAL_SECONDS"),
        ];

        for (var, value, expected) in cases {
            unsafe {
                std::env::set_var(var, value);
            }
            let result = ConfigBuilder::new().from_env().with_session_secret(SECRET).build();
            unsafe {
                std::env::remove_var(var);
            }

            let err = result.unwrap_err();
            assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
            assert!(err.to_string().contains(expected), "{} gave: {}", var, err);
        }
    }

    #[cfg(feature = "redis-store")]
    #[test]
    fn test_redis_backend_requires_url() {
        let session = SessionConfig {
            secret: Some(SECRET.into()),
            backend: SessionBackend::Redis,
            ..Default::default()
        };
        assert!(ConfigBuilder::new().with_session(session).build().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        assert!(builder().with_log_level("loud").build().is_err());
    }

    #[test]
    fn test_base_path_must_be_absolute() {
        assert!(builder().with_base_path("api").build().is_err());
        assert!(builder().with_base_path("").build().is_ok());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<DeploymentEnvironment>(), Ok(DeploymentEnvironment::Production));
        assert_eq!("Development".parse::<DeploymentEnvironment>(), Ok(DeploymentEnvironment::Development));
        assert!("moon".parse::<DeploymentEnvironment>().is_err());
    }
}
