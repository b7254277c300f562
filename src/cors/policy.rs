use super::config::CorsConfig;
use crate::error::{AppError, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;

/// Which browser origin the API trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    /// No cross-origin access; the client is served from the API's own origin.
    SameOrigin,
    /// Any origin may read responses. Never combined with credentials.
    Any,
    /// Exactly one origin, e.g. `https://app.example.com`.
    Exact(HeaderValue),
}

/// Validated, immutable cross-origin policy.
///
/// Built once at startup from [`CorsConfig`]. Construction fails with
/// [`AppError::MisconfiguredPolicy`] instead of silently downgrading, so a
/// process with an unusable policy never starts serving.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: OriginRule,
    methods: Vec<Method>,
    headers: Vec<HeaderName>,
    any_header: bool,
    exposed_headers: Vec<HeaderName>,
    credentials: bool,
    max_age: Duration,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self> {
        let origin = match config.allowed_origin.as_deref().map(str::trim) {
            None | Some("") => OriginRule::SameOrigin,
            Some("*") => OriginRule::Any,
            Some(origin) => OriginRule::Exact(parse_origin(origin)?),
        };

        if config.allow_credentials && origin == OriginRule::Any {
            return Err(AppError::misconfigured(
                "CORS credentials cannot be allowed for a wildcard origin; \
                 set CORS_ALLOWED_ORIGIN to the exact frontend origin",
            ));
        }

        if config.allowed_methods.is_empty() {
            return Err(AppError::misconfigured("CORS allowed methods cannot be empty"));
        }

        let methods = config
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_uppercase().as_bytes())
                    .map_err(|_| AppError::misconfigured(format!("Invalid CORS method: {}", m)))
            })
            .collect::<Result<Vec<_>>>()?;

        let any_header = config.allowed_headers.iter().any(|h| h.trim() == "*");
        if any_header && config.allow_credentials {
            return Err(AppError::misconfigured(
                "CORS wildcard headers cannot be combined with credentials",
            ));
        }

        let headers = if any_header {
            Vec::new()
        } else {
            parse_header_names(&config.allowed_headers)?
        };

        Ok(Self {
            origin,
            methods,
            headers,
            any_header,
            exposed_headers: parse_header_names(&config.exposed_headers)?,
            credentials: config.allow_credentials,
            max_age: Duration::from_secs(config.max_age_seconds),
        })
    }

    pub fn origin(&self) -> &OriginRule {
        &self.origin
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn headers(&self) -> &[HeaderName] {
        &self.headers
    }

    pub fn allows_any_header(&self) -> bool {
        self.any_header
    }

    pub fn exposed_headers(&self) -> &[HeaderName] {
        &self.exposed_headers
    }

    pub fn allows_credentials(&self) -> bool {
        self.credentials
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Whether a response to `origin` may carry the credentials affirmation.
    pub fn allows_credentials_for(&self, origin: &HeaderValue) -> bool {
        self.credentials && matches!(&self.origin, OriginRule::Exact(allowed) if allowed == origin)
    }

    /// Whether a session cookie arriving with this `Origin` header may be honored.
    ///
    /// Requests without an `Origin` header are top-level navigations or
    /// same-origin reads; they fall under the cookie's SameSite policy instead.
    pub fn honors_session_from(&self, origin: Option<&HeaderValue>) -> bool {
        match (origin, &self.origin) {
            (None, _) => true,
            (Some(_), OriginRule::SameOrigin | OriginRule::Any) => true,
            (Some(origin), OriginRule::Exact(allowed)) => origin == allowed,
        }
    }
}

fn parse_origin(origin: &str) -> Result<HeaderValue> {
    let url = url::Url::parse(origin)
        .map_err(|e| AppError::misconfigured(format!("Invalid CORS origin '{}': {}", origin, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::misconfigured(format!(
            "CORS origin '{}' must use http or https",
            origin
        )));
    }

    // Browsers send the bare serialized origin; anything else never matches.
    let serialized = url.origin().ascii_serialization();
    if serialized != origin {
        return Err(AppError::misconfigured(format!(
            "CORS origin '{}' must be a bare origin such as '{}'",
            origin, serialized
        )));
    }

    HeaderValue::from_str(&serialized)
        .map_err(|_| AppError::misconfigured(format!("Invalid CORS origin: {}", origin)))
}

fn parse_header_names(names: &[String]) -> Result<Vec<HeaderName>> {
    names
        .iter()
        .map(|h| {
            HeaderName::from_bytes(h.trim().to_lowercase().as_bytes())
                .map_err(|_| AppError::misconfigured(format!("Invalid CORS header: {}", h)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[test]
    fn test_exact_origin_policy() {
        let policy = CorsPolicy::from_config(&CorsConfig::for_origin("https://app.example.com")).unwrap();
        assert_eq!(policy.origin(), &OriginRule::Exact(origin("https://app.example.com")));
        assert!(policy.allows_credentials_for(&origin("https://app.example.com")));
        assert!(!policy.allows_credentials_for(&origin("https://evil.example.com")));
        assert_eq!(policy.methods().len(), 5);
    }

    #[test]
    fn test_wildcard_with_credentials_fails_fast() {
        let config = CorsConfig::builder().allow_origin("*").allow_credentials(true).build();
        let err = CorsPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
    }

    #[test]
    fn test_wildcard_without_credentials_is_allowed() {
        let config = CorsConfig::builder().allow_origin("*").allow_credentials(false).build();
        let policy = CorsPolicy::from_config(&config).unwrap();
        assert_eq!(policy.origin(), &OriginRule::Any);
        assert!(!policy.allows_credentials_for(&origin("https://anything.example")));
    }

    #[test]
    fn test_wildcard_headers_with_credentials_fails() {
        let config = CorsConfig::builder()
            .allow_origin("https://app.example.com")
            .allow_headers(vec!["*".to_string()])
            .build();
        assert!(CorsPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_origin_with_path_rejected() {
        let config = CorsConfig::for_origin("https://app.example.com/");
        assert!(CorsPolicy::from_config(&config).is_err());

        let config = CorsConfig::for_origin("https://app.example.com/login");
        assert!(CorsPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_origin_with_port_accepted() {
        let config = CorsConfig::for_origin("http://localhost:5173");
        let policy = CorsPolicy::from_config(&config).unwrap();
        assert!(policy.allows_credentials_for(&origin("http://localhost:5173")));
        assert!(!policy.allows_credentials_for(&origin("http://localhost:3000")));
    }

    #[test]
    fn test_non_http_origin_rejected() {
        let config = CorsConfig::for_origin("ftp://files.example.com");
        assert!(CorsPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let config = CorsConfig::builder()
            .allow_origin("https://app.example.com")
            .allow_methods(vec!["GET".to_string(), "NOT A METHOD".to_string()])
            .build();
        assert!(CorsPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_missing_origin_is_same_origin() {
        let policy = CorsPolicy::from_config(&CorsConfig::default()).unwrap();
        assert_eq!(policy.origin(), &OriginRule::SameOrigin);
        assert!(policy.honors_session_from(Some(&origin("https://app.example.com"))));
    }

    #[test]
    fn test_honors_session_only_from_allowed_origin() {
        let policy = CorsPolicy::from_config(&CorsConfig::for_origin("https://app.example.com")).unwrap();
        assert!(policy.honors_session_from(None));
        assert!(policy.honors_session_from(Some(&origin("https://app.example.com"))));
        assert!(!policy.honors_session_from(Some(&origin("https://evil.example.com"))));
    }
}
