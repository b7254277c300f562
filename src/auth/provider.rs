use super::principal::Principal;
use crate::error::AppError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Credentials presented on a login or callback route
#[derive(Clone)]
pub enum Credentials {
    /// Local email and password
    Password { email: String, password: String },
    /// Access token issued by a delegated identity provider
    ProviderToken { provider: String, access_token: String },
}

// Never print secrets
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f.write_str("Credentials::Password"),
            Self::ProviderToken { provider, .. } => {
                f.debug_struct("Credentials::ProviderToken").field("provider", provider).finish()
            }
        }
    }
}

/// Why a verifier refused to authenticate
///
/// The variant is for logs. Clients see the same response for
/// `InvalidCredentials` and `AccountNotFound`.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Credentials not supported by this verifier")]
    UnsupportedCredentials,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountNotFound => "account_not_found",
            Self::ProviderError(_) => "provider_error",
            Self::UnsupportedCredentials => "unsupported_credentials",
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::ProviderError(msg) => AppError::service_unavailable(msg),
            AuthFailure::InvalidCredentials
            | AuthFailure::AccountNotFound
            | AuthFailure::UnsupportedCredentials => AppError::InvalidCredentials,
        }
    }
}

/// Strategy that turns credentials into a principal
///
/// # Example
///
/// ```rust,ignore
/// use projecthub::auth::{AuthFailure, CredentialVerifier, Credentials, Principal};
///
/// struct ApiKeyVerifier { /* ... */ }
///
/// #[async_trait]
/// impl CredentialVerifier for ApiKeyVerifier {
///     fn name(&self) -> &'static str {
///         "api-key"
///     }
///
///     async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthFailure> {
///         // Look up the key and return its principal
///     }
/// }
/// ```
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Authenticate credentials, returning the principal with a stable id
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthFailure>;
}
