//! Delegated identity provider verification.
//!
//! The browser obtains an access token from the provider (e.g. Google) and
//! posts it to the callback route. The token is exchanged against the
//! provider's userinfo endpoint, and the resulting identity is linked to a
//! local principal.

use super::account::{AccountStore, FederatedIdentity};
use super::principal::Principal;
use super::provider::{AuthFailure, CredentialVerifier, Credentials};
use crate::error::AppError;
use crate::utils::get_env_with_prefix;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Delegated provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DelegatedProviderConfig {
    /// Provider name clients send in the callback body (e.g. `google`)
    pub provider: String,
    /// OAuth2/OIDC userinfo endpoint
    pub userinfo_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl DelegatedProviderConfig {
    pub fn new(provider: impl Into<String>, userinfo_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            userinfo_url: userinfo_url.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Load from `OAUTH_PROVIDER` and `OAUTH_USERINFO_URL`. `None` unless both are set.
    pub fn from_env() -> Option<Self> {
        let provider = get_env_with_prefix("OAUTH_PROVIDER")?;
        let userinfo_url = get_env_with_prefix("OAUTH_USERINFO_URL")?;
        let mut config = Self::new(provider, userinfo_url);
        if let Some(timeout) = get_env_with_prefix("OAUTH_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse() {
                config.timeout_seconds = seconds;
            }
        }
        Some(config)
    }
}

/// Exchanges a provider access token for the identity it belongs to
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, access_token: &str) -> Result<FederatedIdentity, AuthFailure>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

const USER_AGENT: &str = "projecthub-auth";

/// [`TokenExchange`] against an OAuth2/OIDC userinfo endpoint
#[derive(Clone, Debug)]
pub struct HttpUserInfoExchange {
    provider: String,
    userinfo_url: String,
    client: reqwest::Client,
}

impl HttpUserInfoExchange {
    /// # Errors
    ///
    /// Returns `MisconfiguredPolicy` if the HTTP client cannot be built.
    pub fn new(config: &DelegatedProviderConfig) -> crate::error::Result<Self> {
        Ok(Self {
            provider: config.provider.clone(),
            userinfo_url: config.userinfo_url.clone(),
            client: Self::build_client(Duration::from_secs(config.timeout_seconds), USER_AGENT)?,
        })
    }

    fn build_client(timeout: Duration, user_agent: &str) -> crate::error::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::misconfigured(format!("Cannot build userinfo HTTP client: {}", e)))
    }
}

#[async_trait]
impl TokenExchange for HttpUserInfoExchange {
    async fn exchange(&self, access_token: &str) -> Result<FederatedIdentity, AuthFailure> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthFailure::ProviderError(format!("Userinfo request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthFailure::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthFailure::ProviderError(format!("Userinfo endpoint returned {}", status)));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthFailure::ProviderError(format!("Malformed userinfo response: {}", e)))?;

        let email = info.email.ok_or(AuthFailure::InvalidCredentials)?;

        Ok(FederatedIdentity {
            provider: self.provider.clone(),
            subject: info.sub,
            email,
            email_verified: info.email_verified.unwrap_or(false),
            display_name: info.name,
            avatar_url: info.picture,
        })
    }
}

/// Verifies provider access tokens and links them to local principals
pub struct DelegatedProviderVerifier {
    provider: String,
    exchange: Arc<dyn TokenExchange>,
    accounts: Arc<dyn AccountStore>,
}

impl DelegatedProviderVerifier {
    pub fn new(provider: impl Into<String>, exchange: Arc<dyn TokenExchange>, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            provider: provider.into(),
            exchange,
            accounts,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

#[async_trait]
impl CredentialVerifier for DelegatedProviderVerifier {
    fn name(&self) -> &'static str {
        "delegated"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthFailure> {
        let Credentials::ProviderToken { provider, access_token } = credentials else {
            return Err(AuthFailure::UnsupportedCredentials);
        };
        if *provider != self.provider {
            return Err(AuthFailure::UnsupportedCredentials);
        }

        let identity = self.exchange.exchange(access_token).await?;

        self.accounts
            .link_federated(identity)
            .await
            .map_err(|e| AuthFailure::ProviderError(e.to_string()))
    }
}
