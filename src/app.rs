use std::sync::Arc;

use crate::auth::{
    AccountStore, CredentialVerifier, DelegatedProviderVerifier, HttpUserInfoExchange, InMemoryAccountStore,
    LocalPasswordVerifier, PasswordHasher, TokenExchange,
};
use crate::config::Config;
use crate::cors::CorsPolicy;
use crate::error::Result;
use crate::session::{Clock, CookiePolicy, InMemorySessionStore, SessionBackend, SessionManager, SystemClock};
use crate::traits::session::SessionStore;

/// Application context shared by every request
///
/// Assembled once at startup from a validated [`Config`] and immutable
/// afterwards; handlers receive it through `State<AppContext>`.
#[derive(Clone)]
pub struct AppContext {
    pub sessions: Arc<SessionManager>,
    pub cors: Arc<CorsPolicy>,
    pub accounts: Arc<dyn AccountStore>,
    /// Local email/password verifier
    pub local: Arc<dyn CredentialVerifier>,
    /// Delegated provider verifier, when one is configured
    pub delegated: Option<Arc<dyn CredentialVerifier>>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder(config: &Config) -> AppContextBuilder<'_> {
        AppContextBuilder::new(config)
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        self.sessions.store()
    }
}

/// Builder for AppContext with fluent API
///
/// Every collaborator defaults to what the configuration selects; the
/// `with_*` methods replace one for tests or custom deployments.
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder<'a> {
    config: &'a Config,
    store: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
    accounts: Option<Arc<dyn AccountStore>>,
    hasher: Option<PasswordHasher>,
    exchange: Option<Arc<dyn TokenExchange>>,
}

impl<'a> AppContextBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            accounts: None,
            hasher: None,
            exchange: None,
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_accounts(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Replace the HTTP userinfo exchange of the configured delegated provider
    pub fn with_token_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns `MisconfiguredPolicy` for an invalid CORS or session setup.
    pub fn build(self) -> Result<AppContext> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cors = Arc::new(CorsPolicy::from_config(&config.cors)?);

        let store = match self.store {
            Some(store) => store,
            None => session_store(config, clock.clone())?,
        };

        let cookie_policy = CookiePolicy::for_environment(config.environment);
        let sessions = Arc::new(SessionManager::new(&config.session, cookie_policy, store)?.with_clock(clock));

        let accounts = self
            .accounts
            .unwrap_or_else(|| Arc::new(InMemoryAccountStore::new()));
        let local: Arc<dyn CredentialVerifier> = Arc::new(LocalPasswordVerifier::new(
            accounts.clone(),
            self.hasher.unwrap_or_default(),
        )?);

        let delegated = config
            .oauth
            .as_ref()
            .map(|oauth| -> Result<Arc<dyn CredentialVerifier>> {
                let exchange: Arc<dyn TokenExchange> = match self.exchange.clone() {
                    Some(exchange) => exchange,
                    None => Arc::new(HttpUserInfoExchange::new(oauth)?),
                };
                Ok(Arc::new(DelegatedProviderVerifier::new(
                    oauth.provider.clone(),
                    exchange,
                    accounts.clone(),
                )))
            })
            .transpose()?;

        tracing::info!(
            environment = ?config.environment,
            session_backend = sessions.store().backend_name(),
            secure_cookie = sessions.policy().secure(),
            same_site = ?sessions.policy().same_site(),
            delegated_provider = delegated.is_some(),
            "Application context ready"
        );

        Ok(AppContext {
            sessions,
            cors,
            accounts,
            local,
            delegated,
        })
    }
}

fn session_store(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<dyn SessionStore>> {
    match config.session.backend {
        SessionBackend::Memory => Ok(Arc::new(InMemorySessionStore::with_clock(clock))),
        #[cfg(feature = "redis-store")]
        SessionBackend::Redis => {
            let url = config
                .session
                .store_url
                .as_deref()
                .ok_or_else(|| crate::error::AppError::misconfigured("SESSION_BACKEND=redis requires SESSION_STORE_URL"))?;
            Ok(Arc::new(crate::session::RedisSessionStore::new(
                url,
                config.session.key_prefix.clone(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DelegatedProviderConfig;
    use crate::config::ConfigBuilder;

    fn config() -> Config {
        ConfigBuilder::new()
            .with_session_secret("app-context-test-secret-32-bytes-min")
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults_to_in_memory_without_delegation() {
        let ctx = AppContext::builder(&config()).build().unwrap();
        assert_eq!(ctx.session_store().backend_name(), "memory");
        assert!(ctx.delegated.is_none());
    }

    #[test]
    fn test_delegated_provider_from_config() {
        let mut config = config();
        config.oauth = Some(DelegatedProviderConfig::new("google", "https://example.com/userinfo"));
        let ctx = AppContext::builder(&config).build().unwrap();
        assert!(ctx.delegated.is_some());
    }

    #[test]
    fn test_unvalidated_config_still_refuses_bad_policy() {
        let mut config = config();
        config.session.secret = None;
        assert!(AppContext::builder(&config).build().is_err());
    }
}
