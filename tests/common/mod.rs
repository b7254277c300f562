//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use projecthub::auth::{
    AuthFailure, FederatedIdentity, InMemoryAccountStore, PasswordConfig, PasswordHasher, TokenExchange,
};
use projecthub::session::{InMemorySessionStore, ManualClock};
use projecthub::testing;
use projecthub::{App, AppContext, Config, ConfigBuilder, CorsConfig, SessionConfig, SessionRecord, SessionStore};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const FRONTEND: &str = "https://app.example.com";
pub const EVIL: &str = "https://evil.example.net";
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse battery staple";
pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TTL_SECONDS: u64 = 60;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
}

pub fn config() -> Config {
    ConfigBuilder::new()
        .with_cors(CorsConfig::for_origin(FRONTEND))
        .with_session(SessionConfig {
            ttl_seconds: TTL_SECONDS,
            secret: Some(SECRET.to_string()),
            ..Default::default()
        })
        .build()
        .unwrap()
}

pub fn hasher() -> PasswordHasher {
    PasswordHasher::new(PasswordConfig::fast())
}

/// A running application with its clock and stores exposed to the test
pub struct Harness {
    pub config: Config,
    pub clock: ManualClock,
    pub store: Arc<dyn SessionStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub context: AppContext,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let clock = ManualClock::new(epoch());
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::with_clock(Arc::new(clock.clone())));
        Self::with_store(config, clock, store).await
    }

    pub async fn with_store(config: Config, clock: ManualClock, store: Arc<dyn SessionStore>) -> Self {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let hash = hasher().hash(PASSWORD).unwrap();
        accounts.add_local(EMAIL, Some("Ada".to_string()), hash).await;

        let context = AppContext::builder(&config)
            .with_session_store(store.clone())
            .with_clock(Arc::new(clock.clone()))
            .with_accounts(accounts.clone())
            .with_password_hasher(hasher())
            .with_token_exchange(Arc::new(StaticExchange))
            .build()
            .unwrap();

        Self {
            config,
            clock,
            store,
            accounts,
            context,
        }
    }

    pub fn router(&self) -> Router {
        App::builder(self.config.clone())
            .with_context(self.context.clone())
            .build()
            .unwrap()
            .into_router()
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(std::time::Duration::from_secs(seconds as u64));
    }

    /// Log in from the front end and return the `sessionId=...` pair
    pub async fn login(&self) -> String {
        testing::post(self.router(), "/api/auth/login")
            .origin(FRONTEND)
            .json_body(&json!({ "email": EMAIL, "password": PASSWORD }))
            .execute()
            .await
            .assert_ok()
            .cookie_pair("sessionId")
            .expect("login sets the session cookie")
    }
}

/// Token exchange that accepts exactly one token
pub struct StaticExchange;

#[async_trait]
impl TokenExchange for StaticExchange {
    async fn exchange(&self, access_token: &str) -> Result<FederatedIdentity, AuthFailure> {
        match access_token {
            "valid-google-token" => Ok(FederatedIdentity {
                provider: "google".to_string(),
                subject: "google-ada".to_string(),
                email: EMAIL.to_string(),
                email_verified: true,
                display_name: Some("Ada Lovelace".to_string()),
                avatar_url: Some("https://img.example.com/ada.png".to_string()),
            }),
            "unverified-google-token" => Ok(FederatedIdentity {
                provider: "google".to_string(),
                subject: "google-impostor".to_string(),
                email: EMAIL.to_string(),
                email_verified: false,
                display_name: Some("Not Ada".to_string()),
                avatar_url: None,
            }),
            "provider-down" => Err(AuthFailure::ProviderError("upstream timeout".to_string())),
            _ => Err(AuthFailure::InvalidCredentials),
        }
    }
}

/// Session store wrapper that counts reads and can be switched off
#[derive(Default)]
pub struct ProbeStore {
    inner: InMemorySessionStore,
    pub lookups: AtomicUsize,
    pub failing: std::sync::atomic::AtomicBool,
}

impl ProbeStore {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inner: InMemorySessionStore::with_clock(Arc::new(clock)),
            lookups: AtomicUsize::new(0),
            failing: Default::default(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> projecthub::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(projecthub::AppError::store_unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for ProbeStore {
    async fn get(&self, session_id: &str) -> projecthub::Result<Option<SessionRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(session_id).await
    }

    async fn set(&self, session_id: &str, record: SessionRecord, ttl: Duration) -> projecthub::Result<()> {
        self.check()?;
        self.inner.set(session_id, record, ttl).await
    }

    async fn delete(&self, session_id: &str) -> projecthub::Result<()> {
        self.check()?;
        self.inner.delete(session_id).await
    }

    async fn touch(
        &self,
        session_id: &str,
        accessed_at: DateTime<Utc>,
        ttl: Duration,
    ) -> projecthub::Result<Option<SessionRecord>> {
        self.check()?;
        self.inner.touch(session_id, accessed_at, ttl).await
    }

    async fn cleanup_expired(&self) -> projecthub::Result<usize> {
        self.check()?;
        self.inner.cleanup_expired().await
    }

    async fn ping(&self) -> projecthub::Result<()> {
        self.check()
    }

    fn backend_name(&self) -> &'static str {
        "probe"
    }
}
