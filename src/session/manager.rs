//! Session lifecycle: issue, rehydrate, slide and revoke.

use super::clock::{Clock, SystemClock, to_chrono};
use super::config::SessionConfig;
use super::policy::CookiePolicy;
use super::state::{ActiveSession, SessionState, UnauthenticatedReason};
use crate::auth::PrincipalId;
use crate::error::{AppError, Result};
use crate::traits::session::{SessionRecord, SessionStore};
use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use cookie::{Cookie, CookieJar, Key};
use std::future::Future;
use std::sync::Arc;

/// Bytes of entropy in a session identifier
const SESSION_ID_BYTES: usize = 32;

/// Session cookie found on a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCookie {
    Absent,
    /// Present but no value verified against the signing key
    Invalid,
    Valid(String),
}

impl SessionCookie {
    pub fn into_session_id(self) -> Option<String> {
        match self {
            Self::Valid(id) => Some(id),
            Self::Absent | Self::Invalid => None,
        }
    }
}

/// A freshly issued session
pub struct IssuedSession {
    pub principal_id: PrincipalId,
    pub expires_at: DateTime<Utc>,
    /// Ready-to-send `Set-Cookie` value
    pub set_cookie: HeaderValue,
}

/// Issues session cookies and rehydrates sessions from them
///
/// Built once at startup. The cookie policy, signing key and store handle
/// never change afterwards.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    key: Key,
    cookie_name: String,
    cookie_path: String,
    cookie_domain: Option<String>,
    policy: CookiePolicy,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a session manager
    ///
    /// # Errors
    ///
    /// Returns `MisconfiguredPolicy` if the signing secret is missing or too
    /// short, or the TTL is zero.
    pub fn new(config: &SessionConfig, policy: CookiePolicy, store: Arc<dyn SessionStore>) -> Result<Self> {
        if config.ttl_seconds == 0 {
            return Err(AppError::misconfigured("Session TTL must be greater than zero"));
        }

        Ok(Self {
            store,
            key: signing_key(config)?,
            cookie_name: config.cookie_name.clone(),
            cookie_path: config.cookie_path.clone(),
            cookie_domain: config.cookie_domain.clone(),
            policy,
            ttl: to_chrono(config.ttl()),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for expiry decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn policy(&self) -> &CookiePolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Extract and verify the session id from the request's `Cookie` headers
    ///
    /// Several `Cookie` headers, or several cookies with the session name,
    /// are all tried; the first one that verifies wins.
    pub fn session_cookie_from_headers(&self, headers: &HeaderMap) -> SessionCookie {
        let mut seen = false;

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for parsed in Cookie::split_parse_encoded(raw) {
                let Ok(candidate) = parsed else {
                    continue;
                };
                if candidate.name() != self.cookie_name {
                    continue;
                }
                seen = true;

                let mut jar = CookieJar::new();
                jar.add_original(candidate.into_owned());
                if let Some(verified) = jar.signed(&self.key).get(&self.cookie_name) {
                    return SessionCookie::Valid(verified.value().to_string());
                }
            }
        }

        if seen {
            SessionCookie::Invalid
        } else {
            SessionCookie::Absent
        }
    }

    /// Resolve the request's session
    ///
    /// Looks the id up, rejects expired records even if the store still holds
    /// them, and slides the expiry of live ones.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the backend cannot be reached. This is never
    /// folded into `Unauthenticated`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<SessionState> {
        let session_id = match self.session_cookie_from_headers(headers) {
            SessionCookie::Valid(id) => id,
            SessionCookie::Absent => return Ok(SessionState::Unauthenticated(UnauthenticatedReason::NoCookie)),
            SessionCookie::Invalid => {
                return Ok(SessionState::Unauthenticated(UnauthenticatedReason::InvalidCookie));
            }
        };

        let now = self.clock.now();
        let Some(record) = self.store.get(&session_id).await? else {
            return Ok(SessionState::Unauthenticated(UnauthenticatedReason::SessionMissing));
        };

        if record.is_expired_at(now) {
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.delete(&session_id).await {
                    tracing::warn!(error = %e, "Failed to purge expired session");
                }
            });
            return Ok(SessionState::Unauthenticated(UnauthenticatedReason::Expired));
        }

        if !record.is_authenticated() {
            return Ok(SessionState::Unauthenticated(UnauthenticatedReason::Anonymous));
        }

        let store = self.store.clone();
        let ttl = self.ttl;
        let id = session_id.clone();
        let touched = run_to_completion(async move { store.touch(&id, now, ttl).await }).await?;

        match touched.and_then(|r| r.principal_id.map(|p| (p, r.expires_at))) {
            Some((principal_id, expires_at)) => Ok(SessionState::Authenticated(ActiveSession {
                session_id,
                principal_id: PrincipalId::new(principal_id),
                expires_at,
            })),
            // Deleted between lookup and touch
            None => Ok(SessionState::Unauthenticated(UnauthenticatedReason::SessionMissing)),
        }
    }

    /// Issue a new session for `principal_id`
    ///
    /// Any session the client already presented is deleted first, so a
    /// pre-login identifier never becomes authenticated.
    pub async fn establish(&self, principal_id: &PrincipalId, previous: Option<String>) -> Result<IssuedSession> {
        if let Some(previous) = previous {
            let store = self.store.clone();
            run_to_completion(async move { store.delete(&previous).await }).await?;
        }

        let session_id = generate_session_id();
        let now = self.clock.now();
        let record = SessionRecord::new(Some(principal_id.to_string()), now, self.ttl);
        let expires_at = record.expires_at;

        let store = self.store.clone();
        let ttl = self.ttl;
        let id = session_id.clone();
        run_to_completion(async move { store.set(&id, record, ttl).await }).await?;

        Ok(IssuedSession {
            principal_id: principal_id.clone(),
            expires_at,
            set_cookie: self.session_cookie(&session_id, self.ttl)?,
        })
    }

    /// Delete a session record
    pub async fn revoke(&self, session_id: String) -> Result<()> {
        let store = self.store.clone();
        run_to_completion(async move { store.delete(&session_id).await }).await
    }

    /// Signed `Set-Cookie` value carrying `session_id`
    pub fn session_cookie(&self, session_id: &str, max_age: chrono::Duration) -> Result<HeaderValue> {
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(
            self.cookie_template(session_id.to_string())
                .max_age(cookie::time::Duration::seconds(max_age.num_seconds().max(0)))
                .build(),
        );

        let cookie = jar
            .get(&self.cookie_name)
            .ok_or_else(|| AppError::internal("Signed session cookie missing from jar"))?;
        encode_header(cookie)
    }

    /// Rolling cookie for an authenticated response, aligned with the
    /// record's extended expiry
    pub fn refreshed_cookie(&self, session: &ActiveSession) -> Result<HeaderValue> {
        self.session_cookie(&session.session_id, session.expires_at - self.clock.now())
    }

    /// `Set-Cookie` value that clears the session cookie
    pub fn removal_cookie(&self) -> Result<HeaderValue> {
        let mut cookie = self.cookie_template(String::new()).build();
        cookie.make_removal();
        encode_header(&cookie)
    }

    fn cookie_template(&self, value: String) -> cookie::CookieBuilder<'static> {
        let mut builder = Cookie::build((self.cookie_name.clone(), value))
            .path(self.cookie_path.clone())
            .http_only(self.policy.http_only())
            .secure(self.policy.secure())
            .same_site(cookie::SameSite::from(self.policy.same_site()));

        if let Some(domain) = &self.cookie_domain {
            builder = builder.domain(domain.clone());
        }

        builder
    }
}

fn encode_header(cookie: &Cookie<'_>) -> Result<HeaderValue> {
    HeaderValue::from_str(&cookie.encoded().to_string())
        .map_err(|e| AppError::internal(format!("Invalid Set-Cookie header: {}", e)))
}

/// Run a store write on its own task so it finishes even if the request
/// future is dropped by a client disconnect
async fn run_to_completion<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| AppError::internal(format!("Session store task failed: {}", e)))?
}

/// Generate an opaque, URL-safe session id with 256 bits of entropy
pub fn generate_session_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn signing_key(config: &SessionConfig) -> Result<Key> {
    if let Some(secret) = &config.secret {
        // 128 hex characters = a raw 64-byte key
        if secret.len() == 128 {
            if let Ok(bytes) = hex::decode(secret) {
                return Key::try_from(bytes.as_slice())
                    .map_err(|e| AppError::misconfigured(format!("Invalid session secret: {}", e)));
            }
        }

        if secret.len() < 32 {
            return Err(AppError::misconfigured(
                "SESSION_SECRET must be at least 32 bytes. Generate one with: openssl rand -hex 64",
            ));
        }

        return Ok(Key::derive_from(secret.as_bytes()));
    }

    if config.allow_generated_secret {
        tracing::error!("┌──────────────────────────────────────────────────────────────────────────────┐");
        tracing::error!("│ SECURITY WARNING: Using a randomly generated session signing key!           │");
        tracing::error!("│                                                                              │");
        tracing::error!("│   • Sessions will be invalidated on every server restart                    │");
        tracing::error!("│   • Sessions won't work across multiple server instances                    │");
        tracing::error!("│                                                                              │");
        tracing::error!("│ To fix: Set SESSION_SECRET. Generate one with: openssl rand -hex 64         │");
        tracing::error!("└──────────────────────────────────────────────────────────────────────────────┘");
        return Ok(Key::generate());
    }

    Err(AppError::misconfigured(
        "Sessions require a signing secret. Set SESSION_SECRET (generate one with: openssl rand -hex 64). \
        For development only, set SESSION_ALLOW_GENERATED_SECRET=true.",
    ))
}
