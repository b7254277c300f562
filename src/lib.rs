//! ProjectHub - session-authenticated REST backend
//!
//! A browser front end served from another origin logs in once and is then
//! recognised on every request through an HTTP-only signed session cookie.
//! This crate carries that subsystem: the cross-origin policy gate, the
//! session store and lifecycle, credential verification, and the gate that
//! keeps protected resource modules behind a live session.
//!
//! # Features
//!
//! - **CORS**: single trusted origin with credentials, answered preflights
//! - **Sessions**: sliding expiry over an in-memory or Redis store
//! - **Authentication**: local email/password and delegated provider tokens
//! - **Health Checks**: session store reachability on `/health`
//! - **Testing**: Alba-style HTTP scenarios with cookie and origin helpers
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use projecthub::{App, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> projecthub::Result<()> {
//!     projecthub::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let app = App::builder(config).build()?;
//!
//!     app.serve().await
//! }
//! ```

mod app;
pub mod auth;
mod config;
mod core;
pub mod cors;
mod error;
pub mod health;
mod http;
mod middleware;
pub mod session;
pub mod testing;
pub mod traits;
mod utils;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use auth::{
    CredentialVerifier, Credentials, CurrentPrincipal, OptionalPrincipal, Principal, PrincipalId, RequireAuth,
};
pub use config::{Config, ConfigBuilder, DeploymentEnvironment, LoggingConfig, ServerConfig};
pub use core::{App, AppBuilder};
pub use cors::{CorsConfig, CorsConfigBuilder, CorsPolicy};
pub use error::{AppError, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use http::RouteModule;
pub use session::{
    CookiePolicy, SameSitePolicy, SessionBackend, SessionConfig, SessionManager, SessionState,
    UnauthenticatedReason,
};
pub use traits::session::{SessionRecord, SessionStore};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with defaults read from the environment
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "projecthub=debug")
/// - `PROJECTHUB_LOG_JSON`: "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing from a loaded [`Config`]
///
/// `RUST_LOG` still wins over `logging.level` when it is set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install(env_filter, config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}
