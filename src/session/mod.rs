//! Server-side sessions.
//!
//! A signed cookie carries an opaque session id; the record behind it lives
//! in a [`SessionStore`](crate::traits::SessionStore). The in-memory store is
//! for single-process deployments only; the Redis store is shared by every
//! API process.

mod cleanup;
mod clock;
mod config;
mod in_memory;
mod layer;
mod manager;
mod policy;
#[cfg(feature = "redis-store")]
mod redis_store;
mod state;

pub use cleanup::spawn_cleanup_task;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MAX_TTL_SECONDS, SessionBackend, SessionConfig};
pub use in_memory::InMemorySessionStore;
pub use layer::{SessionGate, resolve_session};
pub use manager::{IssuedSession, SessionCookie, SessionManager, generate_session_id};
pub use policy::{CookiePolicy, SameSitePolicy};
#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;
pub use state::{ActiveSession, SessionState, UnauthenticatedReason};
