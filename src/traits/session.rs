//! Session storage trait
//!
//! This trait abstracts session persistence, allowing the application to run
//! against a single-process in-memory map or a store shared by every API
//! process.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side session record, keyed by its opaque session id
///
/// `expires_at` is always `last_accessed_at + ttl`. A record whose
/// `expires_at` has passed is logically absent even if it is still stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Bound principal. `None` for an anonymous placeholder session.
    pub principal_id: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_accessed_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record starting its sliding window at `now`
    pub fn new(principal_id: Option<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            principal_id,
            created_at: now,
            last_accessed_at: now,
            expires_at: now + ttl,
        }
    }

    /// Expired strictly after `expires_at`; the boundary instant is still valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal_id.is_some()
    }

    /// Slide the window forward to `accessed_at`
    ///
    /// Returns `None` when `accessed_at` is not newer than the last recorded
    /// access, so a late writer never moves `expires_at` backwards.
    pub fn touched(&self, accessed_at: DateTime<Utc>, ttl: Duration) -> Option<Self> {
        if accessed_at <= self.last_accessed_at {
            return None;
        }
        Some(Self {
            last_accessed_at: accessed_at,
            expires_at: accessed_at + ttl,
            ..self.clone()
        })
    }
}

/// Session storage trait
///
/// Every operation is atomic per session id. Implementations must not hold
/// a lock across an await point.
#[async_trait]
#[allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds
pub trait SessionStore: Send + Sync {
    /// Load a record by session id
    ///
    /// Returns the stored record as-is; callers decide expiry against their
    /// own clock. `Ok(None)` if nothing is stored under the id.
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Store a record, replacing any existing one. `ttl` bounds how long the
    /// backend keeps it physically.
    async fn set(&self, session_id: &str, record: SessionRecord, ttl: Duration) -> Result<()>;

    /// Delete a record. Deleting an unknown id is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Bump `last_accessed_at` to `accessed_at` and `expires_at` to
    /// `accessed_at + ttl`, only if `accessed_at` is newer than the stored
    /// access time.
    ///
    /// Returns the record as stored after the call, or `None` if it is gone.
    async fn touch(
        &self,
        session_id: &str,
        accessed_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<SessionRecord>>;

    /// Remove expired records. Backends with native TTL may return 0.
    async fn cleanup_expired(&self) -> Result<usize>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
