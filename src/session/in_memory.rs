use crate::error::Result;
use crate::session::clock::{Clock, SystemClock};
use crate::traits::session::{SessionRecord, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory session store implementation
///
/// Stores sessions in a HashMap. Only valid for a single-process deployment:
/// sessions are lost on restart and are not shared across instances, so
/// running more than one API process against it splits users' sessions.
/// Expired records are removed by [`cleanup_expired`](SessionStore::cleanup_expired),
/// which the application runs on an interval.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    /// Create a new in-memory session store
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose sweep uses the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of records currently held, expired or not
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn set(&self, session_id: &str, record: SessionRecord, _ttl: Duration) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn touch(
        &self,
        session_id: &str,
        accessed_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<SessionRecord>> {
        let mut sessions = self.sessions.write().await;
        let Some(record) = sessions.get_mut(session_id) else {
            return Ok(None);
        };
        if let Some(updated) = record.touched(accessed_at, ttl) {
            *record = updated;
        }
        Ok(Some(record.clone()))
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let initial_len = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok(initial_len - sessions.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use std::time::Duration as StdDuration;

    fn ttl() -> Duration {
        Duration::seconds(3600)
    }

    #[tokio::test]
    async fn test_get_set() {
        let store = InMemorySessionStore::new();
        let record = SessionRecord::new(Some("user-123".into()), Utc::now(), ttl());

        store.set("test-session-1", record.clone(), ttl()).await.unwrap();

        let loaded = store.get("test-session-1").await.unwrap();
        assert_eq!(loaded, Some(record));
        assert!(store.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemorySessionStore::new();
        let record = SessionRecord::new(Some("user-123".into()), Utc::now(), ttl());

        store.set("test-session-1", record, ttl()).await.unwrap();
        store.delete("test-session-1").await.unwrap();
        store.delete("test-session-1").await.unwrap();

        assert!(store.get("test-session-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_never_regresses() {
        let store = InMemorySessionStore::new();
        let start = Utc::now();
        store
            .set("s", SessionRecord::new(Some("u".into()), start, ttl()), ttl())
            .await
            .unwrap();

        let newer = start + Duration::seconds(30);
        let older = start + Duration::seconds(10);

        let after_newer = store.touch("s", newer, ttl()).await.unwrap().unwrap();
        let after_older = store.touch("s", older, ttl()).await.unwrap().unwrap();

        assert_eq!(after_newer.expires_at, newer + ttl());
        assert_eq!(after_older.expires_at, newer + ttl());
        assert_eq!(after_older.principal_id.as_deref(), Some("u"));
    }

    #[tokio::test]
    async fn test_touch_missing_session() {
        let store = InMemorySessionStore::new();
        assert!(store.touch("gone", Utc::now(), ttl()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_touches_keep_latest() {
        let store = InMemorySessionStore::new();
        let start = Utc::now();
        store
            .set("s", SessionRecord::new(Some("u".into()), start, ttl()), ttl())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for offset in 1..=50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .touch("s", start + Duration::seconds(offset), ttl())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = store.get("s").await.unwrap().unwrap();
        assert_eq!(record.last_accessed_at, start + Duration::seconds(50));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let clock = ManualClock::default();
        let store = InMemorySessionStore::with_clock(Arc::new(clock.clone()));
        let now = clock.now();

        store
            .set("expired-1", SessionRecord::new(None, now, Duration::seconds(1)), ttl())
            .await
            .unwrap();
        store
            .set("valid-1", SessionRecord::new(None, now, ttl()), ttl())
            .await
            .unwrap();

        clock.advance(StdDuration::from_secs(2));

        let removed = store.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);

        assert!(store.get("expired-1").await.unwrap().is_none());
        assert!(store.get("valid-1").await.unwrap().is_some());
        assert_eq!(store.len().await, 1);
    }
}
