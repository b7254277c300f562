use crate::error::{AppError, Result};
use crate::traits::session::{SessionRecord, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::sync::Arc;
use tokio::sync::OnceCell;

// Compares and bumps the access time server-side so concurrent touches from
// different processes cannot regress expires_at.
const TOUCH_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return false
end
local record = cjson.decode(raw)
local accessed = tonumber(ARGV[1])
if accessed > tonumber(record.last_accessed_at) then
  record.last_accessed_at = accessed
  record.expires_at = accessed + tonumber(ARGV[2])
  raw = cjson.encode(record)
  redis.call('SET', KEYS[1], raw, 'PX', ARGV[2])
end
return raw
"#;

/// Redis session store
///
/// Records are stored as JSON under `{key_prefix}{session_id}` with a native
/// expiry matching the sliding window, so Redis purges abandoned sessions on
/// its own. Shared by every API process pointing at the same instance.
///
/// One [`ConnectionManager`] is opened on first use and shared by every
/// clone; it reconnects on its own after the server drops. A failed first
/// connect leaves the cell empty, so the next call tries again.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    connection: Arc<OnceCell<ConnectionManager>>,
    key_prefix: String,
    touch: redis::Script,
}

// Bounds how long a request waits on an unreachable Redis
const CONNECT_RETRIES: usize = 1;
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
const RESPONSE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

impl RedisSessionStore {
    /// Create a new Redis session store from a connection URL
    ///
    /// Does not connect; use [`ping`](SessionStore::ping) to check reachability.
    pub fn new(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::misconfigured(format!("Invalid session store URL: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(OnceCell::new()),
            key_prefix: key_prefix.into(),
            touch: redis::Script::new(TOUCH_SCRIPT),
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    async fn get_connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(CONNECT_RETRIES)
                    .set_connection_timeout(CONNECT_TIMEOUT)
                    .set_response_timeout(RESPONSE_TIMEOUT);
                let manager = ConnectionManager::new_with_config(self.client.clone(), config)
                    .await
                    .map_err(|e| AppError::store_unavailable(format!("Failed to get Redis connection: {}", e)))?;
                tracing::info!(key_prefix = %self.key_prefix, "Redis session store connected");
                Ok::<_, AppError>(manager)
            })
            .await?;

        Ok(manager.clone())
    }
}

fn decode(raw: Option<String>) -> Result<Option<SessionRecord>> {
    match raw {
        None => Ok(None),
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| AppError::internal(format!("Corrupt session record: {}", e))),
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    ttl.num_milliseconds().max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut conn = self.get_connection().await?;

        let raw = redis::cmd("GET")
            .arg(self.key(session_id))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis GET failed: {}", e)))?;

        decode(raw)
    }

    async fn set(&self, session_id: &str, record: SessionRecord, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(&record)
            .map_err(|e| AppError::internal(format!("Failed to encode session record: {}", e)))?;
        let mut conn = self.get_connection().await?;

        redis::cmd("SET")
            .arg(self.key(session_id))
            .arg(json)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis SET failed: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;

        redis::cmd("DEL")
            .arg(self.key(session_id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis DEL failed: {}", e)))?;

        Ok(())
    }

    async fn touch(
        &self,
        session_id: &str,
        accessed_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<SessionRecord>> {
        let mut conn = self.get_connection().await?;

        let raw = self
            .touch
            .key(self.key(session_id))
            .arg(accessed_at.timestamp_millis())
            .arg(ttl_millis(ttl))
            .invoke_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis touch failed: {}", e)))?;

        decode(raw)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        // Expiry is native (PX)
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis PING failed: {}", e)))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_misconfiguration() {
        let err = RedisSessionStore::new("not a url", "p:").err().unwrap();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));
    }

    #[test]
    fn test_keys_are_prefixed() {
        let store = RedisSessionStore::new("redis://127.0.0.1/", "projecthub:session:").unwrap();
        assert_eq!(store.key("abc"), "projecthub:session:abc");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let store = RedisSessionStore::new("redis://127.0.0.1:1/", "p:").unwrap();
        let err = store.get("abc").await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_on_next_call() {
        let store = RedisSessionStore::new("redis://127.0.0.1:1/", "p:").unwrap();
        let clone = store.clone();

        assert!(store.ping().await.is_err());
        assert!(!store.connection.initialized());
        assert!(matches!(clone.ping().await, Err(AppError::StoreUnavailable(_))));
    }

    // These tests require a running Redis instance

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_round_trip_and_touch() {
        let store = RedisSessionStore::new("redis://127.0.0.1/", "projecthub:test:").unwrap();
        let ttl = Duration::seconds(60);
        let start = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let record = SessionRecord::new(Some("user-1".into()), start, ttl);

        store.set("redis-s1", record.clone(), ttl).await.unwrap();
        assert_eq!(store.get("redis-s1").await.unwrap(), Some(record));

        let later = start + Duration::seconds(20);
        let touched = store.touch("redis-s1", later, ttl).await.unwrap().unwrap();
        assert_eq!(touched.expires_at, later + ttl);

        let stale = store.touch("redis-s1", start + Duration::seconds(5), ttl).await.unwrap().unwrap();
        assert_eq!(stale.expires_at, later + ttl);

        store.delete("redis-s1").await.unwrap();
        assert!(store.get("redis-s1").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_clones_share_one_connection() {
        let store = RedisSessionStore::new("redis://127.0.0.1/", "projecthub:test:").unwrap();
        let clone = store.clone();

        store.ping().await.unwrap();
        assert!(clone.connection.initialized());
        clone.ping().await.unwrap();
    }
}
