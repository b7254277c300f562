use crate::traits::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the periodic expiry sweep for a session store
///
/// Each tick calls [`SessionStore::cleanup_expired`]. Failures are logged
/// and the sweep keeps running. Abort the returned handle at shutdown.
///
/// A zero interval is refused at config build; if one arrives here anyway
/// the sweep logs and exits instead of running.
pub fn spawn_cleanup_task(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval.is_zero() {
            tracing::error!(backend = store.backend_name(), "Session sweep interval is zero; sweep disabled");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(removed, backend = store.backend_name(), "Expired sessions swept");
                }
                Err(e) => {
                    tracing::warn!(error = %e, backend = store.backend_name(), "Session sweep failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Clock, InMemorySessionStore, ManualClock};
    use crate::traits::session::SessionRecord;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_records() {
        let clock = ManualClock::default();
        let store = InMemorySessionStore::with_clock(Arc::new(clock.clone()));
        store
            .set(
                "old",
                SessionRecord::new(None, clock.now(), chrono::Duration::seconds(1)),
                chrono::Duration::seconds(1),
            )
            .await
            .unwrap();
        clock.advance(Duration::from_secs(5));

        let handle = spawn_cleanup_task(Arc::new(store.clone()), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        // Let the sweep finish after the tick fires
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(store.is_empty().await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_zero_interval_exits_without_panicking() {
        let handle = spawn_cleanup_task(Arc::new(InMemorySessionStore::new()), Duration::ZERO);
        assert!(handle.await.is_ok());
    }
}
