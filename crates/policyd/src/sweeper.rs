use chrono::{Duration as ChronoDuration, Utc};
use policy_lifecycle::{Activity, ShutdownSubscription};
use policy_store::Store;
use policy_throttle::RateLimiterSet;
use std::sync::Arc;
use std::time::Duration;

/// Background task that expires stale Inquiry Records and stale rate
/// limiter Counters on its own cadence.
pub struct RetentionSweeper {
    store: Arc<dyn Store>,
    limiters: Arc<RateLimiterSet>,
    retention: ChronoDuration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn Store>,
        limiters: Arc<RateLimiterSet>,
        retention: ChronoDuration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            limiters,
            retention,
            interval,
        }
    }

    /// Runs one sweep: deletes Inquiry Records older than `retention` and
    /// expired limiter Counters. Returns the counts removed, for logging
    /// and for on-demand callers (e.g. tests).
    pub async fn sweep_once(&self) -> (u64, usize) {
        let _activity = Activity::get_opt();
        let now = Utc::now();
        let cutoff = now - self.retention;

        let deleted_inquiries = match self.store.delete_inquiries_older_than(cutoff).await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(error = %err, "failed to sweep expired inquiry records");
                0
            }
        };
        let deleted_counters = self.limiters.sweep_expired(now);

        if deleted_inquiries > 0 || deleted_counters > 0 {
            tracing::info!(
                deleted_inquiries,
                deleted_counters,
                "retention sweep complete"
            );
        }
        (deleted_inquiries, deleted_counters)
    }

    /// Runs sweeps on `interval` until shutdown is signalled; honours the
    /// shutdown signal between iterations rather than mid-sweep.
    pub async fn run(&self, mut shutdown: ShutdownSubscription) {
        loop {
            tokio::select! {
                _ = shutdown.shutting_down() => {
                    tracing::debug!("retention sweeper shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use policy_store::MemoryStore;
    use policy_types::{AttributeMap, InquiryRecord};

    #[tokio::test]
    async fn sweep_removes_only_stale_records() {
        let store = Arc::new(MemoryStore::new());
        let fresh = InquiryRecord {
            id: None,
            attributes: AttributeMap::new(),
            timestamp: Utc::now(),
            matched_rule: None,
            verdict: "DUNNO".to_string(),
        };
        let mut stale = fresh.clone();
        stale.timestamp = Utc::now() - ChronoDuration::hours(48);
        store.insert_inquiry(fresh).await.unwrap();
        store.insert_inquiry(stale).await.unwrap();

        let sweeper = RetentionSweeper::new(
            store.clone(),
            Arc::new(RateLimiterSet::new(Vec::new(), store.clone())),
            ChronoDuration::hours(24),
            Duration::from_secs(3600),
        );
        let (deleted_inquiries, _) = sweeper.sweep_once().await;
        assert_eq!(deleted_inquiries, 1);
        assert_eq!(store.list_inquiries(10).await.unwrap().len(), 1);
    }
}
