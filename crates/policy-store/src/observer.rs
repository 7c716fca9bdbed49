use async_trait::async_trait;
use policy_types::InquiryRecord;
use tokio::sync::mpsc;

/// The `{record, version, verdict}` payload emitted on the `"updates"`
/// channel for every answered inquiry. `verdict` duplicates
/// `record.verdict` because the wire payload is a flat triple, not a
/// nested record.
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    pub record: InquiryRecord,
    pub version: &'static str,
    pub verdict: String,
}

pub const UPDATES_CHANNEL: &str = "updates";

/// The realtime push channel's stand-in interface. Delivery is
/// best-effort, at-most-once per inquiry: an `Observer` that errors or
/// blocks must never hold up the connection that produced the event;
/// callers fan events out through a bounded channel to a dedicated task
/// rather than awaiting `emit` inline.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn emit(&self, channel: &str, payload: DecisionEvent);
}

/// Discards every event. The default when no realtime push channel is
/// configured.
#[derive(Default)]
pub struct NullObserver;

#[async_trait]
impl Observer for NullObserver {
    async fn emit(&self, _channel: &str, _payload: DecisionEvent) {}
}

/// Re-exposes emitted events on an `mpsc::Receiver`, for tests that need
/// to assert on what the Decision Pipeline published.
pub struct ChannelObserver {
    tx: mpsc::Sender<(String, DecisionEvent)>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(String, DecisionEvent)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Observer for ChannelObserver {
    async fn emit(&self, channel: &str, payload: DecisionEvent) {
        if self.tx.send((channel.to_string(), payload)).await.is_err() {
            tracing::debug!("ChannelObserver receiver dropped; discarding event");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use policy_types::AttributeMap;
    use chrono::Utc;

    fn sample_event() -> DecisionEvent {
        DecisionEvent {
            record: InquiryRecord {
                id: Some("1".to_string()),
                attributes: AttributeMap::new(),
                timestamp: Utc::now(),
                matched_rule: None,
                verdict: "DUNNO".to_string(),
            },
            version: "2.1 or earlier",
            verdict: "DUNNO".to_string(),
        }
    }

    #[tokio::test]
    async fn null_observer_discards_silently() {
        let observer = NullObserver;
        observer.emit(UPDATES_CHANNEL, sample_event()).await;
    }

    #[tokio::test]
    async fn channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new(4);
        observer.emit(UPDATES_CHANNEL, sample_event()).await;
        let (channel, payload) = rx.recv().await.unwrap();
        assert_eq!(channel, UPDATES_CHANNEL);
        assert_eq!(payload.verdict, "DUNNO");
    }
}
