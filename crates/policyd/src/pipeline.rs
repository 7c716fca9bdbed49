use chrono::Utc;
use policy_codec::{format_response, invalid_request_response, is_valid, parse_attributes, probe_version};
use policy_rules::RuleRegistry;
use policy_store::{DecisionEvent, Store, UPDATES_CHANNEL};
use policy_throttle::{CheckResult, RateLimiterSet};
use policy_types::InquiryRecord;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Composes Codec -> Evaluator -> Limiter -> response for one framed
/// inquiry block, persists the resulting record, and fans the decision
/// out to the Observer channel.
pub struct DecisionPipeline {
    registry: Arc<RuleRegistry>,
    limiters: Arc<RateLimiterSet>,
    store: Arc<dyn Store>,
    events: mpsc::Sender<DecisionEvent>,
}

impl DecisionPipeline {
    pub fn new(
        registry: Arc<RuleRegistry>,
        limiters: Arc<RateLimiterSet>,
        store: Arc<dyn Store>,
        events: mpsc::Sender<DecisionEvent>,
    ) -> Self {
        Self {
            registry,
            limiters,
            store,
            events,
        }
    }

    /// Handles one framed block (the bytes up to, but not including, the
    /// terminating blank line) and returns the wire response to write
    /// back, already framed with its own trailing `\n\n`.
    pub async fn handle(&self, block: &str) -> String {
        let attrs = parse_attributes(block);
        if !is_valid(&attrs) {
            return invalid_request_response();
        }

        let timestamp = Utc::now();
        let version = probe_version(&attrs);

        let (verdict, matched_rule) = match self.registry.evaluate(&attrs) {
            Some(m) => {
                let verdict = format_response(&m.action, m.custom_text.as_deref())
                    .trim_end_matches("\n\n")
                    .to_string();
                (verdict, Some(m.rule_id))
            }
            None => match self.limiters.check(&attrs, timestamp) {
                CheckResult::Blocked { custom_text } => (format!("REJECT {custom_text}"), None),
                CheckResult::Allowed => ("DUNNO".to_string(), None),
            },
        };

        let record = InquiryRecord {
            id: None,
            attributes: attrs,
            timestamp,
            matched_rule,
            verdict: verdict.clone(),
        };

        // A store outage must not keep the MTA waiting on a verdict that
        // was already computed in-memory; log and fall back to the
        // unpersisted record so the Observer still sees a timestamped
        // event.
        let stored = match self.store.insert_inquiry(record.clone()).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::error!(error = %err, "failed to persist inquiry record");
                record
            }
        };

        let event = DecisionEvent {
            record: stored,
            version,
            verdict: verdict.clone(),
        };
        if self.events.try_send(event).is_err() {
            tracing::warn!("observer channel full or closed; dropping decision event");
        }

        format!("{verdict}\n\n")
    }
}
