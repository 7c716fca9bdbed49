use async_trait::async_trait;
use chrono::{DateTime, Utc};
use policy_types::{Counter, InquiryRecord, LimiterId, RateLimiterConfig, Rule, RuleId};

/// Typed persistence over the four collections the core owns: `rules`,
/// `rate_limiters`, `rate_limit_counters`, and `inquiries`. Implemented
/// here by [`crate::MemoryStore`]; a persistent backend (SQLite, a
/// document store, …) implements the same trait.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_rule(&self, rule_id: RuleId) -> anyhow::Result<Option<Rule>>;
    async fn list_rules(&self) -> anyhow::Result<Vec<Rule>>;
    async fn insert_rule(&self, rule: Rule) -> anyhow::Result<()>;
    async fn replace_rule(&self, rule: Rule) -> anyhow::Result<()>;
    /// Replaces the whole rules collection atomically, used by
    /// `RuleRegistry` mutations that renumber every rule_id at once
    /// (delete, move, reseat) so the store never observes a
    /// non-dense intermediate state.
    async fn replace_all_rules(&self, rules: Vec<Rule>) -> anyhow::Result<()>;
    async fn delete_rule(&self, rule_id: RuleId) -> anyhow::Result<()>;

    async fn list_rate_limiters(&self) -> anyhow::Result<Vec<RateLimiterConfig>>;
    async fn insert_rate_limiter(&self, config: RateLimiterConfig) -> anyhow::Result<()>;
    async fn replace_rate_limiter(&self, config: RateLimiterConfig) -> anyhow::Result<()>;
    async fn delete_rate_limiter(&self, id: &LimiterId) -> anyhow::Result<()>;

    /// Atomic increment-or-create for one `(limiter_id, value)` counter.
    async fn upsert_counter(&self, counter: Counter) -> anyhow::Result<()>;
    async fn list_counters(&self) -> anyhow::Result<Vec<Counter>>;
    async fn delete_counters_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Inserts `record`. If `record.id` is set and already present,
    /// replaces the existing row in place; otherwise assigns a fresh id
    /// and inserts. Returns the stored record with its final id.
    async fn insert_inquiry(&self, record: InquiryRecord) -> anyhow::Result<InquiryRecord>;
    /// The aggregate op (sort by recency, limit) used for inspection.
    async fn list_inquiries(&self, limit: usize) -> anyhow::Result<Vec<InquiryRecord>>;
    async fn delete_inquiries_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}
