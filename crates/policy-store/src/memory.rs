use crate::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use policy_types::{Counter, InquiryRecord, LimiterId, RateLimiterConfig, Rule, RuleId};

/// A dependency-free, in-process [`Store`] implementation: a
/// `parking_lot::RwLock<Vec<…>>` per collection, sufficient to run the
/// daemon standalone and to exercise it in integration tests. A real
/// deployment swaps this for a persistent Store backed by a database.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<Vec<Rule>>,
    rate_limiters: RwLock<Vec<RateLimiterConfig>>,
    counters: RwLock<Vec<Counter>>,
    inquiries: RwLock<Vec<InquiryRecord>>,
    next_inquiry_id: std::sync::atomic::AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(rules: Vec<Rule>, rate_limiters: Vec<RateLimiterConfig>) -> Self {
        Self {
            rules: RwLock::new(rules),
            rate_limiters: RwLock::new(rate_limiters),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_rule(&self, rule_id: RuleId) -> anyhow::Result<Option<Rule>> {
        Ok(self.rules.read().iter().find(|r| r.rule_id == rule_id).cloned())
    }

    async fn list_rules(&self) -> anyhow::Result<Vec<Rule>> {
        let mut rules = self.rules.read().clone();
        rules.sort_by_key(|r| r.rule_id);
        Ok(rules)
    }

    async fn insert_rule(&self, rule: Rule) -> anyhow::Result<()> {
        self.rules.write().push(rule);
        Ok(())
    }

    async fn replace_rule(&self, rule: Rule) -> anyhow::Result<()> {
        let mut rules = self.rules.write();
        match rules.iter_mut().find(|r| r.rule_id == rule.rule_id) {
            Some(slot) => *slot = rule,
            None => rules.push(rule),
        }
        Ok(())
    }

    async fn replace_all_rules(&self, rules: Vec<Rule>) -> anyhow::Result<()> {
        *self.rules.write() = rules;
        Ok(())
    }

    async fn delete_rule(&self, rule_id: RuleId) -> anyhow::Result<()> {
        self.rules.write().retain(|r| r.rule_id != rule_id);
        Ok(())
    }

    async fn list_rate_limiters(&self) -> anyhow::Result<Vec<RateLimiterConfig>> {
        Ok(self.rate_limiters.read().clone())
    }

    async fn insert_rate_limiter(&self, config: RateLimiterConfig) -> anyhow::Result<()> {
        self.rate_limiters.write().push(config);
        Ok(())
    }

    async fn replace_rate_limiter(&self, config: RateLimiterConfig) -> anyhow::Result<()> {
        let mut limiters = self.rate_limiters.write();
        match limiters.iter_mut().find(|c| c.id == config.id) {
            Some(slot) => *slot = config,
            None => limiters.push(config),
        }
        Ok(())
    }

    async fn delete_rate_limiter(&self, id: &LimiterId) -> anyhow::Result<()> {
        self.rate_limiters.write().retain(|c| &c.id != id);
        Ok(())
    }

    async fn upsert_counter(&self, counter: Counter) -> anyhow::Result<()> {
        let mut counters = self.counters.write();
        match counters
            .iter_mut()
            .find(|c| c.limiter_id == counter.limiter_id && c.value == counter.value)
        {
            Some(slot) => *slot = counter,
            None => counters.push(counter),
        }
        Ok(())
    }

    async fn list_counters(&self) -> anyhow::Result<Vec<Counter>> {
        Ok(self.counters.read().clone())
    }

    async fn delete_counters_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut counters = self.counters.write();
        let before = counters.len();
        counters.retain(|c| c.window_start >= cutoff);
        Ok((before - counters.len()) as u64)
    }

    async fn insert_inquiry(&self, mut record: InquiryRecord) -> anyhow::Result<InquiryRecord> {
        let mut inquiries = self.inquiries.write();
        if let Some(id) = &record.id {
            if let Some(slot) = inquiries.iter_mut().find(|r| r.id.as_deref() == Some(id)) {
                *slot = record.clone();
                return Ok(record);
            }
        }
        let id = self
            .next_inquiry_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .to_string();
        record.id = Some(id);
        inquiries.push(record.clone());
        Ok(record)
    }

    async fn list_inquiries(&self, limit: usize) -> anyhow::Result<Vec<InquiryRecord>> {
        let mut inquiries = self.inquiries.read().clone();
        inquiries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        inquiries.truncate(limit);
        Ok(inquiries)
    }

    async fn delete_inquiries_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut inquiries = self.inquiries.write();
        let before = inquiries.len();
        inquiries.retain(|r| r.timestamp >= cutoff);
        Ok((before - inquiries.len()) as u64)
    }
}
