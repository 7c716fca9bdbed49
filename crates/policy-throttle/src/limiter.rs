use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use policy_rules::{matches, RegexCache};
use policy_store::Store;
use policy_types::{AttributeMap, Condition, Counter, LimiterId, RateLimiterConfig, DEFAULT_LIMIT_TEXT};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("rate limiter {0} not found")]
    NotFound(LimiterId),
    #[error("store error: {0}")]
    Store(String),
}

/// The outcome of [`RateLimiterSet::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Allowed,
    Blocked { custom_text: String },
}

struct CompiledLimiter {
    config: RateLimiterConfig,
    cache: RegexCache,
}

impl CompiledLimiter {
    fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            cache: RegexCache::new(),
        }
    }

    fn condition_matches(&self, observed: &str) -> bool {
        // The limiter's {key, condition, value} is the same {key, match,
        // value} predicate a rule Condition carries; we build one and
        // reuse the shared matching logic rather than re-deriving it.
        let cond = Condition {
            key: self.config.key.clone(),
            match_kind: self.config.condition,
            value: self.config.value.clone(),
        };
        let mut attrs = AttributeMap::new();
        attrs.insert(self.config.key.clone(), observed.to_string());
        matches(&cond, &attrs, &self.cache)
    }
}

/// Maintains the ordered list of [`RateLimiterConfig`]s (behind an
/// `ArcSwap` snapshot, matching the Rule Registry's publication model)
/// and the `DashMap` of live [`Counter`]s, keyed by `(limiter_id,
/// observed_value)` for point-mutation without a process-wide lock.
pub struct RateLimiterSet {
    snapshot: ArcSwap<Vec<CompiledLimiter>>,
    counters: DashMap<(LimiterId, String), Counter>,
    store: Arc<dyn Store>,
}

impl RateLimiterSet {
    /// Builds a limiter set over `limiters` backed by `store`, without
    /// touching the store. Use [`RateLimiterSet::load`] at startup to
    /// read the persisted set instead.
    pub fn new(limiters: Vec<RateLimiterConfig>, store: Arc<dyn Store>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(
                limiters.into_iter().map(CompiledLimiter::new).collect(),
            ),
            counters: DashMap::new(),
            store,
        }
    }

    /// Startup path: loads the persisted limiter list from `store`.
    pub async fn load(store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let limiters = store.list_rate_limiters().await?;
        Ok(Self::new(limiters, store))
    }

    pub fn list(&self) -> Vec<RateLimiterConfig> {
        self.snapshot
            .load()
            .iter()
            .map(|c| c.config.clone())
            .collect()
    }

    pub async fn create(&self, config: RateLimiterConfig) -> Result<(), ThrottleError> {
        self.store
            .insert_rate_limiter(config.clone())
            .await
            .map_err(|err| ThrottleError::Store(err.to_string()))?;
        let mut configs = self.list();
        configs.push(config);
        self.publish(configs);
        Ok(())
    }

    pub async fn update(&self, id: &LimiterId, config: RateLimiterConfig) -> Result<(), ThrottleError> {
        let mut configs = self.list();
        let slot = configs
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ThrottleError::NotFound(id.clone()))?;
        *slot = config.clone();
        self.store
            .replace_rate_limiter(config)
            .await
            .map_err(|err| ThrottleError::Store(err.to_string()))?;
        self.publish(configs);
        Ok(())
    }

    /// Removes the limiter. Associated counters are left in place; they
    /// are reclaimed by the next sweep.
    pub async fn delete(&self, id: &LimiterId) -> Result<(), ThrottleError> {
        let mut configs = self.list();
        let before = configs.len();
        configs.retain(|c| &c.id != id);
        if configs.len() == before {
            return Err(ThrottleError::NotFound(id.clone()));
        }
        self.store
            .delete_rate_limiter(id)
            .await
            .map_err(|err| ThrottleError::Store(err.to_string()))?;
        self.publish(configs);
        Ok(())
    }

    fn publish(&self, configs: Vec<RateLimiterConfig>) {
        self.snapshot.store(Arc::new(
            configs.into_iter().map(CompiledLimiter::new).collect(),
        ));
    }

    /// Checks `attrs` against every configured limiter, in load order.
    /// The first limiter whose counter is already at or over its limit
    /// produces `Blocked`; every limiter that matches (blocking or not)
    /// still has its counter incremented/created for this inquiry: the
    /// check does not short-circuit on the first match, only on the
    /// first block it reports.
    pub fn check(&self, attrs: &AttributeMap, now: DateTime<Utc>) -> CheckResult {
        let snapshot = self.snapshot.load();
        let mut result = CheckResult::Allowed;
        for limiter in snapshot.iter() {
            let Some(observed) = attrs.get(&limiter.config.key) else {
                continue;
            };
            if !limiter.condition_matches(observed) {
                continue;
            }

            let key = (limiter.config.id.clone(), observed.clone());
            let window_start = now - Duration::minutes(limiter.config.duration as i64);

            let mut blocked = false;
            self.counters
                .entry(key)
                .and_modify(|counter| {
                    if counter.window_start < window_start {
                        // window has elapsed; start a fresh one.
                        counter.window_start = now;
                        counter.count = 1;
                    } else if counter.count >= limiter.config.limit {
                        blocked = true;
                    } else {
                        counter.count += 1;
                    }
                })
                .or_insert_with(|| Counter {
                    limiter_id: limiter.config.id.clone(),
                    key: limiter.config.key.clone(),
                    value: observed.clone(),
                    count: 1,
                    window_start: now,
                });

            if blocked && matches!(result, CheckResult::Allowed) {
                let text = limiter
                    .config
                    .custom_text
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LIMIT_TEXT.to_string());
                result = CheckResult::Blocked { custom_text: text };
            }
        }
        result
    }

    /// Returns the `k` (clamped to `[1, 50]`) counters with the highest
    /// `count`, for human inspection.
    pub fn top(&self, k: usize) -> Vec<Counter> {
        let k = k.clamp(1, 50);
        let mut counters: Vec<Counter> = self.counters.iter().map(|e| e.value().clone()).collect();
        counters.sort_by(|a, b| b.count.cmp(&a.count));
        counters.truncate(k);
        counters
    }

    /// Deletes counters whose window has fully elapsed relative to their
    /// limiter's `duration`. Counters whose limiter has been deleted are
    /// treated as immediately expired.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let snapshot = self.snapshot.load();
        let before = self.counters.len();
        self.counters.retain(|(limiter_id, _value), counter| {
            match snapshot.iter().find(|c| &c.config.id == limiter_id) {
                Some(limiter) => {
                    counter.window_start >= now - Duration::minutes(limiter.config.duration as i64)
                }
                None => false,
            }
        });
        before - self.counters.len()
    }
}
