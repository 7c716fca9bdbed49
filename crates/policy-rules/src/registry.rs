use crate::evaluator::{evaluate, CompiledRule};
use arc_swap::ArcSwap;
use policy_store::Store;
use policy_types::{validate_rule, AttributeMap, Rule, RuleId, RuleMatch, ValidationError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("rule {0} not found")]
    NotFound(RuleId),
    #[error("position {position} out of range for {count} rules")]
    PositionOutOfRange { position: RuleId, count: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(String),
}

/// Owns the ordered rule set behind an immutable snapshot pointer
/// (`ArcSwap<Vec<CompiledRule>>`): every mutation builds a whole new `Vec` from the
/// current snapshot, persists it to the `Store` (so the density
/// invariant is transactional for observers of the store, not just of
/// `list()`), and only then swaps the pointer atomically; `list()` and
/// [`RuleRegistry::evaluate`] only ever observe one fully-formed, dense
/// snapshot, never a half-updated vector.
pub struct RuleRegistry {
    snapshot: ArcSwap<Vec<CompiledRule>>,
    store: Arc<dyn Store>,
}

impl RuleRegistry {
    /// Builds a registry over `rules` backed by `store`, without touching
    /// the store (the caller already knows the rules came from it, or is
    /// seeding a fresh one). Use [`RuleRegistry::load`] at startup instead
    /// to read the persisted set and repair density.
    pub fn new(mut rules: Vec<Rule>, store: Arc<dyn Store>) -> Self {
        rules.sort_by_key(|r| r.rule_id);
        Self {
            snapshot: ArcSwap::from_pointee(
                rules.into_iter().map(CompiledRule::new).collect(),
            ),
            store,
        }
    }

    /// Startup path: loads the persisted rule set from `store`, repairs
    /// density with [`RuleRegistry::reseat`] (a no-op write if already
    /// dense), and returns a registry ready to serve `evaluate`.
    pub async fn load(store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let rules = store.list_rules().await?;
        let registry = Self::new(rules, store);
        registry.reseat().await.map_err(|err| anyhow::anyhow!(err))?;
        Ok(registry)
    }

    /// Rules in ascending `rule_id`.
    pub fn list(&self) -> Vec<Rule> {
        self.snapshot
            .load()
            .iter()
            .map(|c| c.rule().clone())
            .collect()
    }

    /// Evaluates `attrs` against the current snapshot. CPU-only, never
    /// suspends, and is a pure function of `(snapshot, attrs)`; repeated
    /// calls against an unchanged snapshot yield identical results.
    pub fn evaluate(&self, attrs: &AttributeMap) -> Option<RuleMatch> {
        let snapshot = self.snapshot.load();
        evaluate(snapshot.as_slice(), attrs)
    }

    /// Validates `rule`, assigns `rule_id = max + 1`, persists the whole
    /// dense set, and publishes a new snapshot with it appended.
    /// `rule.rule_id` is ignored on input.
    pub async fn create(&self, mut rule: Rule) -> Result<Rule, RegistryError> {
        validate_rule(&rule)?;
        let mut rules = self.list();
        let next_id = rules.iter().map(|r| r.rule_id).max().unwrap_or(0) + 1;
        rule.rule_id = next_id;
        rules.push(rule.clone());
        self.publish(rules).await?;
        Ok(rule)
    }

    /// Validates `rule` (the full merged record, `rule_id` unchanged) and
    /// replaces the existing entry in place.
    pub async fn update(&self, rule_id: RuleId, mut rule: Rule) -> Result<Rule, RegistryError> {
        rule.rule_id = rule_id;
        validate_rule(&rule)?;
        let mut rules = self.list();
        let slot = rules
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
            .ok_or(RegistryError::NotFound(rule_id))?;
        *slot = rule.clone();
        self.publish(rules).await?;
        Ok(rule)
    }

    /// Removes `rule_id`, then decrements the `rule_id` of every rule
    /// that came after it, to keep the sequence dense.
    pub async fn delete(&self, rule_id: RuleId) -> Result<(), RegistryError> {
        let mut rules = self.list();
        let position = rules
            .iter()
            .position(|r| r.rule_id == rule_id)
            .ok_or(RegistryError::NotFound(rule_id))?;
        rules.remove(position);
        for r in rules.iter_mut().filter(|r| r.rule_id > rule_id) {
            r.rule_id -= 1;
        }
        self.publish(rules).await
    }

    /// Moves `rule_id` to `new_position` (1-based), shifting the rules
    /// between the old and new positions by one to make room.
    pub async fn move_rule(&self, rule_id: RuleId, new_position: RuleId) -> Result<(), RegistryError> {
        let mut rules = self.list();
        let count = rules.len();
        if new_position < 1 || new_position as usize > count {
            return Err(RegistryError::PositionOutOfRange {
                position: new_position,
                count,
            });
        }
        let current = rules
            .iter()
            .find(|r| r.rule_id == rule_id)
            .ok_or(RegistryError::NotFound(rule_id))?
            .rule_id;

        if new_position == current {
            return Ok(());
        }

        for r in rules.iter_mut() {
            if r.rule_id == rule_id {
                continue;
            }
            if new_position < current && r.rule_id >= new_position && r.rule_id < current {
                r.rule_id += 1;
            } else if new_position > current && r.rule_id > current && r.rule_id <= new_position {
                r.rule_id -= 1;
            }
        }
        for r in rules.iter_mut() {
            if r.rule_id == rule_id {
                r.rule_id = new_position;
            }
        }
        self.publish(rules).await
    }

    /// Startup repair: renumbers all rules, sorted by current `rule_id`
    /// ascending, to a dense `1..=N`. Idempotent on an already-dense set.
    pub async fn reseat(&self) -> Result<(), RegistryError> {
        let mut rules = self.list();
        rules.sort_by_key(|r| r.rule_id);
        for (index, rule) in rules.iter_mut().enumerate() {
            rule.rule_id = index as RuleId + 1;
        }
        self.publish(rules).await
    }

    async fn publish(&self, mut rules: Vec<Rule>) -> Result<(), RegistryError> {
        rules.sort_by_key(|r| r.rule_id);
        self.store
            .replace_all_rules(rules.clone())
            .await
            .map_err(|err| RegistryError::Store(err.to_string()))?;
        self.snapshot.store(Arc::new(
            rules.into_iter().map(CompiledRule::new).collect(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use policy_store::MemoryStore;
    use policy_types::{ActionType, Condition, MatchKind};

    fn rule(id: RuleId, key: &str, value: &str) -> Rule {
        Rule {
            rule_id: id,
            name: format!("rule-{id}"),
            conditions: vec![Condition {
                key: key.to_string(),
                match_kind: MatchKind::Exact,
                value: value.to_string(),
            }],
            operators: vec![],
            action_type: ActionType::Accept,
            action: "OK".to_string(),
            custom_text: None,
        }
    }

    fn ids(registry: &RuleRegistry) -> Vec<RuleId> {
        registry.list().iter().map(|r| r.rule_id).collect()
    }

    fn registry() -> RuleRegistry {
        RuleRegistry::new(Vec::new(), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_assigns_dense_ids() {
        let registry = registry();
        let r1 = registry.create(rule(0, "sender", "a")).await.unwrap();
        let r2 = registry.create(rule(0, "sender", "b")).await.unwrap();
        assert_eq!(r1.rule_id, 1);
        assert_eq!(r2.rule_id, 2);
        assert_eq!(ids(&registry), vec![1, 2]);
    }

    #[tokio::test]
    async fn delete_keeps_density() {
        let registry = registry();
        for v in ["a", "b", "c"] {
            registry.create(rule(0, "sender", v)).await.unwrap();
        }
        registry.delete(2).await.unwrap();
        assert_eq!(ids(&registry), vec![1, 2]);
        // The rule that used to be id 3 ("c") is now id 2.
        assert_eq!(registry.list()[1].conditions[0].value, "c");
    }

    #[tokio::test]
    async fn delete_unknown_rule_errors() {
        let registry = registry();
        assert_eq!(registry.delete(1).await, Err(RegistryError::NotFound(1)));
    }

    #[tokio::test]
    async fn move_preserves_density_and_order() {
        let registry = registry();
        for v in ["a", "b", "c", "d"] {
            registry.create(rule(0, "sender", v)).await.unwrap();
        }
        registry.move_rule(4, 2).await.unwrap();
        assert_eq!(ids(&registry), vec![1, 2, 3, 4]);
        let values: Vec<String> = registry
            .list()
            .iter()
            .map(|r| r.conditions[0].value.clone())
            .collect();
        assert_eq!(values, vec!["a", "d", "b", "c"]);
    }

    #[tokio::test]
    async fn move_then_move_back_restores_listing() {
        let registry = registry();
        for v in ["a", "b", "c", "d"] {
            registry.create(rule(0, "sender", v)).await.unwrap();
        }
        let before = registry.list();
        registry.move_rule(4, 2).await.unwrap();
        registry.move_rule(2, 4).await.unwrap();
        assert_eq!(registry.list(), before);
    }

    #[tokio::test]
    async fn move_to_same_position_is_noop() {
        let registry = registry();
        for v in ["a", "b"] {
            registry.create(rule(0, "sender", v)).await.unwrap();
        }
        let before = registry.list();
        registry.move_rule(1, 1).await.unwrap();
        assert_eq!(registry.list(), before);
    }

    #[tokio::test]
    async fn move_out_of_range_errors() {
        let registry = registry();
        registry.create(rule(0, "sender", "a")).await.unwrap();
        assert_eq!(
            registry.move_rule(1, 5).await,
            Err(RegistryError::PositionOutOfRange {
                position: 5,
                count: 1
            })
        );
    }

    #[tokio::test]
    async fn reseat_renumbers_in_current_order() {
        let registry = registry();
        for v in ["a", "b", "c"] {
            registry.create(rule(0, "sender", v)).await.unwrap();
        }
        registry.move_rule(3, 1).await.unwrap();
        registry.reseat().await.unwrap();
        assert_eq!(ids(&registry), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn create_rejects_invalid_rule() {
        let registry = registry();
        let mut bad = rule(0, "sender", "a");
        bad.conditions.clear();
        assert_eq!(
            registry.create(bad).await,
            Err(RegistryError::Invalid(ValidationError::NoConditions))
        );
    }

    #[tokio::test]
    async fn evaluate_reflects_current_snapshot() {
        let registry = registry();
        registry.create(rule(0, "sender", "a@x")).await.unwrap();
        let attrs: AttributeMap = [("sender".to_string(), "a@x".to_string())].into();
        assert!(registry.evaluate(&attrs).is_some());
        registry.delete(1).await.unwrap();
        assert!(registry.evaluate(&attrs).is_none());
    }

    #[tokio::test]
    async fn mutations_persist_to_the_store() {
        let store = Arc::new(MemoryStore::new());
        let registry = RuleRegistry::new(Vec::new(), store.clone());
        registry.create(rule(0, "sender", "a")).await.unwrap();
        registry.create(rule(0, "sender", "b")).await.unwrap();
        registry.delete(1).await.unwrap();

        let persisted = store.list_rules().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].conditions[0].value, "b");
    }

    #[tokio::test]
    async fn load_repairs_a_non_dense_persisted_set() {
        let store = Arc::new(MemoryStore::new());
        // Simulate a store whose previous process crashed mid-renumbering.
        store.insert_rule(rule(1, "sender", "a")).await.unwrap();
        store.insert_rule(rule(5, "sender", "b")).await.unwrap();

        let registry = RuleRegistry::load(store.clone()).await.unwrap();
        assert_eq!(ids(&registry), vec![1, 2]);
        let persisted = store.list_rules().await.unwrap();
        assert_eq!(persisted.iter().map(|r| r.rule_id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
