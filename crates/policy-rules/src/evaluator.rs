use crate::matching::{matches, RegexCache};
use policy_types::{AttributeMap, Operator, Rule, RuleMatch};

/// A [`Rule`] paired with a lazily-populated regex cache, one slot per
/// condition. Built once per registry snapshot; cheap to evaluate
/// repeatedly against many inquiries, expensive (one regex compile) only
/// on the first inquiry that exercises a given regex condition.
pub struct CompiledRule {
    rule: Rule,
    condition_cache: Vec<RegexCache>,
}

impl CompiledRule {
    pub fn new(rule: Rule) -> Self {
        let condition_cache = rule.conditions.iter().map(|_| RegexCache::new()).collect();
        Self {
            rule,
            condition_cache,
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Evaluates this rule's conditions against `attrs`, reducing them
    /// left-associatively through `operators` with no precedence.
    fn is_match(&self, attrs: &AttributeMap) -> bool {
        let mut conditions = self.rule.conditions.iter().zip(self.condition_cache.iter());
        let Some((first_cond, first_cache)) = conditions.next() else {
            // validate_rule forbids zero conditions; an empty rule never matches.
            return false;
        };
        let mut acc = matches(first_cond, attrs, first_cache);
        for (operator, (condition, cache)) in self.rule.operators.iter().zip(conditions) {
            let next = matches(condition, attrs, cache);
            acc = operator.apply(acc, next);
        }
        acc
    }
}

/// Evaluates one inquiry against an ordered slice of [`CompiledRule`]s,
/// already sorted ascending by `rule_id` (the order the registry's
/// snapshot guarantees), returning the first rule that matches.
pub fn evaluate(rules: &[CompiledRule], attrs: &AttributeMap) -> Option<RuleMatch> {
    rules.iter().find(|r| r.is_match(attrs)).map(|r| RuleMatch {
        rule_id: r.rule.rule_id,
        name: r.rule.name.clone(),
        action_type: r.rule.action_type,
        action: r.rule.action.clone(),
        custom_text: r.rule.custom_text.clone(),
    })
}

/// Left-associative reduction of a sequence of booleans through a
/// sequence of operators, used directly by property tests; production
/// code goes through [`CompiledRule::is_match`] instead since it also
/// needs to lazily compute each boolean from a [`policy_types::Condition`].
pub fn reduce_left_associative(values: &[bool], operators: &[Operator]) -> Option<bool> {
    let mut iter = values.iter().copied();
    let mut acc = iter.next()?;
    for (operator, value) in operators.iter().zip(iter) {
        acc = operator.apply(acc, value);
    }
    Some(acc)
}
