use crate::condition::Condition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dense, 1-based position of a [`Rule`] within its registry. Positions
/// form a contiguous `1..=N` sequence; evaluation proceeds in ascending
/// order.
pub type RuleId = u32;

/// A boolean combinator used to reduce a rule's condition results,
/// left-associatively and without operator precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
    Nand,
    Nor,
}

impl Operator {
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            Operator::And => a && b,
            Operator::Or => a || b,
            Operator::Nand => !(a && b),
            Operator::Nor => !(a || b),
        }
    }
}

/// The category of verdict a [`Rule`] produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Accept,
    Reject,
    Other,
}

impl ActionType {
    /// The fixed action tokens allowed for this action type, independent
    /// of the `REJECT`-only numeric-code escape hatch (see
    /// [`is_valid_action`]).
    pub fn allowed_actions(self) -> &'static [&'static str] {
        match self {
            ActionType::Accept => &["OK"],
            ActionType::Reject => &["REJECT", "DEFER", "DEFER_IF_REJECT", "DEFER_IF_PERMIT"],
            ActionType::Other => &["BCC", "DISCARD", "DUNNO", "FILTER", "HOLD", "WARN"],
        }
    }
}

/// True if `action` is a 3-digit SMTP reply code in the `4xx`/`5xx` range.
pub fn is_reject_code(action: &str) -> bool {
    let bytes = action.as_bytes();
    bytes.len() == 3
        && matches!(bytes[0], b'4' | b'5')
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
}

/// True if `action` is an allowed action for `action_type`, either
/// because it's in the fixed list or (for `REJECT`) a numeric reply code.
pub fn is_valid_action(action_type: ActionType, action: &str) -> bool {
    if action_type.allowed_actions().contains(&action) {
        return true;
    }
    action_type == ActionType::Reject && is_reject_code(action)
}

/// True if `custom_text`, once trimmed, is non-empty and the untrimmed
/// text doesn't begin with whitespace.
pub fn is_valid_custom_text(custom_text: &str) -> bool {
    !custom_text.trim().is_empty() && !custom_text.starts_with(char::is_whitespace)
}

/// An ordered predicate-to-action mapping evaluated by the Rule Evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: RuleId,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub operators: Vec<Operator>,
    pub action_type: ActionType,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

/// The outcome of a matching [`Rule`], stripped of its conditions/operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub name: String,
    pub action_type: ActionType,
    pub action: String,
    pub custom_text: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rule must have at least one condition")]
    NoConditions,
    #[error("expected {expected} operators for {conditions} conditions, got {got}")]
    OperatorCountMismatch {
        expected: usize,
        conditions: usize,
        got: usize,
    },
    #[error("action '{action}' is not valid for action_type {action_type:?}")]
    InvalidAction {
        action_type: ActionType,
        action: String,
    },
    #[error("custom_text must be non-empty after trimming and must not start with whitespace")]
    InvalidCustomText,
}

/// Validates a [`Rule`] per the conditions/operators/action/custom_text
/// contracts; never inspects `rule_id` (callers own positional assignment).
pub fn validate_rule(rule: &Rule) -> Result<(), ValidationError> {
    if rule.conditions.is_empty() {
        return Err(ValidationError::NoConditions);
    }
    let expected = rule.conditions.len() - 1;
    if rule.operators.len() != expected {
        return Err(ValidationError::OperatorCountMismatch {
            expected,
            conditions: rule.conditions.len(),
            got: rule.operators.len(),
        });
    }
    if !is_valid_action(rule.action_type, &rule.action) {
        return Err(ValidationError::InvalidAction {
            action_type: rule.action_type,
            action: rule.action.clone(),
        });
    }
    if let Some(text) = &rule.custom_text {
        if !is_valid_custom_text(text) {
            return Err(ValidationError::InvalidCustomText);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::condition::{Condition, MatchKind};

    fn sample_condition() -> Condition {
        Condition {
            key: "sender".to_string(),
            match_kind: MatchKind::Exact,
            value: "a@x".to_string(),
        }
    }

    fn sample_rule() -> Rule {
        Rule {
            rule_id: 1,
            name: "allow a@x".to_string(),
            conditions: vec![sample_condition()],
            operators: vec![],
            action_type: ActionType::Accept,
            action: "OK".to_string(),
            custom_text: None,
        }
    }

    #[test]
    fn accepts_well_formed_rule() {
        assert_eq!(validate_rule(&sample_rule()), Ok(()));
    }

    #[test]
    fn rejects_empty_conditions() {
        let mut rule = sample_rule();
        rule.conditions.clear();
        assert_eq!(validate_rule(&rule), Err(ValidationError::NoConditions));
    }

    #[test]
    fn rejects_operator_count_mismatch() {
        let mut rule = sample_rule();
        rule.conditions.push(sample_condition());
        // two conditions need exactly one operator; we supply none.
        assert_eq!(
            validate_rule(&rule),
            Err(ValidationError::OperatorCountMismatch {
                expected: 1,
                conditions: 2,
                got: 0,
            })
        );
    }

    #[test]
    fn reject_action_type_accepts_3_digit_code() {
        let mut rule = sample_rule();
        rule.action_type = ActionType::Reject;
        rule.action = "550".to_string();
        assert_eq!(validate_rule(&rule), Ok(()));
    }

    #[test]
    fn reject_action_type_rejects_out_of_range_code() {
        assert!(!is_valid_action(ActionType::Reject, "399"));
        assert!(!is_valid_action(ActionType::Reject, "600"));
        assert!(!is_valid_action(ActionType::Reject, "abc"));
    }

    #[test]
    fn accept_action_type_rejects_anything_but_ok() {
        assert!(is_valid_action(ActionType::Accept, "OK"));
        assert!(!is_valid_action(ActionType::Accept, "REJECT"));
    }

    #[test]
    fn custom_text_rejects_leading_whitespace() {
        let mut rule = sample_rule();
        rule.custom_text = Some(" leading space".to_string());
        assert_eq!(
            validate_rule(&rule),
            Err(ValidationError::InvalidCustomText)
        );
    }

    #[test]
    fn custom_text_rejects_blank_after_trim() {
        let mut rule = sample_rule();
        rule.custom_text = Some("   ".to_string());
        assert_eq!(
            validate_rule(&rule),
            Err(ValidationError::InvalidCustomText)
        );
    }

    #[test]
    fn custom_text_accepts_normal_text() {
        let mut rule = sample_rule();
        rule.custom_text = Some("Not allowed".to_string());
        assert_eq!(validate_rule(&rule), Ok(()));
    }
}
