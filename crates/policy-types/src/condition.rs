use serde::{Deserialize, Serialize};

/// How a [`Condition`] compares an attribute's value against its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Byte-equal comparison.
    Exact,
    /// Prefix-anchored regular expression match (matches at position 0,
    /// need not consume the whole value).
    Regex,
    /// Whole-value match where `*` stands for "zero or more characters"
    /// and every other character is literal.
    Wildcard,
}

/// A single predicate over one attribute: `{key, match, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
    pub value: String,
}
