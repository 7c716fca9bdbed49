//! Shared domain types for the policy decision service: attributes,
//! conditions, rules, rate limiters, counters and inquiry records.
//!
//! This crate is deliberately free of I/O and concurrency concerns; it
//! exists so that `policy-codec`, `policy-rules`, `policy-throttle` and
//! `policy-store` can agree on one definition of the data model.

mod attr;
mod condition;
mod inquiry;
mod limiter;
mod rule;

pub use attr::{is_valid_inquiry, AttributeMap, RECOGNIZED_KEYS, REQUEST_KEY, REQUEST_VALUE};
pub use condition::{Condition, MatchKind};
pub use inquiry::InquiryRecord;
pub use limiter::{Counter, LimiterId, RateLimiterConfig, DEFAULT_LIMIT_TEXT};
pub use rule::{
    is_reject_code, is_valid_action, is_valid_custom_text, validate_rule, ActionType, Operator,
    Rule, RuleId, RuleMatch, ValidationError,
};
