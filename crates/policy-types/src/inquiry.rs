use crate::attr::AttributeMap;
use crate::rule::RuleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted copy of one inquiry: its attributes, the rule that matched
/// (if any), and the final verdict text. Identified by a store-assigned
/// opaque id once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attributes: AttributeMap,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<RuleId>,
    pub verdict: String,
}

#[cfg(test)]
mod test {
    use super::*;

    // A persistent Store backend (out of scope here) round-trips this
    // type through JSON; the `id` field in particular must survive
    // omission on insert and presence on replace.
    #[test]
    fn round_trips_through_json_with_and_without_id() {
        let record = InquiryRecord {
            id: None,
            attributes: [("sender".to_string(), "a@x".to_string())].into(),
            timestamp: Utc::now(),
            matched_rule: Some(3),
            verdict: "OK".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"id\""));
        let back: InquiryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, None);
        assert_eq!(back.matched_rule, Some(3));

        let mut stored = record;
        stored.id = Some("42".to_string());
        let json = serde_json::to_string(&stored).unwrap();
        let back: InquiryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, Some("42".to_string()));
    }
}
