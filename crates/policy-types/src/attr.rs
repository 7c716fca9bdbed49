use std::collections::HashMap;

/// Parsed key/value attributes describing one in-progress SMTP session.
/// Keys are unique; insertion order carries no meaning. Keys outside
/// [`RECOGNIZED_KEYS`] are kept in the map but are never matched by a
/// [`crate::Condition`].
pub type AttributeMap = HashMap<String, String>;

pub const REQUEST_KEY: &str = "request";
pub const REQUEST_VALUE: &str = "smtpd_access_policy";

/// The closed set of attribute names the postfix `smtpd_access_policy`
/// protocol may send.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "request",
    "client_ip",
    "helo_name",
    "sender",
    "recipient",
    "sasl_username",
    "client_name",
    "client_address",
    "client_port",
    "server_address",
    "server_port",
    "encryption_protocol",
    "encryption_cipher",
    "encryption_keysize",
    "ccert_subject",
    "ccert_issuer",
    "ccert_fingerprint",
    "ccert_pubkey_fingerprint",
    "protocol_state",
    "protocol_name",
    "queue_id",
    "instance",
    "size",
    "etrn_domain",
    "stress",
    "sasl_method",
    "sasl_sender",
    "policy_context",
    "recipient_count",
    "reverse_client_name",
    "mail_version",
    "compatibility_level",
];

/// Returns true iff `attrs` is a validly framed `smtpd_access_policy` inquiry.
pub fn is_valid_inquiry(attrs: &AttributeMap) -> bool {
    attrs.get(REQUEST_KEY).map(String::as_str) == Some(REQUEST_VALUE)
}
