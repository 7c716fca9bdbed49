use policy_types::{is_valid_inquiry, AttributeMap};

/// The byte sequence that terminates one framed inquiry.
pub const FRAME_TERMINATOR: &[u8] = b"\n\n";

/// The fixed response emitted for a syntactically-framed inquiry that
/// fails the `request=smtpd_access_policy` validity gate.
pub const INVALID_REQUEST_RESPONSE: &str = "REJECT Invalid request";

/// Splits a framed inquiry (everything up to, but not including, the
/// blank line that terminates it) into an [`AttributeMap`].
///
/// Each non-blank line has the form `key=value`; only the first `=`
/// separates key from value, and both sides are trimmed of surrounding
/// whitespace. Blank lines within the block (stray `\n\n` sequences
/// aside) are skipped rather than treated as errors, matching the
/// source protocol's tolerance for trailing newlines.
pub fn parse_attributes(block: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    for line in block.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }
    attrs
}

/// Returns `true` iff `attrs` is a valid `smtpd_access_policy` inquiry,
/// i.e. the codec's validity gate (see [`policy_types::is_valid_inquiry`]).
pub fn is_valid(attrs: &AttributeMap) -> bool {
    is_valid_inquiry(attrs)
}

/// Formats a final verdict line: `"<verdict>\n\n"`, where a non-empty,
/// trimmed `custom_text` is appended after a single space. Trailing
/// whitespace between verdict and suffix collapses to exactly one space;
/// an empty or all-whitespace suffix produces no trailing space at all.
pub fn format_response(verdict: &str, custom_text: Option<&str>) -> String {
    let suffix = custom_text.map(str::trim).filter(|s| !s.is_empty());
    match suffix {
        Some(text) => format!("{verdict} {text}\n\n"),
        None => format!("{verdict}\n\n"),
    }
}

/// The canned response for an inquiry that failed the validity gate.
pub fn invalid_request_response() -> String {
    format!("{INVALID_REQUEST_RESPONSE}\n\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_block() {
        let attrs = parse_attributes("request=smtpd_access_policy\nsender=a@x\n");
        assert_eq!(attrs.get("request").map(String::as_str), Some("smtpd_access_policy"));
        assert_eq!(attrs.get("sender").map(String::as_str), Some("a@x"));
    }

    #[test]
    fn trims_key_and_value_whitespace() {
        let attrs = parse_attributes(" request = smtpd_access_policy \n");
        assert_eq!(
            attrs.get("request").map(String::as_str),
            Some("smtpd_access_policy")
        );
    }

    #[test]
    fn only_first_equals_separates() {
        let attrs = parse_attributes("sender=a=b@x\n");
        assert_eq!(attrs.get("sender").map(String::as_str), Some("a=b@x"));
    }

    #[test]
    fn lines_without_equals_are_skipped() {
        let attrs = parse_attributes("request=smtpd_access_policy\nnoise\n");
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn valid_request_requires_exact_value() {
        let attrs = parse_attributes("request=smtpd_access_policy\n");
        assert!(is_valid(&attrs));

        let attrs = parse_attributes("request=something_else\n");
        assert!(!is_valid(&attrs));

        let attrs = parse_attributes("sender=a@x\n");
        assert!(!is_valid(&attrs));
    }

    #[test]
    fn formats_verdict_without_text() {
        assert_eq!(format_response("OK", None), "OK\n\n");
        assert_eq!(format_response("DUNNO", Some("")), "DUNNO\n\n");
        assert_eq!(format_response("DUNNO", Some("   ")), "DUNNO\n\n");
    }

    #[test]
    fn formats_verdict_with_text() {
        assert_eq!(
            format_response("550", Some("Not allowed")),
            "550 Not allowed\n\n"
        );
    }

    #[test]
    fn invalid_request_has_fixed_shape() {
        assert_eq!(invalid_request_response(), "REJECT Invalid request\n\n");
    }
}
