use once_cell::sync::OnceCell;
use policy_types::{AttributeMap, Condition, MatchKind};
use regex::Regex;

/// Lazily-compiled regex for one [`Condition`]. Holds `None` once a compile
/// attempt has failed, so that failure is remembered rather than retried
/// (and logged) on every inquiry.
pub type RegexCache = OnceCell<Option<Regex>>;

/// Translates a wildcard pattern (`*` = zero or more characters, all other
/// characters literal) into an anchored regular expression string.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for segment in pattern.split('*') {
        out.push_str(&regex::escape(segment));
        out.push_str(".*");
    }
    // We appended one trailing ".*" too many; the split-by-'*' loop adds
    // one ".*" per segment rather than per separator. Trim it back off
    // and close the anchor instead.
    out.truncate(out.len() - 2);
    out.push('$');
    out
}

/// Evaluates a single [`Condition`] against `attrs`, using `cache` to
/// memoize regex compilation for `match = regex` conditions across
/// repeated calls against the same rule snapshot.
///
/// A condition whose `key` is absent from `attrs` is always false. A
/// regex that fails to compile is also always false; the containing
/// rule is never skipped because of it.
pub fn matches(condition: &Condition, attrs: &AttributeMap, cache: &RegexCache) -> bool {
    let Some(value) = attrs.get(&condition.key) else {
        return false;
    };
    match condition.match_kind {
        MatchKind::Exact => value == &condition.value,
        MatchKind::Regex => {
            let compiled = cache.get_or_init(|| match Regex::new(&condition.value) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(
                        pattern = %condition.value,
                        error = %err,
                        "regex condition failed to compile; treating as non-match"
                    );
                    None
                }
            });
            // `Regex` matches anywhere by default; `find` at position 0
            // gives prefix-anchored semantics instead (matches at the
            // start, need not consume the whole value).
            match compiled {
                Some(re) => re.find(value).is_some_and(|m| m.start() == 0),
                None => false,
            }
        }
        MatchKind::Wildcard => {
            let compiled = cache.get_or_init(|| {
                Regex::new(&wildcard_to_regex(&condition.value)).ok()
            });
            matches!(compiled, Some(re) if re.is_match(value))
        }
    }
}
