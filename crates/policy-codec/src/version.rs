use policy_types::AttributeMap;

/// Classifies the Postfix version an inquiry originated from, purely
/// from which attributes are present. Reported to the Observer; never
/// affects the verdict.
///
/// Checks run top-down, first hit wins, matching the order the attribute
/// was introduced to the `smtpd_access_policy` protocol upstream.
pub fn probe_version(attrs: &AttributeMap) -> &'static str {
    const CHECKS: &[(&str, &str)] = &[
        ("mail_version", "3.7 or later"),
        ("server_address", "3.2"),
        ("policy_context", "3.1"),
        ("client_port", "3.0"),
        ("ccert_pubkey_fingerprint", "2.9"),
        ("stress", "2.5"),
        ("encryption_protocol", "2.3"),
        ("sasl_method", "2.2"),
    ];
    for (key, version) in CHECKS {
        if attrs.contains_key(*key) {
            return version;
        }
    }
    "2.1 or earlier"
}

#[cfg(test)]
mod test {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_earliest() {
        assert_eq!(probe_version(&attrs(&[])), "2.1 or earlier");
    }

    #[test]
    fn first_hit_wins() {
        // mail_version present alongside an earlier-version marker still
        // reports the later version, since mail_version is checked first.
        let a = attrs(&[("mail_version", "3.9"), ("sasl_method", "plain")]);
        assert_eq!(probe_version(&a), "3.7 or later");
    }

    #[test]
    fn each_marker_maps_to_its_version() {
        assert_eq!(probe_version(&attrs(&[("server_address", "x")])), "3.2");
        assert_eq!(probe_version(&attrs(&[("policy_context", "x")])), "3.1");
        assert_eq!(probe_version(&attrs(&[("client_port", "x")])), "3.0");
        assert_eq!(
            probe_version(&attrs(&[("ccert_pubkey_fingerprint", "x")])),
            "2.9"
        );
        assert_eq!(probe_version(&attrs(&[("stress", "x")])), "2.5");
        assert_eq!(
            probe_version(&attrs(&[("encryption_protocol", "x")])),
            "2.3"
        );
        assert_eq!(probe_version(&attrs(&[("sasl_method", "x")])), "2.2");
    }
}
