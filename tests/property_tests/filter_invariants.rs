//! Property-based tests for filter invariants

use cached_auth_filter::filter::{
    CacheDirective, CacheId, CachedAuthInformation, FilterConfig, Header,
};
use proptest::prelude::*;

const CONFIGURED_DOMAIN: &str = "domain.org";

pub mod generators {
    use super::*;
    use proptest::collection::vec;
    use proptest::string::string_regex;

    /// Request paths, with and without query strings
    pub fn request_path() -> impl Strategy<Value = String> {
        string_regex(r"/[a-z0-9/_.-]{0,40}").unwrap()
    }

    /// Domains that are never the configured one
    pub fn other_domain() -> impl Strategy<Value = String> {
        string_regex(r"[a-z]{1,12}\.(com|net|io)").unwrap()
    }

    /// Printable cache-control values, directives and garbage mixed
    pub fn cache_control() -> impl Strategy<Value = String> {
        let directive = prop_oneof![
            Just("no-cache".to_string()),
            Just("no-store".to_string()),
            Just("must-revalidate".to_string()),
            Just("private".to_string()),
            any::<i64>().prop_map(|age| format!("max-age={age}")),
            any::<u32>().prop_map(|age| format!(" MAX-AGE = \"{age}\" ")),
            string_regex(r"[ -~]{0,20}").unwrap(),
        ];
        vec(directive, 0..5).prop_map(|directives| directives.join(","))
    }

    pub fn header() -> impl Strategy<Value = Header> {
        (
            string_regex(r"[A-Za-z][A-Za-z0-9-]{0,20}").unwrap(),
            string_regex(r"[ -~]{0,60}").unwrap(),
        )
            .prop_map(|(name, value)| Header::new(name, value))
    }

    pub fn cached_auth_information() -> impl Strategy<Value = CachedAuthInformation> {
        (any::<i64>(), vec(header(), 0..5))
            .prop_map(|(expiration, headers)| CachedAuthInformation::new(expiration, headers))
    }
}

fn matching_config() -> FilterConfig {
    FilterConfig::load(Some(
        br#"{"general": {"enableEndpointMatching": true},
             "endpoints": {
               "ISHARE": {"domain.org": ["/", "/sub-path"]},
               "OIC": {"domain.org": ["/oic/"]}
             }}"#,
    ))
}

proptest! {
    #[test]
    fn prop_unconfigured_domain_never_matches(
        domain in generators::other_domain(),
        path in generators::request_path(),
    ) {
        let config = matching_config();
        prop_assert!(config.match_endpoint(&domain, &path).is_none());
    }

    #[test]
    fn prop_configured_domain_always_matches_catch_all(path in generators::request_path()) {
        let config = matching_config();
        let entry = config.match_endpoint(CONFIGURED_DOMAIN, &path);
        prop_assert!(entry.is_some());
        prop_assert_eq!(entry.unwrap().domain, CONFIGURED_DOMAIN);
    }

    #[test]
    fn prop_longer_pattern_wins_below_sub_path(suffix in r"[a-z0-9]{0,20}") {
        let config = matching_config();
        let path = format!("/sub-path/{suffix}");
        let entry = config.match_endpoint(CONFIGURED_DOMAIN, &path).unwrap();
        prop_assert_eq!(entry.path, "/sub-path");
        prop_assert_eq!(entry.cache_id, CacheId::for_endpoint(CONFIGURED_DOMAIN, "/sub-path"));
    }

    #[test]
    fn prop_disabled_matching_uses_global_slot(
        domain in generators::other_domain(),
        path in generators::request_path(),
    ) {
        let config = FilterConfig::default();
        let entry = config.match_endpoint(&domain, &path).unwrap();
        prop_assert_eq!(entry.cache_id, CacheId::global());
        prop_assert_eq!(entry.auth_type, "ISHARE");
    }

    #[test]
    fn prop_cache_control_never_expires_in_the_past(
        header in generators::cache_control(),
        now in 0i64..4_000_000_000,
    ) {
        if let CacheDirective::ExpiresAt(expiry) = CacheDirective::parse(&header, now) {
            prop_assert!(expiry > now);
        }
    }

    #[test]
    fn prop_cache_entry_codec_round_trips(info in generators::cached_auth_information()) {
        let encoded = info.encode().unwrap();
        prop_assert_eq!(CachedAuthInformation::decode(&encoded).unwrap(), info);
    }
}
