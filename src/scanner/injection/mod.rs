//! Reflected injection detection
//!
//! Shared plumbing for the SQLi and XSS analyzers: parameter extraction,
//! payload substitution and pacing.

pub mod sqli;
pub mod xss;

use crate::error::{Result, VigiaError};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Fixed pause between two payload attempts
pub const PAYLOAD_DELAY: Duration = Duration::from_millis(100);

/// A test payload and what it tries
#[derive(Debug, Clone, Copy)]
pub struct Payload {
    pub value: &'static str,
    pub description: &'static str,
}

/// Parses the target URL, mapping failures to a parse error
pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| VigiaError::ParseError(format!("failed to parse URL: {e}")))
}

/// Query parameters in URL order, unique names, first value kept.
///
/// Returns `fallback` when the URL carries no query parameters.
pub fn injection_params(url: &Url, fallback: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| seen.insert(k.to_string()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        fallback
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        params
    }
}

/// Builds a test URL with `param` replaced by `payload`, every other
/// parameter at its baseline value
pub fn build_test_url(
    url: &Url,
    params: &[(String, String)],
    param: &str,
    payload: &str,
) -> String {
    let mut test = url.clone();
    test.set_fragment(None);
    test.query_pairs_mut().clear().extend_pairs(params.iter().map(|(k, v)| {
        if k == param {
            (k.as_str(), payload)
        } else {
            (k.as_str(), v.as_str())
        }
    }));
    test.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_url_order_and_first_value() {
        let url = Url::parse("http://example.com/p?b=2&a=1&b=3").unwrap();
        let params = injection_params(&url, &[("id", "1")]);
        assert_eq!(
            params,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn fallback_when_no_query() {
        let url = Url::parse("http://example.com/").unwrap();
        let params = injection_params(&url, &[("q", "test"), ("name", "test")]);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].0, "q");
    }

    #[test]
    fn test_url_replaces_only_target_param() {
        let url = Url::parse("http://example.com/s?q=shoes&page=2#top").unwrap();
        let params = injection_params(&url, &[]);
        let test = build_test_url(&url, &params, "q", "' OR '1'='1");
        let parsed = Url::parse(&test).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "' OR '1'='1".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert!(parsed.fragment().is_none());
        assert_eq!(parsed.path(), "/s");
    }
}
