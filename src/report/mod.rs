//! Report generation

pub mod json;
pub mod markdown;

use crate::models::ScanResult;
use crate::scanner::headers;
use crate::scanner::injection::{sqli, xss};
use crate::scanner::tls;

/// Remediation advice grouped by section, sections without advice left out
pub fn recommendations(result: &ScanResult) -> Vec<(&'static str, Vec<String>)> {
    let sections = [
        (
            "Security Headers",
            result
                .headers
                .as_ref()
                .map(headers::recommendations)
                .unwrap_or_default(),
        ),
        (
            "TLS/SSL",
            result.tls.as_ref().map(tls::recommendations).unwrap_or_default(),
        ),
        ("SQL Injection", sqli::recommendations(&result.sqli)),
        ("XSS", xss::recommendations(&result.xss)),
    ];

    sections
        .into_iter()
        .filter(|(_, recs)| !recs.is_empty())
        .collect()
}
