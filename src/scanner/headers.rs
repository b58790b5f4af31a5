//! Security headers analysis module

use crate::error::{Result, VigiaError};
use crate::http::HttpClient;
use crate::models::{
    HeaderScan, HeaderStatus, ProbeCategory, SecurityHeader, Severity, TargetInfo,
};
use crate::scoring::header_score;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{ProbeContext, ProbeOutput};

/// HSTS max-age below six months is considered weak
pub const HSTS_MIN_MAX_AGE: u64 = 15_552_000;

/// Analyzes HTTP security headers
pub struct HeadersAnalyzer;

/// One entry of the fixed header definition set
pub struct HeaderCheck {
    pub name: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub recommendation: &'static str,
    /// Receives the lowercased header value, returns true when weak
    is_weak: fn(&str) -> bool,
}

/// Ordered definition set; every scan partitions exactly these headers
pub const HEADER_CHECKS: [HeaderCheck; 7] = [
    HeaderCheck {
        name: "Strict-Transport-Security",
        severity: Severity::High,
        description: "Enforces secure HTTPS connections",
        recommendation: "Add HSTS header: Strict-Transport-Security: max-age=31536000; includeSubDomains; preload",
        is_weak: weak_hsts,
    },
    HeaderCheck {
        name: "Content-Security-Policy",
        severity: Severity::High,
        description: "Prevents XSS and data injection attacks",
        recommendation: "Add CSP header: Content-Security-Policy: default-src 'self'; script-src 'self'; object-src 'none'",
        is_weak: weak_csp,
    },
    HeaderCheck {
        name: "X-Frame-Options",
        severity: Severity::Medium,
        description: "Prevents clickjacking attacks",
        recommendation: "Add X-Frame-Options: DENY or SAMEORIGIN to prevent clickjacking",
        is_weak: weak_frame_options,
    },
    HeaderCheck {
        name: "X-Content-Type-Options",
        severity: Severity::Medium,
        description: "Prevents MIME-type sniffing",
        recommendation: "Add X-Content-Type-Options: nosniff to prevent MIME sniffing",
        is_weak: never_weak,
    },
    HeaderCheck {
        name: "Referrer-Policy",
        severity: Severity::Low,
        description: "Controls referrer information",
        recommendation: "Add Referrer-Policy: strict-origin-when-cross-origin or no-referrer",
        is_weak: never_weak,
    },
    HeaderCheck {
        name: "Permissions-Policy",
        severity: Severity::Medium,
        description: "Controls browser features and APIs",
        recommendation: "Add Permissions-Policy to control browser features",
        is_weak: never_weak,
    },
    HeaderCheck {
        name: "X-XSS-Protection",
        severity: Severity::Low,
        description: "Legacy XSS filter (deprecated but still useful)",
        recommendation: "Add X-XSS-Protection: 1; mode=block",
        is_weak: weak_xss_protection,
    },
];

/// Extracts the max-age directive. Missing or unparsable values read as 0.
pub fn extract_max_age(value: &str) -> u64 {
    value
        .split(';')
        .find_map(|part| part.trim().strip_prefix("max-age="))
        .map(|raw| {
            let digits: String = raw
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .unwrap_or(0)
}

fn weak_hsts(value: &str) -> bool {
    !value.contains("max-age=") || extract_max_age(value) < HSTS_MIN_MAX_AGE
}

fn weak_csp(value: &str) -> bool {
    value.contains("unsafe-inline")
        || value.contains("unsafe-eval")
        || (value.contains('*') && !value.contains("'*'"))
}

fn weak_frame_options(value: &str) -> bool {
    value.contains("allow")
}

fn weak_xss_protection(value: &str) -> bool {
    value.contains('0')
}

fn never_weak(_value: &str) -> bool {
    false
}

/// Returns true when a present header value fails its weakness rule
pub fn is_weak_header(name: &str, value: &str) -> bool {
    let lower = value.to_lowercase();
    HEADER_CHECKS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .is_some_and(|c| (c.is_weak)(&lower))
}

/// Joins every value of a header with "; "
fn joined_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

/// Classifies response headers against [`HEADER_CHECKS`]
pub fn analyze_headers(headers: &HeaderMap) -> HeaderScan {
    let mut raw = BTreeMap::new();
    for name in headers.keys() {
        if let Some(value) = joined_value(headers, name.as_str()) {
            raw.insert(name.as_str().to_string(), value);
        }
    }

    let mut scan = HeaderScan {
        headers: raw,
        ..HeaderScan::default()
    };

    for check in &HEADER_CHECKS {
        let value = joined_value(headers, check.name);
        debug!("Checking header '{}': {:?}", check.name, value);

        match value {
            None => scan.missing.push(SecurityHeader {
                name: check.name.to_string(),
                value: String::new(),
                status: HeaderStatus::Missing,
                severity: check.severity,
                description: check.description.to_string(),
            }),
            Some(value) if (check.is_weak)(&value.to_lowercase()) => {
                scan.weak.push(SecurityHeader {
                    name: check.name.to_string(),
                    value,
                    status: HeaderStatus::Weak,
                    severity: check.severity,
                    description: format!("{} (weak configuration)", check.description),
                })
            }
            Some(value) => scan.present.push(SecurityHeader {
                name: check.name.to_string(),
                value,
                status: HeaderStatus::Present,
                severity: Severity::Info,
                description: check.description.to_string(),
            }),
        }
    }

    scan.score = header_score(scan.present.len(), HEADER_CHECKS.len());
    scan
}

/// Remediation advice for missing and weak headers
pub fn recommendations(scan: &HeaderScan) -> Vec<String> {
    let mut recs: Vec<String> = scan
        .missing
        .iter()
        .filter_map(|h| HEADER_CHECKS.iter().find(|c| c.name == h.name))
        .map(|c| c.recommendation.to_string())
        .collect();
    recs.extend(
        scan.weak
            .iter()
            .map(|h| format!("Strengthen {}: current value is weak", h.name)),
    );
    recs
}

/// HEAD first; GET when HEAD fails or returns an error status
async fn probe_headers(client: &HttpClient, url: &str) -> Result<HeaderMap> {
    match client.head(url).await {
        Ok(response)
            if !response.status().is_client_error() && !response.status().is_server_error() =>
        {
            return Ok(response.headers().clone());
        }
        Ok(response) => debug!("HEAD returned {}, trying GET", response.status()),
        Err(e) => debug!("HEAD request failed, trying GET: {e}"),
    }

    let response = client
        .get(url)
        .await
        .map_err(|e| VigiaError::ConnectionError(format!("failed to connect: {e}")))?;
    debug!("Response status: {}", response.status());
    Ok(response.headers().clone())
}

#[async_trait]
impl super::Analyzer for HeadersAnalyzer {
    fn name(&self) -> &str {
        "headers"
    }

    fn description(&self) -> &str {
        "Evaluates HTTP security headers for missing or weak protections"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Headers
    }

    fn label(&self) -> &str {
        "Security Headers"
    }

    async fn run(&self, target: &TargetInfo, ctx: &ProbeContext) -> Result<ProbeOutput> {
        debug!("Starting security headers scan for {}", target.url);
        let headers = probe_headers(&ctx.client, &target.url).await?;
        let scan = analyze_headers(&headers);

        info!(
            "Security headers: score {}/100, {} missing, {} weak, {} present",
            scan.score,
            scan.missing.len(),
            scan.weak.len(),
            scan.present.len()
        );

        Ok(ProbeOutput::Headers(scan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        headers
    }

    fn assert_partition(scan: &HeaderScan) {
        let mut names: Vec<&str> = scan
            .missing
            .iter()
            .chain(&scan.weak)
            .chain(&scan.present)
            .map(|h| h.name.as_str())
            .collect();
        names.sort_unstable();
        let mut expected: Vec<&str> = HEADER_CHECKS.iter().map(|c| c.name).collect();
        expected.sort_unstable();
        assert_eq!(names, expected);
    }

    #[test]
    fn hsts_rules() {
        assert!(is_weak_header("Strict-Transport-Security", "includeSubDomains"));
        assert!(is_weak_header("Strict-Transport-Security", "max-age=300"));
        assert!(is_weak_header("Strict-Transport-Security", "max-age=abc"));
        assert!(!is_weak_header(
            "Strict-Transport-Security",
            "max-age=15552000; includeSubDomains"
        ));
        assert!(!is_weak_header("strict-transport-security", "MAX-AGE=31536000"));
    }

    #[test]
    fn csp_rules() {
        assert!(is_weak_header("Content-Security-Policy", "script-src 'unsafe-inline'"));
        assert!(is_weak_header("Content-Security-Policy", "script-src 'UNSAFE-EVAL'"));
        assert!(is_weak_header("Content-Security-Policy", "default-src *"));
        assert!(!is_weak_header("Content-Security-Policy", "default-src '*'"));
        assert!(!is_weak_header("Content-Security-Policy", "default-src 'self'"));
    }

    #[test]
    fn frame_and_xss_protection_rules() {
        assert!(is_weak_header("X-Frame-Options", "ALLOW-FROM https://a.example"));
        assert!(!is_weak_header("X-Frame-Options", "DENY"));
        assert!(is_weak_header("X-XSS-Protection", "0"));
        assert!(!is_weak_header("X-XSS-Protection", "1; mode=block"));
        assert!(!is_weak_header("Referrer-Policy", "unsafe-url"));
    }

    #[test]
    fn partitions_definition_set() {
        let cases = [
            map(&[]),
            map(&[("x-frame-options", "SAMEORIGIN"), ("x-content-type-options", "nosniff")]),
            map(&[("content-security-policy", "default-src *"), ("x-xss-protection", "0")]),
            map(&[
                ("strict-transport-security", "max-age=31536000"),
                ("content-security-policy", "default-src 'self'"),
                ("x-frame-options", "DENY"),
                ("x-content-type-options", "nosniff"),
                ("referrer-policy", "no-referrer"),
                ("permissions-policy", "geolocation=()"),
                ("x-xss-protection", "1; mode=block"),
            ]),
        ];
        for headers in &cases {
            assert_partition(&analyze_headers(headers));
        }
    }

    #[test]
    fn weak_header_does_not_score() {
        let scan = analyze_headers(&map(&[("content-security-policy", "default-src *")]));
        assert_eq!(scan.score, 0);
        assert_eq!(scan.weak.len(), 1);
        assert_eq!(scan.weak[0].severity, Severity::High);
        assert!(scan.weak[0].description.ends_with("(weak configuration)"));
        assert_eq!(scan.missing.len(), 6);
    }

    #[test]
    fn multi_valued_headers_are_joined() {
        let scan = analyze_headers(&map(&[
            ("permissions-policy", "camera=()"),
            ("permissions-policy", "microphone=()"),
        ]));
        assert_eq!(
            scan.headers.get("permissions-policy").map(String::as_str),
            Some("camera=(); microphone=()")
        );
        assert_eq!(scan.present[0].value, "camera=(); microphone=()");
    }

    #[test]
    fn recommendations_cover_missing_and_weak() {
        let scan = analyze_headers(&map(&[("x-xss-protection", "0")]));
        let recs = recommendations(&scan);
        assert_eq!(recs.len(), 7);
        assert!(recs.iter().any(|r| r.contains("Strengthen X-XSS-Protection")));
    }
}
