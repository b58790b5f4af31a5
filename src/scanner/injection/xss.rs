//! Cross-Site Scripting detection (reflected and DOM indicators)

use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{ProbeCategory, Severity, TargetInfo, VulnKind, Vulnerability};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{build_test_url, injection_params, parse_url, Payload, PAYLOAD_DELAY};
use crate::scanner::{ProbeContext, ProbeOutput};

pub const XSS_PAYLOADS: [Payload; 10] = [
    Payload {
        value: "<script>alert('XSS')</script>",
        description: "Basic script injection",
    },
    Payload {
        value: "<img src=x onerror=alert('XSS')>",
        description: "Image tag with onerror handler",
    },
    Payload {
        value: "<svg/onload=alert('XSS')>",
        description: "SVG with onload handler",
    },
    Payload {
        value: "\"><script>alert('XSS')</script>",
        description: "Breaking out of attribute",
    },
    Payload {
        value: "javascript:alert('XSS')",
        description: "JavaScript protocol handler",
    },
    Payload {
        value: "<iframe src=javascript:alert('XSS')>",
        description: "Iframe with JavaScript URL",
    },
    Payload {
        value: "<body onload=alert('XSS')>",
        description: "Body tag with onload",
    },
    Payload {
        value: "<input onfocus=alert('XSS') autofocus>",
        description: "Input with autofocus",
    },
    Payload {
        value: "<marquee onstart=alert('XSS')>",
        description: "Marquee tag exploitation",
    },
    Payload {
        value: "<details open ontoggle=alert('XSS')>",
        description: "Details tag with ontoggle",
    },
];

const FALLBACK_PARAMS: &[(&str, &str)] = &[
    ("q", "test"),
    ("search", "test"),
    ("query", "test"),
    ("keyword", "test"),
    ("name", "test"),
    ("comment", "test"),
    ("message", "test"),
    ("input", "test"),
];

const DOM_PROBE_FRAGMENT: &str = "<script>alert('XSS')</script>";

/// Client-side sinks, first match wins
const DOM_SINKS: &[&str] = &[
    "location.hash",
    "window.location.hash",
    "document.location.hash",
    "location.href",
    "document.write(",
    "eval(",
    "innerhtml",
    "outerhtml",
];

/// Detects reflected XSS and flags pages with dangerous DOM sinks
#[derive(Default)]
pub struct XssAnalyzer;

/// Verbatim, case-insensitive reflection of the payload
pub fn is_exact_reflection(body_lower: &str, payload: &str) -> bool {
    body_lower.contains(&payload.to_lowercase())
}

/// The payload stripped of `<>'"` still carries "alert" or "xss", and so does the body
pub fn check_partial_reflection(body_lower: &str, payload: &str) -> bool {
    let cleaned: String = payload
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"'))
        .collect::<String>()
        .to_lowercase();

    ["alert", "xss"]
        .iter()
        .any(|marker| cleaned.contains(marker) && body_lower.contains(marker))
}

/// First dangerous DOM sink present in the lowercased body
pub fn find_dom_sink(body_lower: &str) -> Option<&'static str> {
    DOM_SINKS
        .iter()
        .find(|sink| body_lower.contains(*sink))
        .copied()
}

/// Remediation advice, empty when nothing was found
pub fn recommendations(vulns: &[Vulnerability]) -> Vec<String> {
    if vulns.is_empty() {
        return Vec::new();
    }

    let mut recs: Vec<String> = [
        "Implement proper output encoding based on context (HTML, JavaScript, URL, CSS)",
        "Use Content-Security-Policy (CSP) headers to mitigate XSS impact",
        "Validate and sanitize all user input on the server side",
        "Use security-focused template engines with auto-escaping",
        "Avoid using dangerous functions like eval(), innerHTML, document.write()",
        "Set HttpOnly flag on cookies to prevent JavaScript access",
        "Use DOM-based APIs like textContent instead of innerHTML when possible",
        "Implement input validation with whitelist approach",
        "Regular security testing and code reviews",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if vulns.iter().any(|v| v.location == "DOM") {
        recs.push("Review all client-side JavaScript for unsafe DOM manipulation".to_string());
        recs.push(
            "Avoid using location.hash, location.search directly without sanitization".to_string(),
        );
    }

    recs
}

impl XssAnalyzer {
    async fn probe_param(
        &self,
        client: &HttpClient,
        url: &Url,
        params: &[(String, String)],
        param: &str,
    ) -> Option<Vulnerability> {
        for (i, payload) in XSS_PAYLOADS.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PAYLOAD_DELAY).await;
            }

            let test_url = build_test_url(url, params, param, payload.value);
            let page = match client.fetch(&test_url).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Request failed for payload '{}': {e}", payload.value);
                    continue;
                }
            };
            let body = page.body.to_lowercase();

            if is_exact_reflection(&body, payload.value) {
                warn!("XSS vulnerability detected in parameter '{param}'");
                return Some(Vulnerability {
                    kind: VulnKind::Xss,
                    severity: Severity::High,
                    location: param.to_string(),
                    payload: payload.value.to_string(),
                    evidence: "Payload reflected unescaped in response".to_string(),
                    description: format!(
                        "{} - Payload found in response without proper encoding",
                        payload.description
                    ),
                });
            }

            if check_partial_reflection(&body, payload.value) {
                warn!("Potential XSS (partial reflection) in parameter '{param}'");
                return Some(Vulnerability {
                    kind: VulnKind::Xss,
                    severity: Severity::Medium,
                    location: param.to_string(),
                    payload: payload.value.to_string(),
                    evidence: "Payload partially reflected, may be bypassable".to_string(),
                    description: format!(
                        "{} - Input reflected with partial encoding",
                        payload.description
                    ),
                });
            }
        }
        None
    }

    async fn probe_dom(&self, client: &HttpClient, url: &Url) -> Option<Vulnerability> {
        let mut test = url.clone();
        test.set_query(None);
        test.set_fragment(Some(DOM_PROBE_FRAGMENT));

        let page = match client.fetch(test.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                debug!("DOM probe failed: {e}");
                return None;
            }
        };

        let sink = find_dom_sink(&page.body.to_lowercase())?;
        warn!("Potential DOM-based XSS vulnerability detected");
        Some(Vulnerability {
            kind: VulnKind::Xss,
            severity: Severity::Medium,
            location: "DOM".to_string(),
            payload: "DOM manipulation pattern detected".to_string(),
            evidence: format!("Found dangerous pattern: {sink}"),
            description: "Page uses potentially unsafe DOM manipulation that could lead to XSS"
                .to_string(),
        })
    }
}

#[async_trait]
impl crate::scanner::Analyzer for XssAnalyzer {
    fn name(&self) -> &str {
        "xss"
    }

    fn description(&self) -> &str {
        "Tests query parameters for reflected XSS and looks for unsafe DOM sinks"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Xss
    }

    fn label(&self) -> &str {
        "XSS"
    }

    async fn run(&self, target: &TargetInfo, ctx: &ProbeContext) -> Result<ProbeOutput> {
        debug!("Starting XSS scan for {}", target.url);
        let url = parse_url(&target.url)?;
        let params = injection_params(&url, FALLBACK_PARAMS);

        let mut vulns = Vec::new();
        for (param, _) in &params {
            debug!("Testing parameter: {param}");
            if let Some(vuln) = self.probe_param(&ctx.client, &url, &params, param).await {
                vulns.push(vuln);
            }
        }

        if let Some(vuln) = self.probe_dom(&ctx.client, &url).await {
            vulns.push(vuln);
        }

        info!(
            "XSS scan completed: found {} potential vulnerabilities",
            vulns.len()
        );
        Ok(ProbeOutput::Xss(vulns))
    }
}
