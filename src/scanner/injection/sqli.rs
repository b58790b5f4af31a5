//! SQL injection detection (error-based and behaviour-based)

use crate::error::{Result, VigiaError};
use crate::http::HttpClient;
use crate::models::{ProbeCategory, Severity, TargetInfo, VulnKind, Vulnerability};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use super::{build_test_url, injection_params, parse_url, Payload, PAYLOAD_DELAY};
use crate::scanner::{ProbeContext, ProbeOutput};

pub const SQLI_PAYLOADS: [Payload; 10] = [
    Payload {
        value: "'",
        description: "Single quote test",
    },
    Payload {
        value: "' OR '1'='1",
        description: "Classic OR bypass",
    },
    Payload {
        value: "' OR '1'='1' --",
        description: "OR bypass with comment",
    },
    Payload {
        value: "' OR 1=1 --",
        description: "Numeric OR bypass",
    },
    Payload {
        value: "admin' --",
        description: "Comment injection",
    },
    Payload {
        value: "' UNION SELECT NULL--",
        description: "UNION injection test",
    },
    Payload {
        value: "1' AND '1'='2",
        description: "False condition test",
    },
    Payload {
        value: "'; DROP TABLE users--",
        description: "Destructive command test",
    },
    Payload {
        value: "' OR 'x'='x",
        description: "Alternative OR bypass",
    },
    Payload {
        value: "1' ORDER BY 1--",
        description: "ORDER BY enumeration",
    },
];

const PATH_PAYLOADS: [&str; 2] = ["'", "' OR '1'='1"];

/// Probed when the target URL has no query string
const FALLBACK_PARAMS: &[(&str, &str)] = &[
    ("id", "1"),
    ("user", "admin"),
    ("page", "1"),
    ("search", "test"),
    ("q", "test"),
    ("username", "admin"),
];

/// Database error signatures, matched against the lowercased body in order
const SQL_ERROR_PATTERNS: &[&str] = &[
    "sql syntax",
    "mysql_fetch",
    "mysql_num_rows",
    "mysqli",
    "sqlexception",
    "postgresql",
    "sqlite",
    "oracle",
    "odbc",
    "mssql",
    "jdbc",
    "ora-",
    "pg_query",
    "pg_exec",
    "syntax error",
    "unterminated quoted string",
    "unclosed quotation mark",
    "error in your sql syntax",
    "you have an error in your sql",
];

/// Length change beyond this fraction of the baseline counts as a behaviour change
pub const LENGTH_CHANGE_THRESHOLD: f64 = 0.1;

/// Detects SQL injection through error leakage and response changes
#[derive(Default)]
pub struct SqliAnalyzer;

/// Returns the first database error signature found in the body
pub fn detect_sql_error(body: &str) -> Option<&'static str> {
    let body = body.to_lowercase();
    SQL_ERROR_PATTERNS
        .iter()
        .find(|pattern| body.contains(*pattern))
        .copied()
}

/// Status change, or body length off by more than 10% in either direction.
///
/// A zero-length baseline flags any non-empty response.
pub fn is_behavior_change(
    baseline_status: StatusCode,
    status: StatusCode,
    baseline_len: usize,
    len: usize,
) -> bool {
    if baseline_status != status {
        return true;
    }
    if baseline_len == 0 {
        return len != 0;
    }
    let diff = (len as f64 - baseline_len as f64) / baseline_len as f64;
    diff.abs() > LENGTH_CHANGE_THRESHOLD
}

/// Remediation advice, empty when nothing was found
pub fn recommendations(vulns: &[Vulnerability]) -> Vec<String> {
    if vulns.is_empty() {
        return Vec::new();
    }
    [
        "Use parameterized queries (prepared statements) for all database operations",
        "Implement input validation and sanitization",
        "Use ORM frameworks that handle SQL escaping automatically",
        "Apply principle of least privilege to database accounts",
        "Enable WAF (Web Application Firewall) with SQL injection rules",
        "Never concatenate user input directly into SQL queries",
        "Implement proper error handling (don't expose SQL errors to users)",
        "Regular security audits and penetration testing",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

struct Baseline {
    status: StatusCode,
    len: usize,
}

impl SqliAnalyzer {
    async fn probe_param(
        &self,
        client: &HttpClient,
        url: &Url,
        params: &[(String, String)],
        param: &str,
        baseline: &Baseline,
    ) -> Option<Vulnerability> {
        for (i, payload) in SQLI_PAYLOADS.iter().enumerate() {
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

            if let Some(signature) = detect_sql_error(&page.body) {
                warn!("SQL injection vulnerability detected in parameter '{param}'");
                return Some(Vulnerability {
                    kind: VulnKind::Sqli,
                    severity: Severity::Critical,
                    location: param.to_string(),
                    payload: payload.value.to_string(),
                    evidence: format!("SQL error detected: {signature}"),
                    description: format!("{} - SQL error exposed", payload.description),
                });
            }

            if is_behavior_change(baseline.status, page.status, baseline.len, page.body.len()) {
                warn!("Potential SQL injection (behavior change) in parameter '{param}'");
                return Some(Vulnerability {
                    kind: VulnKind::Sqli,
                    severity: Severity::High,
                    location: param.to_string(),
                    payload: payload.value.to_string(),
                    evidence: format!(
                        "Response behavior changed: baseline={} bytes, test={} bytes",
                        baseline.len,
                        page.body.len()
                    ),
                    description: format!(
                        "{} - Response indicates potential SQL injection",
                        payload.description
                    ),
                });
            }
        }
        None
    }

    /// Appends each payload as an extra path segment, query dropped
    async fn probe_path(&self, client: &HttpClient, url: &Url) -> Option<Vulnerability> {
        for (i, payload) in PATH_PAYLOADS.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PAYLOAD_DELAY).await;
            }

            let mut test = url.clone();
            test.set_query(None);
            test.set_fragment(None);
            match test.path_segments_mut() {
                Ok(mut segments) => {
                    segments.pop_if_empty().push(payload);
                }
                Err(()) => return None,
            }

            let page = match client.fetch(test.as_str()).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Path probe failed for payload '{payload}': {e}");
                    continue;
                }
            };

            if let Some(signature) = detect_sql_error(&page.body) {
                warn!("SQL injection vulnerability detected in URL path");
                return Some(Vulnerability {
                    kind: VulnKind::Sqli,
                    severity: Severity::Critical,
                    location: "URL Path".to_string(),
                    payload: payload.to_string(),
                    evidence: format!("SQL error detected: {signature}"),
                    description: "SQL injection in URL path".to_string(),
                });
            }
        }
        None
    }
}

#[async_trait]
impl crate::scanner::Analyzer for SqliAnalyzer {
    fn name(&self) -> &str {
        "sqli"
    }

    fn description(&self) -> &str {
        "Tests query parameters and the URL path for SQL injection"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Sqli
    }

    fn label(&self) -> &str {
        "SQL Injection"
    }

    async fn run(&self, target: &TargetInfo, ctx: &ProbeContext) -> Result<ProbeOutput> {
        debug!("Starting SQL injection scan for {}", target.url);
        let url = parse_url(&target.url)?;
        let params = injection_params(&url, FALLBACK_PARAMS);

        let baseline = ctx
            .client
            .fetch(&target.url)
            .await
            .map_err(|e| {
                VigiaError::ConnectionError(format!("failed to get baseline response: {e}"))
            })?;
        let baseline = Baseline {
            status: baseline.status,
            len: baseline.body.len(),
        };
        debug!(
            "Baseline response: status={}, length={}",
            baseline.status, baseline.len
        );

        let mut vulns = Vec::new();
        for (param, _) in &params {
            debug!("Testing parameter: {param}");
            if let Some(vuln) = self
                .probe_param(&ctx.client, &url, &params, param, &baseline)
                .await
            {
                vulns.push(vuln);
            }
        }

        if url.path().len() > 1 {
            if let Some(vuln) = self.probe_path(&ctx.client, &url).await {
                vulns.push(vuln);
            }
        }

        info!(
            "SQL injection scan completed: found {} potential vulnerabilities",
            vulns.len()
        );
        Ok(ProbeOutput::Sqli(vulns))
    }
}
