//! Markdown audit report

use crate::error::{Result, VigiaError};
use crate::models::{ScanResult, Severity, Vulnerability};
use std::fmt::Write;
use std::path::Path;
use tracing::info;

/// Escapes characters that would break a table cell
fn escape_cell(field: &str) -> String {
    field.replace('|', "\\|").replace('\n', " ")
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Renders the scan result as a Markdown document
pub fn render(result: &ScanResult) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, result)
        .map_err(|e| VigiaError::ScanError(format!("failed to render markdown: {e}")))?;
    Ok(out)
}

/// Ordered follow-ups, most urgent first
pub fn priority_actions(result: &ScanResult) -> Vec<String> {
    let mut actions = Vec::new();

    let critical = result.count_by_severity(Severity::Critical);
    if critical > 0 {
        actions.push(format!(
            "CRITICAL: Fix {critical} critical vulnerabilities immediately"
        ));
    }
    if !result.sqli.is_empty() {
        actions.push("Implement parameterized queries to prevent SQL injection".to_string());
    }
    if !result.xss.is_empty() {
        actions.push(
            "Add proper input validation and output encoding for XSS prevention".to_string(),
        );
    }
    if result.tls.as_ref().is_some_and(|tls| !tls.is_secure) {
        actions.push("Upgrade TLS configuration to TLS 1.3 with strong ciphers".to_string());
    }
    if result.headers.as_ref().is_some_and(|h| h.score < 50) {
        actions
            .push("Implement missing security headers (HSTS, CSP, X-Frame-Options)".to_string());
    }

    if actions.is_empty() {
        actions.push(
            "No immediate priority actions required. Continue monitoring security posture."
                .to_string(),
        );
    }
    actions
}

/// Writes the Markdown report to `output_path`, creating parent directories
pub fn export(result: &ScanResult, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, render(result)?)?;
    info!("Markdown report saved to {}", output_path.display());
    Ok(())
}

fn write_report(out: &mut String, result: &ScanResult) -> std::fmt::Result {
    writeln!(out, "# Security Audit Report\n")?;
    writeln!(out, "## Scan Information\n")?;
    writeln!(out, "- **Target URL**: {}", result.target.url)?;
    writeln!(out, "- **Domain**: {}", result.target.domain)?;
    writeln!(out, "- **IP Address**: {}", result.target.ip)?;
    writeln!(
        out,
        "- **Scan Date**: {}",
        result.started_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    if let Some(finished) = result.finished_at {
        let secs = (finished - result.started_at).num_seconds();
        writeln!(out, "- **Duration**: {secs}s")?;
    }
    writeln!(out, "- **Requests**: {}", result.total_requests)?;
    writeln!(out, "- **Risk Level**: **{}**\n", result.risk_level)?;

    writeln!(out, "## Executive Summary\n")?;
    writeln!(out, "| Severity | Count |")?;
    writeln!(out, "|----------|-------|")?;
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        writeln!(out, "| {severity} | {} |", result.count_by_severity(severity))?;
    }
    writeln!(out)?;

    if let Some(headers) = &result.headers {
        writeln!(out, "## Security Headers\n")?;
        writeln!(out, "**Score**: {}/100\n", headers.score)?;
        if !headers.missing.is_empty() {
            writeln!(out, "### Missing Headers\n")?;
            writeln!(out, "| Header | Severity | Description |")?;
            writeln!(out, "|--------|----------|-------------|")?;
            for h in &headers.missing {
                writeln!(out, "| `{}` | {} | {} |", h.name, h.severity, h.description)?;
            }
            writeln!(out)?;
        }
        if !headers.weak.is_empty() {
            writeln!(out, "### Weak Headers\n")?;
            writeln!(out, "| Header | Value | Issue |")?;
            writeln!(out, "|--------|-------|-------|")?;
            for h in &headers.weak {
                writeln!(
                    out,
                    "| `{}` | `{}` | {} |",
                    h.name,
                    escape_cell(&truncate(&h.value, 50)),
                    h.description
                )?;
            }
            writeln!(out)?;
        }
        if !headers.present.is_empty() {
            writeln!(out, "### Present Headers\n")?;
            for h in &headers.present {
                writeln!(out, "- **{}**: `{}`", h.name, truncate(&h.value, 80))?;
            }
            writeln!(out)?;
        }
    }

    if let Some(tls) = &result.tls {
        writeln!(out, "## TLS/SSL Configuration\n")?;
        writeln!(out, "**Score**: {}/100\n", tls.score)?;
        writeln!(
            out,
            "**Status**: {}\n",
            if tls.is_secure { "Secure" } else { "Insecure" }
        )?;
        if !tls.protocol.is_empty() {
            writeln!(out, "- **Protocol Version**: {}", tls.protocol)?;
            writeln!(out, "- **Cipher Suite**: {}\n", tls.cipher_suite)?;
        }
        if let Some(cert) = &tls.certificate {
            writeln!(out, "### Certificate\n")?;
            writeln!(out, "- **Subject**: {}", cert.subject)?;
            writeln!(out, "- **Issuer**: {}", cert.issuer)?;
            writeln!(out, "- **Valid From**: {}", cert.valid_from.format("%Y-%m-%d"))?;
            writeln!(out, "- **Valid To**: {}", cert.valid_to.format("%Y-%m-%d"))?;
            if cert.is_expired {
                writeln!(out, "- **Status**: **EXPIRED**\n")?;
            } else {
                writeln!(out, "- **Days Until Expiry**: {}\n", cert.days_to_expiry)?;
            }
        }
        if !tls.vulnerabilities.is_empty() {
            writeln!(out, "### Issues\n")?;
            for v in &tls.vulnerabilities {
                writeln!(out, "- {v}")?;
            }
            writeln!(out)?;
        }
    }

    write_vulnerabilities(out, "SQL Injection", &result.sqli)?;
    write_vulnerabilities(out, "Cross-Site Scripting (XSS)", &result.xss)?;

    if let Some(ports) = &result.ports {
        writeln!(out, "## Open Ports\n")?;
        if ports.open_ports.is_empty() {
            writeln!(out, "No open ports found.\n")?;
        } else {
            writeln!(out, "| Port | Protocol | Service | Version |")?;
            writeln!(out, "|------|----------|---------|---------|")?;
            for p in &ports.open_ports {
                writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    p.number,
                    p.protocol,
                    escape_cell(&p.service),
                    escape_cell(&p.version)
                )?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "## Priority Actions\n")?;
    for (i, action) in priority_actions(result).iter().enumerate() {
        writeln!(out, "{}. {action}", i + 1)?;
    }
    writeln!(out)?;

    let advice = super::recommendations(result);
    if !advice.is_empty() {
        writeln!(out, "## Recommendations\n")?;
        for (section, recs) in advice {
            writeln!(out, "### {section}\n")?;
            for rec in recs {
                writeln!(out, "- {rec}")?;
            }
            writeln!(out)?;
        }
    }

    if !result.errors.is_empty() {
        writeln!(out, "## Errors\n")?;
        for e in &result.errors {
            writeln!(out, "- `{}`: {}", e.module, e.message)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn write_vulnerabilities(
    out: &mut String,
    title: &str,
    vulns: &[Vulnerability],
) -> std::fmt::Result {
    writeln!(out, "## {title}\n")?;
    if vulns.is_empty() {
        writeln!(out, "No vulnerabilities detected.\n")?;
        return Ok(());
    }
    writeln!(out, "| Severity | Location | Payload | Evidence |")?;
    writeln!(out, "|----------|----------|---------|----------|")?;
    for v in vulns {
        writeln!(
            out,
            "| {} | {} | `{}` | {} |",
            v.severity,
            escape_cell(&v.location),
            escape_cell(&v.payload),
            escape_cell(&v.evidence)
        )?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeaderScan, TargetInfo, TlsScan, VulnKind};

    fn empty_result() -> ScanResult {
        ScanResult::new(TargetInfo {
            url: "https://example.com/".to_string(),
            domain: "example.com".to_string(),
            ip: "127.0.0.1".to_string(),
            scheme: "https".to_string(),
            port: 443,
        })
    }

    #[test]
    fn renders_sections_and_escapes_cells() {
        let mut result = ScanResult::new(TargetInfo {
            url: "http://example.com/?q=1".to_string(),
            domain: "example.com".to_string(),
            ip: "127.0.0.1".to_string(),
            scheme: "http".to_string(),
            port: 80,
        });
        result.tls = Some(TlsScan {
            vulnerabilities: vec!["Target is not using HTTPS".to_string()],
            ..TlsScan::default()
        });
        result.sqli.push(Vulnerability {
            kind: VulnKind::Sqli,
            severity: Severity::Critical,
            location: "q".to_string(),
            payload: "' OR 'x'='x".to_string(),
            evidence: "SQL error detected: sql syntax".to_string(),
            description: "Alternative OR bypass - SQL error exposed".to_string(),
        });
        result.xss.push(Vulnerability {
            kind: VulnKind::Xss,
            severity: Severity::Medium,
            location: "DOM".to_string(),
            payload: "a|b".to_string(),
            evidence: "Found dangerous pattern: eval(".to_string(),
            description: String::new(),
        });
        result.finish();

        let md = render(&result).unwrap();
        assert!(md.contains("**Risk Level**: **CRITICAL**"));
        assert!(md.contains("| CRITICAL | 1 |"));
        assert!(md.contains("- Target is not using HTTPS"));
        assert!(md.contains("`a\\|b`"));
        assert!(md.contains("### SQL Injection"));
        assert!(!md.contains("## Open Ports"));
    }

    #[test]
    fn priority_actions_follow_findings() {
        let mut result = empty_result();
        result.headers = Some(HeaderScan {
            score: 28,
            ..HeaderScan::default()
        });
        result.tls = Some(TlsScan::default());
        result.sqli.push(Vulnerability {
            kind: VulnKind::Sqli,
            severity: Severity::Critical,
            location: "id".to_string(),
            payload: "'".to_string(),
            evidence: String::new(),
            description: String::new(),
        });

        let actions = priority_actions(&result);
        assert_eq!(
            actions,
            vec![
                "CRITICAL: Fix 1 critical vulnerabilities immediately",
                "Implement parameterized queries to prevent SQL injection",
                "Upgrade TLS configuration to TLS 1.3 with strong ciphers",
                "Implement missing security headers (HSTS, CSP, X-Frame-Options)",
            ]
        );

        let md = render(&result).unwrap();
        assert!(md.contains("## Priority Actions\n\n1. CRITICAL: Fix 1 critical"));
        assert!(md.contains("3. Upgrade TLS configuration"));
    }

    #[test]
    fn clean_scan_has_monitoring_action() {
        let mut result = empty_result();
        result.headers = Some(HeaderScan {
            score: 85,
            ..HeaderScan::default()
        });
        assert_eq!(
            priority_actions(&result),
            vec!["No immediate priority actions required. Continue monitoring security posture."]
        );
    }

    #[test]
    fn export_creates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("vigia-md-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("report.md");

        export(&empty_result(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Security Audit Report"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
