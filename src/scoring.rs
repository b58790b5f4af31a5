//! Scoring and risk classification
//!
//! Pure functions shared by the analyzers and the engine. Nothing here touches
//! the network.

use crate::models::{RiskLevel, ScanResult, Severity};

/// Header scores below this count as one medium finding in the risk verdict
pub const HEADER_SCORE_MEDIUM_THRESHOLD: u8 = 50;

/// Percentage of definitions that are present and strong, rounded down.
///
/// `header_score(2, 7) == 28`.
pub fn header_score(strong: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let strong = strong.min(total);
    ((strong * 100) / total) as u8
}

/// Clamps a running score into 0..=100
pub fn clamp_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

/// Severity tally feeding the risk cascade
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeverityTally {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

impl SeverityTally {
    /// Counts injection findings plus the TLS and header posture signals
    pub fn from_result(result: &ScanResult) -> Self {
        let mut tally = Self::default();

        for vuln in result.vulnerabilities() {
            match vuln.severity {
                Severity::Critical => tally.critical += 1,
                Severity::High => tally.high += 1,
                Severity::Medium => tally.medium += 1,
                Severity::Low | Severity::Info => {}
            }
        }

        if result.tls.as_ref().is_some_and(|tls| !tls.is_secure) {
            tally.high += 1;
        }

        if result
            .headers
            .as_ref()
            .is_some_and(|h| h.score < HEADER_SCORE_MEDIUM_THRESHOLD)
        {
            tally.medium += 1;
        }

        tally
    }

    /// Strict precedence: any critical wins over any number of highs, and so on
    pub fn risk_level(&self) -> RiskLevel {
        if self.critical > 0 {
            RiskLevel::Critical
        } else if self.high > 0 {
            RiskLevel::High
        } else if self.medium > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Derives the overall risk level of a scan
pub fn calculate_risk_level(result: &ScanResult) -> RiskLevel {
    SeverityTally::from_result(result).risk_level()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeaderScan, TargetInfo, TlsScan, VulnKind, Vulnerability};

    fn target() -> TargetInfo {
        TargetInfo {
            url: "https://example.com/".into(),
            domain: "example.com".into(),
            ip: "93.184.216.34".into(),
            scheme: "https".into(),
            port: 443,
        }
    }

    fn vuln(kind: VulnKind, severity: Severity) -> Vulnerability {
        Vulnerability {
            kind,
            severity,
            location: "id".into(),
            payload: "'".into(),
            evidence: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn header_score_rounds_down() {
        assert_eq!(header_score(0, 7), 0);
        assert_eq!(header_score(2, 7), 28);
        assert_eq!(header_score(7, 7), 100);
        assert_eq!(header_score(3, 0), 0);
    }

    #[test]
    fn header_score_is_monotonic() {
        let scores: Vec<u8> = (0..=7).map(|n| header_score(n, 7)).collect();
        assert!(scores.windows(2).all(|w| w[0] < w[1]), "{scores:?}");
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-40), 0);
        assert_eq!(clamp_score(55), 55);
        assert_eq!(clamp_score(130), 100);
    }

    #[test]
    fn empty_result_is_low() {
        let result = ScanResult::new(target());
        assert_eq!(calculate_risk_level(&result), RiskLevel::Low);
    }

    #[test]
    fn one_critical_beats_many_highs() {
        let mut result = ScanResult::new(target());
        result.xss = (0..10).map(|_| vuln(VulnKind::Xss, Severity::High)).collect();
        result.sqli.push(vuln(VulnKind::Sqli, Severity::Critical));
        assert_eq!(calculate_risk_level(&result), RiskLevel::Critical);
    }

    #[test]
    fn insecure_tls_counts_as_high() {
        let mut result = ScanResult::new(target());
        result.xss = (0..5).map(|_| vuln(VulnKind::Xss, Severity::Medium)).collect();
        result.tls = Some(TlsScan {
            is_secure: false,
            ..TlsScan::default()
        });
        assert_eq!(calculate_risk_level(&result), RiskLevel::High);
    }

    #[test]
    fn weak_headers_count_as_medium() {
        let mut result = ScanResult::new(target());
        result.headers = Some(HeaderScan {
            score: 42,
            ..HeaderScan::default()
        });
        result.tls = Some(TlsScan {
            is_secure: true,
            score: 95,
            ..TlsScan::default()
        });
        assert_eq!(calculate_risk_level(&result), RiskLevel::Medium);

        result.headers = Some(HeaderScan {
            score: 50,
            ..HeaderScan::default()
        });
        assert_eq!(calculate_risk_level(&result), RiskLevel::Low);
    }

    #[test]
    fn low_findings_do_not_raise_risk() {
        let mut result = ScanResult::new(target());
        result.sqli.push(vuln(VulnKind::Sqli, Severity::Low));
        assert_eq!(calculate_risk_level(&result), RiskLevel::Low);
    }
}
