//! Core data models for the vigia probe engine

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Resolved scan target, produced once by [`crate::target::resolve_target`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetInfo {
    /// Canonical URL including any query string
    pub url: String,
    /// Host name (or IP literal) extracted from the URL
    pub domain: String,
    /// Resolved IP address
    pub ip: String,
    /// `http` or `https`
    pub scheme: String,
    /// Explicit or scheme-default port
    pub port: u16,
}

impl TargetInfo {
    /// Returns true when the target speaks TLS
    pub fn is_tls(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }
}

/// Severity level for findings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Outcome of evaluating one security header
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HeaderStatus {
    Missing,
    Weak,
    Present,
}

/// One evaluated security header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityHeader {
    pub name: String,
    /// Observed value, empty when the header is absent
    pub value: String,
    pub status: HeaderStatus,
    pub severity: Severity,
    pub description: String,
}

/// Result of the header analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderScan {
    /// Every response header, multi-valued headers joined with "; "
    pub headers: BTreeMap<String, String>,
    pub missing: Vec<SecurityHeader>,
    pub weak: Vec<SecurityHeader>,
    pub present: Vec<SecurityHeader>,
    /// 0-100
    pub score: u8,
}

/// Leaf certificate details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateInfo {
    pub issuer: String,
    pub subject: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_expired: bool,
    /// Negative once the certificate has expired
    pub days_to_expiry: i64,
}

/// Result of the TLS analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsScan {
    pub protocol: String,
    pub cipher_suite: String,
    /// Omitted when the server presented no leaf certificate
    pub certificate: Option<CertificateInfo>,
    pub vulnerabilities: Vec<String>,
    /// 0-100
    pub score: u8,
    pub is_secure: bool,
}

/// Injection vulnerability class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VulnKind {
    Sqli,
    Xss,
}

impl fmt::Display for VulnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VulnKind::Sqli => write!(f, "SQL Injection"),
            VulnKind::Xss => write!(f, "XSS"),
        }
    }
}

/// A detected injection vulnerability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vulnerability {
    pub kind: VulnKind,
    pub severity: Severity,
    /// Parameter name, "URL Path" or "DOM"
    pub location: String,
    pub payload: String,
    pub evidence: String,
    pub description: String,
}

/// An open port reported by the port probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub number: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    pub version: String,
}

/// Result of the external port probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortScan {
    pub open_ports: Vec<Port>,
    pub duration_ms: u64,
}

/// Overall scan verdict
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Failure taxonomy recorded in [`ScanResult::errors`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    TlsConnection,
    Parse,
    TimeoutExceeded,
    ToolUnavailable,
    Other,
}

/// A probe unit that failed or did not finish in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeFailure {
    /// Module name, or "scan" for orchestration-level failures
    pub module: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of a complete scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Unique scan identifier
    pub scan_id: String,
    pub target: TargetInfo,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub ports: Option<PortScan>,
    pub headers: Option<HeaderScan>,
    pub tls: Option<TlsScan>,
    pub sqli: Vec<Vulnerability>,
    pub xss: Vec<Vulnerability>,
    pub errors: Vec<ProbeFailure>,
    /// Total HTTP requests issued by the analyzers
    pub total_requests: u64,
    pub risk_level: RiskLevel,
}

impl ScanResult {
    /// Creates a new, empty ScanResult stamped with the current time
    pub fn new(target: TargetInfo) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            target,
            started_at: Local::now(),
            finished_at: None,
            ports: None,
            headers: None,
            tls: None,
            sqli: Vec::new(),
            xss: Vec::new(),
            errors: Vec::new(),
            total_requests: 0,
            risk_level: RiskLevel::Low,
        }
    }

    /// Iterates over every injection finding
    pub fn vulnerabilities(&self) -> impl Iterator<Item = &Vulnerability> {
        self.sqli.iter().chain(self.xss.iter())
    }

    /// Returns count of injection findings by severity
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.vulnerabilities()
            .filter(|v| v.severity == severity)
            .count()
    }

    /// Returns true when the scan has an error of the given kind
    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Stamps the end time and derives the risk level. Called once by the engine.
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
        self.risk_level = crate::scoring::calculate_risk_level(self);
    }
}

/// Probe categories that can be toggled individually
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeCategory {
    Ports,
    Headers,
    Tls,
    Sqli,
    Xss,
}

impl ProbeCategory {
    pub const ALL: [ProbeCategory; 5] = [
        ProbeCategory::Ports,
        ProbeCategory::Headers,
        ProbeCategory::Tls,
        ProbeCategory::Sqli,
        ProbeCategory::Xss,
    ];

    /// Parses a module name as used on the command line and in config files
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ports" | "nmap" => Some(ProbeCategory::Ports),
            "headers" => Some(ProbeCategory::Headers),
            "tls" | "ssl" => Some(ProbeCategory::Tls),
            "sqli" => Some(ProbeCategory::Sqli),
            "xss" => Some(ProbeCategory::Xss),
            _ => None,
        }
    }
}

/// Configuration for a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    #[serde(default)]
    pub skip_ports: bool,
    #[serde(default)]
    pub skip_headers: bool,
    #[serde(default)]
    pub skip_tls: bool,
    #[serde(default)]
    pub skip_sqli: bool,
    #[serde(default)]
    pub skip_xss: bool,
    /// Global deadline for the whole scan, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept invalid certificates on HTTP probes (the TLS analyzer never verifies)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Port scanner binary looked up on PATH
    #[serde(default = "default_nmap_binary")]
    pub nmap_binary: String,
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_request_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    "Vigia-Scanner/0.1.0".to_string()
}

fn default_nmap_binary() -> String {
    "nmap".to_string()
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip_ports: false,
            skip_headers: false,
            skip_tls: false,
            skip_sqli: false,
            skip_xss: false,
            timeout_ms: default_timeout_ms(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
            accept_invalid_certs: false,
            nmap_binary: default_nmap_binary(),
        }
    }
}

impl ScanOptions {
    /// Global scan deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a category survives the skip flags
    pub fn is_enabled(&self, category: ProbeCategory) -> bool {
        match category {
            ProbeCategory::Ports => !self.skip_ports,
            ProbeCategory::Headers => !self.skip_headers,
            ProbeCategory::Tls => !self.skip_tls,
            ProbeCategory::Sqli => !self.skip_sqli,
            ProbeCategory::Xss => !self.skip_xss,
        }
    }

    /// Sets the skip flag for a category
    pub fn set_skipped(&mut self, category: ProbeCategory, skipped: bool) {
        match category {
            ProbeCategory::Ports => self.skip_ports = skipped,
            ProbeCategory::Headers => self.skip_headers = skipped,
            ProbeCategory::Tls => self.skip_tls = skipped,
            ProbeCategory::Sqli => self.skip_sqli = skipped,
            ProbeCategory::Xss => self.skip_xss = skipped,
        }
    }
}
