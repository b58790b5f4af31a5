//! TLS/SSL analysis module
//!
//! One negotiation handshake decides the protocol and cipher; three pinned
//! handshakes then check for SSLv3, TLS 1.0 and RC4/3DES-only support.

pub mod certificate;
pub mod handshake;

use crate::error::{Result, VigiaError};
use crate::models::{CertificateInfo, ProbeCategory, TargetInfo, TlsScan};
use crate::scoring::clamp_score;
use async_trait::async_trait;
use chrono::Utc;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

use self::certificate::EXPIRY_WARNING_DAYS;
use self::handshake::{HelloProfile, ServerHello, SSL3, TLS10, TLS11, TLS12, TLS13};
use super::{ProbeContext, ProbeOutput};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Suites counted as weak when negotiated: RC4, 3DES and CBC with RSA key exchange
const WEAK_CIPHERS: &[u16] = &[0x0005, 0x000A, 0x002F, 0x0035, 0xC012, 0xC011];

/// Analyzes TLS protocol, cipher and certificate posture
pub struct TlsAnalyzer {
    handshake_timeout: Duration,
}

impl Default for TlsAnalyzer {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl TlsAnalyzer {
    pub fn with_handshake_timeout(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

/// Which legacy configurations the server accepted when offered alone
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySupport {
    pub sslv3: bool,
    pub tls10: bool,
    pub weak_ciphers: bool,
}

pub fn protocol_name(version: u16) -> String {
    match version {
        SSL3 => "SSLv3".to_string(),
        TLS10 => "TLS 1.0".to_string(),
        TLS11 => "TLS 1.1".to_string(),
        TLS12 => "TLS 1.2".to_string(),
        TLS13 => "TLS 1.3".to_string(),
        other => format!("0x{other:04X}"),
    }
}

pub fn cipher_name(suite: u16) -> String {
    let name = match suite {
        0x0005 => "TLS_RSA_WITH_RC4_128_SHA",
        0x000A => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        0x002F => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0x009C => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009D => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0xC011 => "TLS_ECDHE_RSA_WITH_RC4_128_SHA",
        0xC012 => "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA",
        0xC013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xC014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0xC027 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        0xC028 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
        0xC02B => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xC02C => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xC02F => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xC030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xCCA8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        other => return format!("0x{other:04X}"),
    };
    name.to_string()
}

pub fn is_weak_cipher(suite: u16) -> bool {
    WEAK_CIPHERS.contains(&suite)
}

/// Result for targets that do not speak TLS at all
pub fn not_https() -> TlsScan {
    TlsScan {
        is_secure: false,
        score: 0,
        vulnerabilities: vec!["Target is not using HTTPS".to_string()],
        ..TlsScan::default()
    }
}

/// Scores the negotiated configuration, starting from 100
pub fn grade(
    negotiated: ServerHello,
    certificate: Option<CertificateInfo>,
    legacy: LegacySupport,
) -> TlsScan {
    let mut score: i32 = 100;
    let mut secure = true;
    let mut vulnerabilities = Vec::new();
    let protocol = protocol_name(negotiated.version);
    let cipher_suite = cipher_name(negotiated.cipher_suite);

    if let Some(cert) = &certificate {
        if cert.is_expired {
            vulnerabilities.push("Certificate has expired".to_string());
            score -= 50;
            secure = false;
        } else if cert.days_to_expiry < EXPIRY_WARNING_DAYS {
            vulnerabilities.push(format!(
                "Certificate expires soon ({} days)",
                cert.days_to_expiry
            ));
            score -= 10;
        }
    }

    if negotiated.version < TLS12 {
        vulnerabilities.push(format!(
            "Outdated TLS version: {protocol} (TLS 1.2+ recommended)"
        ));
        score -= 30;
        secure = false;
    } else if negotiated.version == TLS12 {
        vulnerabilities.push("TLS 1.2 is acceptable but TLS 1.3 is recommended".to_string());
        score -= 5;
    }

    if is_weak_cipher(negotiated.cipher_suite) {
        vulnerabilities.push(format!("Weak cipher suite: {cipher_suite}"));
        score -= 20;
        secure = false;
    }

    let legacy_findings = [
        (legacy.sslv3, "SSLv3 supported (POODLE vulnerability)"),
        (legacy.tls10, "TLS 1.0 supported (BEAST vulnerability)"),
        (legacy.weak_ciphers, "Weak cipher suites supported"),
    ];
    for (supported, message) in legacy_findings {
        if supported {
            vulnerabilities.push(message.to_string());
            score -= 10;
            secure = false;
        }
    }

    TlsScan {
        protocol,
        cipher_suite,
        certificate,
        vulnerabilities,
        score: clamp_score(score),
        is_secure: secure,
    }
}

/// Remediation advice for a TLS result
pub fn recommendations(scan: &TlsScan) -> Vec<String> {
    let mut recs = Vec::new();

    if !scan.is_secure {
        recs.push("Upgrade to TLS 1.3 for best security".to_string());
    }
    if scan.protocol == "TLS 1.0" || scan.protocol == "TLS 1.1" || scan.protocol == "SSLv3" {
        recs.push("Disable TLS 1.0 and 1.1 (known vulnerabilities)".to_string());
    }
    if let Some(cert) = &scan.certificate {
        if cert.is_expired {
            recs.push("Renew SSL certificate immediately".to_string());
        } else if cert.days_to_expiry < EXPIRY_WARNING_DAYS {
            recs.push("Plan certificate renewal soon".to_string());
        }
    }
    if !scan.vulnerabilities.is_empty() {
        recs.push("Address identified TLS vulnerabilities".to_string());
        recs.push("Consider using Mozilla SSL Configuration Generator".to_string());
    }

    recs
}

impl TlsAnalyzer {
    /// A pinned handshake counts only if the server picked what was offered
    async fn accepts(
        &self,
        addr: SocketAddr,
        sni: Option<&str>,
        profile: HelloProfile,
        accepted: impl Fn(ServerHello) -> bool,
    ) -> bool {
        match handshake::exchange(addr, sni, &profile, self.handshake_timeout).await {
            Ok(flight) => flight.server_hello.is_some_and(accepted),
            Err(e) => {
                debug!("Legacy probe failed: {e}");
                false
            }
        }
    }

    async fn legacy_support(&self, addr: SocketAddr, sni: Option<&str>) -> LegacySupport {
        let (sslv3, tls10, weak_ciphers) = tokio::join!(
            self.accepts(addr, sni, HelloProfile::pinned(SSL3), |h| h.version == SSL3),
            self.accepts(addr, sni, HelloProfile::pinned(TLS10), |h| h.version == TLS10),
            self.accepts(addr, sni, HelloProfile::WEAK_CIPHERS, |h| {
                handshake::WEAK_ONLY_CIPHERS.contains(&h.cipher_suite)
            }),
        );
        LegacySupport {
            sslv3,
            tls10,
            weak_ciphers,
        }
    }

    async fn leaf_certificate(
        &self,
        addr: SocketAddr,
        domain: &str,
        negotiated: ServerHello,
        chain: &[Vec<u8>],
    ) -> Option<CertificateInfo> {
        let der = match chain.first() {
            Some(der) => Some(der.clone()),
            None if negotiated.version == TLS13 => {
                match certificate::fetch_leaf_der(addr, domain, self.handshake_timeout).await {
                    Ok(der) => der,
                    Err(e) => {
                        warn!("Could not fetch certificate: {e}");
                        None
                    }
                }
            }
            None => None,
        };
        der.and_then(|der| certificate::parse_leaf(&der, Utc::now()))
    }
}

#[async_trait]
impl super::Analyzer for TlsAnalyzer {
    fn name(&self) -> &str {
        "tls"
    }

    fn description(&self) -> &str {
        "Analyzes TLS protocol version, cipher suite, certificate expiry and legacy protocol support"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Tls
    }

    fn label(&self) -> &str {
        "TLS/SSL"
    }

    async fn run(&self, target: &TargetInfo, _ctx: &ProbeContext) -> Result<ProbeOutput> {
        if !target.is_tls() {
            info!("Target uses {}, skipping TLS handshake", target.scheme);
            return Ok(ProbeOutput::Tls(not_https()));
        }

        let ip: IpAddr = target
            .ip
            .parse()
            .map_err(|_| VigiaError::ParseError(format!("invalid target IP: {}", target.ip)))?;
        let addr = SocketAddr::new(ip, target.port);
        // SNI must not carry IP literals
        let sni = target
            .domain
            .parse::<IpAddr>()
            .is_err()
            .then_some(target.domain.as_str());

        let flight =
            handshake::exchange(addr, sni, &HelloProfile::NEGOTIATE, self.handshake_timeout)
                .await?;
        let negotiated = match (flight.server_hello, flight.alert) {
            (Some(hello), _) => hello,
            (None, Some(alert)) => {
                return Err(VigiaError::TlsConnectionError(format!(
                    "server refused handshake (alert {alert})"
                )))
            }
            (None, None) => {
                return Err(VigiaError::TlsConnectionError(
                    "no ServerHello received".to_string(),
                ))
            }
        };
        debug!(
            "Negotiated {} with {}",
            protocol_name(negotiated.version),
            cipher_name(negotiated.cipher_suite)
        );

        let (certificate, legacy) = tokio::join!(
            self.leaf_certificate(addr, &target.domain, negotiated, &flight.certificates),
            self.legacy_support(addr, sni),
        );

        let scan = grade(negotiated, certificate, legacy);
        info!(
            "TLS: {} / {}, score {}/100, {}",
            scan.protocol,
            scan.cipher_suite,
            scan.score,
            if scan.is_secure { "secure" } else { "insecure" }
        );
        Ok(ProbeOutput::Tls(scan))
    }
}
