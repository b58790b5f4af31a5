//! Leaf certificate extraction

use crate::error::{Result, VigiaError};
use crate::models::CertificateInfo;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use x509_parser::prelude::*;

/// Certificates expiring within this many days cost points
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Parses a DER leaf certificate, evaluating expiry against `now`
pub fn parse_leaf(der: &[u8], now: DateTime<Utc>) -> Option<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;

    let validity = cert.validity();
    let valid_from = DateTime::from_timestamp(validity.not_before.timestamp(), 0)?;
    let valid_to = DateTime::from_timestamp(validity.not_after.timestamp(), 0)?;
    let days_to_expiry = (valid_to - now).num_hours() / 24;

    Some(CertificateInfo {
        issuer: cert.issuer().to_string(),
        subject: cert.subject().to_string(),
        valid_from,
        valid_to,
        is_expired: now > valid_to,
        days_to_expiry,
    })
}

/// Completes a real handshake without verification and returns the peer's
/// leaf certificate in DER form.
///
/// Needed for TLS 1.3 where the Certificate message is encrypted.
pub async fn fetch_leaf_der(
    addr: SocketAddr,
    domain: &str,
    timeout: Duration,
) -> Result<Option<Vec<u8>>> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let leaf = tokio::time::timeout(timeout, leaf_der(&connector, addr, domain))
        .await
        .map_err(|_| {
            VigiaError::TlsConnectionError("certificate handshake timed out".to_string())
        })??;
    debug!("Fetched leaf certificate from {addr}: {}", leaf.is_some());
    Ok(leaf)
}

async fn leaf_der(
    connector: &tokio_native_tls::TlsConnector,
    addr: SocketAddr,
    domain: &str,
) -> Result<Option<Vec<u8>>> {
    let tcp = TcpStream::connect(addr).await?;
    let stream = connector.connect(domain, tcp).await?;
    match stream.get_ref().peer_certificate()? {
        Some(cert) => Ok(Some(cert.to_der()?)),
        None => Ok(None),
    }
}
