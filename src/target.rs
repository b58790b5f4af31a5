//! Target validation and resolution
//!
//! Turns user input into a [`TargetInfo`] before any probe runs.

use crate::error::{Result, VigiaError};
use crate::http::HttpClient;
use crate::models::TargetInfo;
use std::net::IpAddr;
use tracing::debug;
use url::Url;

/// Query parameter names whose values are redacted by [`sanitize_url`]
const SENSITIVE_PARAMS: &[&str] = &["token", "key", "secret", "password"];

/// Parses the raw input without touching the network.
///
/// A missing scheme defaults to `https`. Only `http` and `https` are accepted.
pub fn parse_target(raw: &str) -> Result<(Url, String, u16)> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| VigiaError::ParseError(format!("invalid URL format: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VigiaError::ParseError(format!(
                "unsupported protocol: {other} (only http/https allowed)"
            )))
        }
    }

    let domain = url
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| VigiaError::ParseError("could not extract domain from URL".to_string()))?;

    let port = url
        .port_or_known_default()
        .ok_or_else(|| VigiaError::ParseError("could not determine port".to_string()))?;

    Ok((url, domain, port))
}

/// Resolves a host to an IP address, preferring IPv4
pub async fn resolve_ip(domain: &str, port: u16) -> Result<IpAddr> {
    if let Ok(ip) = domain.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|e| VigiaError::ResolutionError(format!("{domain}: {e}")))?
        .map(|sa| sa.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| VigiaError::ResolutionError(format!("no IP addresses found for {domain}")))
}

/// Validates and resolves user input into a [`TargetInfo`]
pub async fn resolve_target(raw: &str) -> Result<TargetInfo> {
    let (url, domain, port) = parse_target(raw)?;
    let ip = resolve_ip(&domain, port).await?;
    debug!("Resolved {domain} to {ip}");

    Ok(TargetInfo {
        url: url.to_string(),
        domain,
        ip: ip.to_string(),
        scheme: url.scheme().to_string(),
        port,
    })
}

/// Checks that the target answers at all. Redirects count as reachable.
pub async fn check_reachability(client: &HttpClient, target: &TargetInfo) -> Result<()> {
    client
        .get(&target.url)
        .await
        .map(|_| ())
        .map_err(|e| VigiaError::ConnectionError(format!("target unreachable: {e}")))
}

/// Removes credentials and redacts sensitive query values for logging
pub fn sanitize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let _ = url.set_username("");
    let _ = url.set_password(None);

    if url.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let lower = k.to_lowercase();
                if SENSITIVE_PARAMS.iter().any(|s| lower.contains(s)) {
                    (k.into_owned(), "[REDACTED]".to_string())
                } else {
                    (k.into_owned(), v.into_owned())
                }
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_when_scheme_missing() {
        let (url, domain, port) = parse_target("example.com/path").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(domain, "example.com");
        assert_eq!(port, 443);
    }

    #[test]
    fn keeps_explicit_port() {
        let (_, domain, port) = parse_target("http://127.0.0.1:8080/?id=1").unwrap();
        assert_eq!(domain, "127.0.0.1");
        assert_eq!(port, 8080);
    }

    #[test]
    fn rejects_other_schemes() {
        let err = parse_target("ftp://example.com").unwrap_err();
        assert!(matches!(err, VigiaError::ParseError(_)), "{err}");
    }

    #[tokio::test]
    async fn resolves_ip_literals_without_dns() {
        let target = resolve_target("http://127.0.0.1:9000/search?q=1")
            .await
            .unwrap();
        assert_eq!(target.ip, "127.0.0.1");
        assert_eq!(target.scheme, "http");
        assert_eq!(target.port, 9000);
        assert!(!target.is_tls());
    }

    #[test]
    fn sanitize_redacts_secrets() {
        let clean = sanitize_url("https://user:pw@example.com/a?api_key=abc&q=ok");
        assert!(!clean.contains("user"));
        assert!(!clean.contains("abc"));
        assert!(clean.contains("q=ok"));
        assert!(clean.contains("api_key=%5BREDACTED%5D"));
    }
}
