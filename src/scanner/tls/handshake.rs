//! Raw TLS handshake probing
//!
//! Sends a hand-built ClientHello and reads the server's first flight. No
//! keys are ever exchanged; the probe only learns what the server chose.

use crate::error::{Result, VigiaError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub const SSL3: u16 = 0x0300;
pub const TLS10: u16 = 0x0301;
pub const TLS11: u16 = 0x0302;
pub const TLS12: u16 = 0x0303;
pub const TLS13: u16 = 0x0304;

const CONTENT_ALERT: u8 = 0x15;
const CONTENT_HANDSHAKE: u8 = 0x16;
const CONTENT_APPLICATION_DATA: u8 = 0x17;

const HS_SERVER_HELLO: u8 = 0x02;
const HS_CERTIFICATE: u8 = 0x0B;
const HS_SERVER_HELLO_DONE: u8 = 0x0E;

const EXT_KEY_SHARE: u16 = 0x0033;

const MAX_FLIGHT: usize = 32 * 1024;

/// Broad offer used for the negotiation probe, weak suites included so the
/// server's preference is visible
const NEGOTIATION_CIPHERS: &[u16] = &[
    0x1301, // TLS_AES_128_GCM_SHA256
    0x1302, // TLS_AES_256_GCM_SHA384
    0x1303, // TLS_CHACHA20_POLY1305_SHA256
    0xC02F, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    0xC030, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    0xC02B, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
    0xC02C, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    0xCCA8, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
    0xC027, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256
    0xC028, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384
    0xC013, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    0xC014, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
    0x009C, // TLS_RSA_WITH_AES_128_GCM_SHA256
    0x009D, // TLS_RSA_WITH_AES_256_GCM_SHA384
    0x002F, // TLS_RSA_WITH_AES_128_CBC_SHA
    0x0035, // TLS_RSA_WITH_AES_256_CBC_SHA
    0xC012, // TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA
    0xC011, // TLS_ECDHE_RSA_WITH_RC4_128_SHA
    0x000A, // TLS_RSA_WITH_3DES_EDE_CBC_SHA
    0x0005, // TLS_RSA_WITH_RC4_128_SHA
];

/// Suites offered alone by the weak-cipher probe
pub const WEAK_ONLY_CIPHERS: &[u16] = &[0x0005, 0x000A];

/// Shape of one ClientHello
#[derive(Debug, Clone, Copy)]
pub struct HelloProfile {
    /// `client_version` field; also used as the record version
    pub version: u16,
    /// Sent as the supported_versions extension when present
    pub supported_versions: Option<&'static [u16]>,
    pub ciphers: &'static [u16],
}

impl HelloProfile {
    /// Lets the server pick the best it can among TLS 1.3 and 1.2
    pub const NEGOTIATE: HelloProfile = HelloProfile {
        version: TLS12,
        supported_versions: Some(&[TLS13, TLS12]),
        ciphers: NEGOTIATION_CIPHERS,
    };

    /// Offers only the given legacy protocol version
    pub const fn pinned(version: u16) -> HelloProfile {
        HelloProfile {
            version,
            supported_versions: None,
            ciphers: NEGOTIATION_CIPHERS,
        }
    }

    /// TLS 1.2 offer restricted to RC4 and 3DES suites
    pub const WEAK_CIPHERS: HelloProfile = HelloProfile {
        version: TLS12,
        supported_versions: None,
        ciphers: WEAK_ONLY_CIPHERS,
    };
}

/// What the server chose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub cipher_suite: u16,
}

/// Parsed first server flight
#[derive(Debug, Default)]
pub struct HandshakeFlight {
    pub server_hello: Option<ServerHello>,
    /// DER certificates in chain order; only visible up to TLS 1.2
    pub certificates: Vec<Vec<u8>>,
    /// Alert description byte if the server refused
    pub alert: Option<u8>,
}

/// Builds a ClientHello record for the given profile
pub fn build_client_hello(profile: &HelloProfile, hostname: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&profile.version.to_be_bytes());

    let random = [uuid::Uuid::new_v4(), uuid::Uuid::new_v4()];
    for part in &random {
        body.extend_from_slice(part.as_bytes());
    }

    // empty session id
    body.push(0);

    body.extend_from_slice(&((profile.ciphers.len() * 2) as u16).to_be_bytes());
    for suite in profile.ciphers {
        body.extend_from_slice(&suite.to_be_bytes());
    }

    // null compression only
    body.extend_from_slice(&[1, 0]);

    let extensions = build_extensions(profile, hostname);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = vec![0x01];
    push_u24(&mut handshake, body.len());
    handshake.extend_from_slice(&body);

    let record_version = profile.version.min(TLS10);
    let mut record = vec![CONTENT_HANDSHAKE];
    record.extend_from_slice(&record_version.to_be_bytes());
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

fn build_extensions(profile: &HelloProfile, hostname: Option<&str>) -> Vec<u8> {
    let mut exts = Vec::new();

    if let Some(host) = hostname {
        let host = host.as_bytes();
        let mut data = Vec::new();
        data.extend_from_slice(&((host.len() + 3) as u16).to_be_bytes());
        data.push(0x00);
        data.extend_from_slice(&(host.len() as u16).to_be_bytes());
        data.extend_from_slice(host);
        append_extension(&mut exts, 0x0000, &data);
    }

    // supported_groups: x25519, secp256r1, secp384r1
    append_extension(&mut exts, 0x000A, &u16_list(&[0x001D, 0x0017, 0x0018]));
    // ec_point_formats: uncompressed
    append_extension(&mut exts, 0x000B, &[0x01, 0x00]);
    append_extension(
        &mut exts,
        0x000D,
        &u16_list(&[0x0401, 0x0501, 0x0601, 0x0403, 0x0503, 0x0804, 0x0805, 0x0201]),
    );

    if let Some(versions) = profile.supported_versions {
        let mut data = vec![(versions.len() * 2) as u8];
        for v in versions {
            data.extend_from_slice(&v.to_be_bytes());
        }
        append_extension(&mut exts, 0x002B, &data);

        // TLS 1.3 servers reject a hello without key_share (missing_extension)
        if versions.contains(&TLS13) {
            append_extension(&mut exts, EXT_KEY_SHARE, &x25519_key_share());
        }
    }

    exts
}

/// One x25519 entry filled with random bytes; no key agreement ever happens
fn x25519_key_share() -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    for part in [uuid::Uuid::new_v4(), uuid::Uuid::new_v4()] {
        key.extend_from_slice(part.as_bytes());
    }

    let mut entry = Vec::with_capacity(4 + key.len());
    entry.extend_from_slice(&0x001Du16.to_be_bytes());
    entry.extend_from_slice(&(key.len() as u16).to_be_bytes());
    entry.extend_from_slice(&key);

    let mut data = Vec::with_capacity(2 + entry.len());
    data.extend_from_slice(&(entry.len() as u16).to_be_bytes());
    data.extend_from_slice(&entry);
    data
}

fn u16_list(values: &[u16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + values.len() * 2);
    data.extend_from_slice(&((values.len() * 2) as u16).to_be_bytes());
    for v in values {
        data.extend_from_slice(&v.to_be_bytes());
    }
    data
}

fn append_extension(buf: &mut Vec<u8>, ext_type: u16, data: &[u8]) {
    buf.extend_from_slice(&ext_type.to_be_bytes());
    buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
    buf.extend_from_slice(data);
}

fn push_u24(buf: &mut Vec<u8>, value: usize) {
    buf.push((value >> 16) as u8);
    buf.push((value >> 8) as u8);
    buf.push(value as u8);
}

fn read_u24(data: &[u8]) -> usize {
    ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | (data[2] as usize)
}

/// Iterates over (content type, payload) of every complete record
fn records(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos + 5 > data.len() {
            return None;
        }
        let content_type = data[pos];
        let len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        let end = (pos + 5 + len).min(data.len());
        let payload = &data[pos + 5..end];
        pos = end;
        Some((content_type, payload))
    })
}

/// True once the server has said everything it will say in plaintext
pub fn flight_complete(data: &[u8]) -> bool {
    let mut handshake = Vec::new();
    for (content_type, payload) in records(data) {
        match content_type {
            CONTENT_ALERT | CONTENT_APPLICATION_DATA => return true,
            CONTENT_HANDSHAKE => handshake.extend_from_slice(payload),
            _ => {}
        }
    }

    let mut pos = 0;
    while pos + 4 <= handshake.len() {
        let hs_type = handshake[pos];
        let hs_len = read_u24(&handshake[pos + 1..]);
        if hs_type == HS_SERVER_HELLO_DONE {
            return true;
        }
        if hs_type == HS_SERVER_HELLO && pos + 4 + hs_len <= handshake.len() {
            // TLS 1.3 encrypts everything after the ServerHello
            if parse_server_hello(&handshake[pos + 4..pos + 4 + hs_len])
                .is_some_and(|hello| hello.version == TLS13)
            {
                return true;
            }
        }
        pos += 4 + hs_len;
    }
    false
}

/// Parses a ServerHello body; supported_versions overrides the legacy field
pub fn parse_server_hello(body: &[u8]) -> Option<ServerHello> {
    if body.len() < 35 {
        return None;
    }

    let mut version = u16::from_be_bytes([body[0], body[1]]);
    let pos = 35 + body[34] as usize;
    if body.len() < pos + 3 {
        return None;
    }
    let cipher_suite = u16::from_be_bytes([body[pos], body[pos + 1]]);

    let mut ext_pos = pos + 3;
    if body.len() >= ext_pos + 2 {
        let ext_total = u16::from_be_bytes([body[ext_pos], body[ext_pos + 1]]) as usize;
        ext_pos += 2;
        let ext_end = (ext_pos + ext_total).min(body.len());
        while ext_pos + 4 <= ext_end {
            let ext_type = u16::from_be_bytes([body[ext_pos], body[ext_pos + 1]]);
            let ext_len = u16::from_be_bytes([body[ext_pos + 2], body[ext_pos + 3]]) as usize;
            if ext_type == 0x002B && ext_len == 2 && ext_pos + 6 <= ext_end {
                version = u16::from_be_bytes([body[ext_pos + 4], body[ext_pos + 5]]);
            }
            ext_pos += 4 + ext_len;
        }
    }

    Some(ServerHello {
        version,
        cipher_suite,
    })
}

/// Certificate message: `list_len(3) | [cert_len(3) | der]*`
fn parse_certificate_message(data: &[u8]) -> Vec<Vec<u8>> {
    let mut certs = Vec::new();
    if data.len() < 3 {
        return certs;
    }
    let end = (3 + read_u24(data)).min(data.len());
    let mut pos = 3;
    while pos + 3 <= end {
        let len = read_u24(&data[pos..]);
        pos += 3;
        let cert_end = (pos + len).min(end);
        if cert_end > pos {
            certs.push(data[pos..cert_end].to_vec());
        }
        pos = cert_end;
    }
    certs
}

/// Parses whatever plaintext the server sent back
pub fn parse_flight(data: &[u8]) -> HandshakeFlight {
    let mut flight = HandshakeFlight::default();
    let mut handshake = Vec::new();

    for (content_type, payload) in records(data) {
        match content_type {
            CONTENT_HANDSHAKE => handshake.extend_from_slice(payload),
            CONTENT_ALERT if payload.len() >= 2 => {
                flight.alert.get_or_insert(payload[1]);
            }
            _ => {}
        }
    }

    let mut pos = 0;
    while pos + 4 <= handshake.len() {
        let hs_type = handshake[pos];
        let hs_len = read_u24(&handshake[pos + 1..]);
        if pos + 4 + hs_len > handshake.len() {
            break;
        }
        let body = &handshake[pos + 4..pos + 4 + hs_len];
        match hs_type {
            HS_SERVER_HELLO => flight.server_hello = parse_server_hello(body),
            HS_CERTIFICATE => flight.certificates = parse_certificate_message(body),
            HS_SERVER_HELLO_DONE => break,
            _ => {}
        }
        pos += 4 + hs_len;
    }

    flight
}

/// Sends one ClientHello and collects the server's plaintext flight
pub async fn exchange(
    addr: SocketAddr,
    hostname: Option<&str>,
    profile: &HelloProfile,
    timeout: Duration,
) -> Result<HandshakeFlight> {
    let deadline = tokio::time::Instant::now() + timeout;

    let mut stream = tokio::time::timeout_at(deadline, TcpStream::connect(addr))
        .await
        .map_err(|_| VigiaError::TlsConnectionError(format!("connection to {addr} timed out")))?
        .map_err(|e| {
            VigiaError::TlsConnectionError(format!("connection to {addr} failed: {e}"))
        })?;

    let hello = build_client_hello(profile, hostname);
    tokio::time::timeout_at(deadline, stream.write_all(&hello))
        .await
        .map_err(|_| VigiaError::TlsConnectionError("ClientHello write timed out".to_string()))?
        .map_err(|e| VigiaError::TlsConnectionError(format!("ClientHello write failed: {e}")))?;

    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 4096];
    while buf.len() < MAX_FLIGHT {
        match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => {
                buf.extend_from_slice(&chunk[..n]);
                if flight_complete(&buf) {
                    break;
                }
            }
            Ok(Ok(_)) => break,
            Ok(Err(e)) => {
                debug!("TLS probe read failed: {e}");
                break;
            }
            Err(_) => {
                debug!("TLS probe read timed out after {} bytes", buf.len());
                break;
            }
        }
    }

    Ok(parse_flight(&buf))
}
