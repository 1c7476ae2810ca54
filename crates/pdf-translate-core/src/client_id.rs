//! Stable pseudo-identity for callers, used as the rate-limit key
//!
//! Proxy-supplied address headers are trusted in a fixed order. When none of
//! them carries a usable address the caller is fingerprinted from a handful of
//! request headers instead, so every request maps to some bucket.

use std::net::IpAddr;

use http::HeaderMap;
use sha2::{Digest, Sha256};

/// Address headers set by the fronting proxy, most authoritative first
pub const TRUSTED_IP_HEADERS: [&str; 3] = ["x-vercel-forwarded-for", "cf-connecting-ip", "x-real-ip"];

/// Generic forwarding header, consulted after the trusted ones
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Headers hashed into the fallback fingerprint, in order
pub const FINGERPRINT_HEADERS: [&str; 4] = ["user-agent", "accept-language", "sec-ch-ua-platform", "host"];

/// Hex characters of the SHA-256 digest kept in a fingerprint identifier
pub const FINGERPRINT_LEN: usize = 20;

/// Resolve the identifier for a request: `ip:<address>` or `fp:<digest>`
pub fn identify(headers: &HeaderMap) -> String {
    TRUSTED_IP_HEADERS
        .iter()
        .chain(std::iter::once(&FORWARDED_FOR_HEADER))
        .filter_map(|name| header_str(headers, name))
        .find_map(parse_forwarded_header)
        .map(|ip| format!("ip:{}", ip))
        .unwrap_or_else(|| fingerprint(headers))
}

/// Last valid address in a comma-separated forwarding chain.
///
/// The rightmost hop was appended by the proxy closest to us and is the
/// hardest for the caller to forge.
pub fn parse_forwarded_header(value: &str) -> Option<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .rev()
        .find_map(normalize_ip_token)
}

/// Reduce one forwarding entry to a bare address literal, if it is one.
///
/// Handles `[v6]`, `[v6]:port` and `a.b.c.d:port` forms.
pub fn normalize_ip_token(value: &str) -> Option<String> {
    let token = value.trim();
    if token.is_empty() {
        return None;
    }

    let candidate = match token.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        Some((inner, _)) => inner,
        None => token,
    };
    if candidate.parse::<IpAddr>().is_ok() {
        return Some(candidate.to_string());
    }

    if candidate.contains(':') && candidate.matches('.').count() == 3 {
        let (host, _port) = candidate.rsplit_once(':')?;
        if host.parse::<IpAddr>().is_ok() {
            return Some(host.to_string());
        }
    }

    None
}

fn fingerprint(headers: &HeaderMap) -> String {
    let joined = FINGERPRINT_HEADERS
        .iter()
        .map(|name| header_latin1(headers, name))
        .collect::<Vec<_>>()
        .join("|");

    let digest = hex::encode(Sha256::digest(joined.as_bytes()));
    format!("fp:{}", &digest[..FINGERPRINT_LEN])
}

/// Header value decoded byte-for-byte as Latin-1, so non-ASCII values stay distinct
fn header_latin1(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|value| value.as_bytes().iter().map(|&b| char::from(b)).collect())
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
