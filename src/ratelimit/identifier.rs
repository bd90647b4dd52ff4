//! Caller identifier derivation for quota buckets.

use std::net::IpAddr;

use http::HeaderMap;

/// Shared bucket used when no client address can be determined.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Derive the quota identifier for a request.
///
/// Order: first entry of `x-forwarded-for`, then `x-real-ip`, then the TCP
/// peer address, then [`ANONYMOUS_IDENTIFIER`]. All callers without any
/// address share one bucket.
pub fn client_identifier(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    match peer {
        Some(ip) => ip.to_string(),
        None => ANONYMOUS_IDENTIFIER.to_string(),
    }
}
