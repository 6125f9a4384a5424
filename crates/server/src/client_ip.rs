use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use http::request::Parts;

/// Origin used when the peer address cannot be determined.
pub(crate) const UNKNOWN_ORIGIN: &str = "unknown";

/// Derives the origin of a request for guest keying.
///
/// Forwarding headers are client-controlled, so they are only consulted when the server sits behind a trusted proxy.
pub(crate) fn origin(parts: &Parts, trust_forwarded_headers: bool) -> String {
    let forwarded = trust_forwarded_headers.then(|| forwarded_ip(parts)).flatten();

    forwarded
        .or_else(|| peer_ip(parts))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}

fn peer_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip())
}

fn forwarded_ip(parts: &Parts) -> Option<IpAddr> {
    if let Some(forwarded_for) = parts.headers.get("x-forwarded-for") {
        // Take the first IP in the chain
        let first = forwarded_for.to_str().ok()?.split(',').next()?;

        return first.trim().parse().ok();
    }

    let ip_str = parts.headers.get("x-real-ip")?.to_str().ok()?;

    ip_str.trim().parse().ok()
}
