use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, HOST};
use hyper::Request;
use std::net::SocketAddr;

use crate::fingerprinting::headers::{forwarded, names};
use crate::proxy::context::ConnectionFingerprint;

/// Headers that apply to a single transport hop (RFC 9110 section 7.6.1)
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Host the client addressed: the Host header, else the URI authority (HTTP/2)
pub fn inbound_host<B>(req: &Request<B>) -> Option<HeaderValue> {
    req.headers().get(HOST).cloned().or_else(|| {
        req.uri()
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    })
}

/// Add X-Forwarded-* headers to the request
///
/// 1. Appends client IP to X-Forwarded-For (or creates it if missing)
/// 2. Sets X-Forwarded-Host to the host the client addressed
/// 3. Sets X-Forwarded-Proto to "https"
pub fn add_forwarded_headers<B>(req: &mut Request<B>, peer: SocketAddr) {
    let client_ip = peer.ip().to_string();
    let forwarded_for = match req.headers().get(forwarded::FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(header_value) = HeaderValue::from_str(&forwarded_for) {
        req.headers_mut().insert(forwarded::FOR, header_value);
    }

    if let Some(host) = inbound_host(req) {
        req.headers_mut().insert(forwarded::HOST, host);
    }

    req.headers_mut()
        .insert(forwarded::PROTO, HeaderValue::from_static("https"));
}

/// Replace any client-supplied JA3 headers with the connection's own values.
pub fn inject_fingerprint_headers<B>(req: &mut Request<B>, fingerprint: &ConnectionFingerprint) {
    let headers = req.headers_mut();
    headers.remove(names::JA3_HASH);
    headers.remove(names::JA3);

    if let Ok(hv) = HeaderValue::from_str(&fingerprint.ja3.digest) {
        headers.insert(HeaderName::from_static(names::JA3_HASH), hv);
    }
    if let Ok(hv) = HeaderValue::from_str(&fingerprint.ja3.raw) {
        headers.insert(HeaderName::from_static(names::JA3), hv);
    }
}
