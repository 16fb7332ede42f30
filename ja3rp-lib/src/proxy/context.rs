use std::net::SocketAddr;
use std::sync::Arc;

use hyper::Request;

use crate::fingerprinting::Ja3Fingerprint;

/// Fingerprint data shared by every request on one TLS connection.
///
/// Built once after the handshake succeeds and attached to each request's
/// extensions before any handler runs.
#[derive(Debug, Clone)]
pub struct ConnectionFingerprint {
    pub ja3: Ja3Fingerprint,
    /// Version rustls negotiated, e.g. `TLSv1_3`
    pub negotiated_version: Option<String>,
    /// SNI offered in the ClientHello
    pub server_name: Option<String>,
    pub peer: SocketAddr,
}

impl ConnectionFingerprint {
    pub fn digest(&self) -> &str {
        &self.ja3.digest
    }
}

pub fn bind<B>(req: &mut Request<B>, fingerprint: &Arc<ConnectionFingerprint>) {
    req.extensions_mut().insert(Arc::clone(fingerprint));
}

pub fn fingerprint<B>(req: &Request<B>) -> Option<&Arc<ConnectionFingerprint>> {
    req.extensions().get::<Arc<ConnectionFingerprint>>()
}

/// Digest of the connection the request arrived on
pub fn digest<B>(req: &Request<B>) -> Option<&str> {
    fingerprint(req).map(|f| f.digest())
}
