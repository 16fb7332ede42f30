use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;
use crate::error::{ProxyError, Result};

/// Builds a TLS acceptor from PEM files named in the configuration
pub fn build_tls_acceptor(cfg: &TlsConfig) -> Result<TlsAcceptor> {
    let certs = {
        let bytes = std::fs::read(&cfg.cert_path)
            .map_err(|e| ProxyError::Tls(format!("Failed to read certificate: {e}")))?;
        CertificateDer::pem_slice_iter(&bytes)
            .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
            .map_err(|e| ProxyError::Tls(format!("Failed to parse certificates: {e}")))?
    };
    if certs.is_empty() {
        return Err(ProxyError::Tls(format!("No certificate found in {}", cfg.cert_path)));
    }

    let key = {
        let bytes = std::fs::read(&cfg.key_path)
            .map_err(|e| ProxyError::Tls(format!("Failed to read key: {e}")))?;
        let mut keys: Vec<PrivateKeyDer<'_>> = PrivateKeyDer::pem_slice_iter(&bytes)
            .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
            .map_err(|e| ProxyError::Tls(format!("Failed to parse private key: {e}")))?;
        let Some(k) = keys.pop() else {
            return Err(ProxyError::NoPrivateKey);
        };
        k
    };

    build_tls_acceptor_from_der(certs, key, &cfg.alpn)
}

/// Builds a TLS acceptor from an in-memory chain and key.
///
/// The crypto provider is pinned so the acceptor does not depend on a
/// process-wide default being installed.
pub fn build_tls_acceptor_from_der(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    alpn: &[String],
) -> Result<TlsAcceptor> {
    let mut server = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProxyError::Tls(format!("Failed to select TLS versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::Tls(format!("Failed to build TLS config: {e}")))?;

    server.alpn_protocols = alpn.iter().map(|s| s.as_bytes().to_vec()).collect();
    Ok(TlsAcceptor::from(Arc::new(server)))
}
