use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{ProxyError, Result};

/// Client config trusting only the PEM certificates in `ca_path`, for
/// `https://` upstreams behind a private CA.
pub fn build_upstream_client_config(ca_path: &Path) -> Result<Arc<ClientConfig>> {
    let bytes = std::fs::read(ca_path)
        .map_err(|e| ProxyError::Tls(format!("Failed to read upstream CA: {e}")))?;
    let certs = CertificateDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
        .map_err(|e| ProxyError::Tls(format!("Failed to parse upstream CA: {e}")))?;
    if certs.is_empty() {
        return Err(ProxyError::Tls(format!("No certificate found in {}", ca_path.display())));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| ProxyError::Tls(format!("Invalid upstream CA certificate: {e}")))?;
    }

    let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProxyError::Tls(format!("Failed to select TLS versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
