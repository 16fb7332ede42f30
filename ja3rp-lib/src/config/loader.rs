use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::proxy::forwarding::Upstream;

/// Read and parse a TOML file without validating it, so CLI flags can be
/// layered on top first.
pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ProxyError::Config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&txt).map_err(|e| ProxyError::Config(format!("Failed to parse config: {e}")))
}

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let cfg = read_from_path(p)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.listen.trim().is_empty() {
        return Err(ProxyError::Config("listen address cannot be empty".to_string()));
    }

    if cfg.tls.cert_path.is_empty() {
        return Err(ProxyError::Config("a TLS certificate is required".to_string()));
    }
    if cfg.tls.key_path.is_empty() {
        return Err(ProxyError::Config("a TLS private key is required".to_string()));
    }
    if !Path::new(&cfg.tls.cert_path).exists() {
        return Err(ProxyError::Config(format!(
            "Certificate file not found: {}",
            cfg.tls.cert_path
        )));
    }
    if !Path::new(&cfg.tls.key_path).exists() {
        return Err(ProxyError::Config(format!("Key file not found: {}", cfg.tls.key_path)));
    }

    if let Some(destination) = &cfg.destination {
        Upstream::parse(destination)?;
    }

    if let Some(ca) = &cfg.tls.upstream_ca_path {
        if !ca.exists() {
            return Err(ProxyError::Config(format!("Upstream CA not found: {}", ca.display())));
        }
    }

    for path in [&cfg.access.blacklist, &cfg.access.whitelist].into_iter().flatten() {
        if !path.exists() {
            return Err(ProxyError::Config(format!("List file not found: {}", path.display())));
        }
    }

    if cfg.security.max_connections == 0 {
        return Err(ProxyError::Config("max_connections must be > 0".to_string()));
    }
    if cfg.fingerprint.max_capture_bytes < 512 {
        return Err(ProxyError::Config("max_capture_bytes must be at least 512".to_string()));
    }

    Ok(())
}
