use serde::Deserialize;
use std::path::PathBuf;

/// TLS termination configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    /// Required; may come from the CLI instead of the file
    #[serde(default)]
    pub cert_path: String,
    /// Path to TLS private key file (PEM format)
    #[serde(default)]
    pub key_path: String,
    /// Application-Layer Protocol Negotiation (ALPN) protocols
    /// Default: ["h2", "http/1.1"]
    #[serde(default = "default_alpn")]
    pub alpn: Vec<String>,
    /// PEM bundle trusted for `https://` destinations instead of the
    /// platform roots
    #[serde(default)]
    pub upstream_ca_path: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: String::new(),
            key_path: String::new(),
            alpn: default_alpn(),
            upstream_ca_path: None,
        }
    }
}

/// Digest list files
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    /// Digests always rejected
    #[serde(default)]
    pub blacklist: Option<PathBuf>,
    /// When non-empty, only these digests are accepted
    #[serde(default)]
    pub whitelist: Option<PathBuf>,
}

/// JA3 capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FingerprintConfig {
    /// Send `x-ja3-hash` and `x-ja3` to the upstream
    /// Default: false
    #[serde(default)]
    pub header: bool,
    /// Upper bound on bytes buffered while waiting for the ClientHello
    /// Default: 65536
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self { header: false, max_capture_bytes: default_max_capture_bytes() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Maximum concurrent client connections
    /// Default: 1024
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { max_connections: default_max_connections() }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Time allowed for the client to send its ClientHello, in milliseconds
    /// Default: 10000
    #[serde(default = "default_client_hello_timeout")]
    pub client_hello_ms: u64,
    /// TLS handshake timeout in milliseconds
    /// Default: 10000
    #[serde(default = "default_tls_handshake_timeout")]
    pub tls_handshake_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_hello_ms: default_client_hello_timeout(),
            tls_handshake_ms: default_tls_handshake_timeout(),
            shutdown_secs: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// Port for `/metrics` and `/health`; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Default: "localhost:8080"
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub tls: TlsConfig,
    /// Absolute `http://` or `https://` URL of the upstream; when unset the proxy answers
    /// accepted requests itself with the client's digest
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tls: TlsConfig::default(),
            destination: None,
            access: AccessConfig::default(),
            fingerprint: FingerprintConfig::default(),
            security: SecurityConfig::default(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "localhost:8080".to_string()
}

fn default_alpn() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}

fn default_max_capture_bytes() -> usize {
    64 * 1024
}

fn default_max_connections() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_client_hello_timeout() -> u64 {
    10_000
}

fn default_tls_handshake_timeout() -> u64 {
    10_000
}

fn default_shutdown_timeout() -> u64 {
    30
}
