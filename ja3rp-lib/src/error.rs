use thiserror::Error;

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("No private key found in key file")]
    NoPrivateKey,

    #[error("Failed to load fingerprint list {path}: {source}")]
    List {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Alias used by request-path helpers that build synthetic responses
pub type ProxyResult<T> = Result<T>;
