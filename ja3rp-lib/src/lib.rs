#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod fingerprinting;
pub mod proxy;
pub mod security;
pub mod telemetry;
pub mod tls;

pub use config::{load_from_path, Config, TlsConfig};
pub use error::{ProxyError, Result};
pub use fingerprinting::{forwarded, names, read_client_hello, Ja3Fingerprint};
pub use proxy::{
    digest, fingerprint, run, ConnectionFingerprint, Handler, Mux, Server, ServerOptions,
};
pub use security::AccessList;
pub use tls::build_tls_acceptor;
