pub mod acceptor;
pub mod connector;

pub use acceptor::{build_tls_acceptor, build_tls_acceptor_from_der};
pub use connector::build_upstream_client_config;
