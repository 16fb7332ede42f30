pub mod tls;

pub use tls::{handle_tls_connection, TlsConnectionConfig};
