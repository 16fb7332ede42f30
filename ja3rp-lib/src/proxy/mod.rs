use bytes::Bytes;
use http_body_util::combinators::BoxBody;

pub mod connection;
pub mod context;
pub mod forwarding;
pub mod handler;
pub mod http_result;
pub mod router;
pub mod server;
pub mod synthetic_response;
pub mod transport;

/// Response body used throughout the proxy
pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub use context::{digest, fingerprint, ConnectionFingerprint};
pub use forwarding::{Forwarder, Upstream};
pub use http_result::HttpError;
pub use router::{Handler, Lookup, Mux};
pub use server::{run, signal_shutdown, Server, ServerOptions};
