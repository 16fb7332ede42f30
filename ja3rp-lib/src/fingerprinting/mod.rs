pub mod capture;
pub mod client_hello;
pub mod grease;
pub mod headers;
pub mod ja3;

pub use capture::{read_client_hello, DEFAULT_MAX_CAPTURE};
pub use client_hello::{parse_client_hello, ClientHello, ParseError};
pub use headers::{forwarded, names};
pub use ja3::{ja3_digest, ja3_string, Ja3, Ja3Fingerprint, DEGRADED_JA3, EMPTY_DIGEST};
