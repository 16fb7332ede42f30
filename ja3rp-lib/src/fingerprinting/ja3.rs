use std::fmt;

use md5::{Digest, Md5};

use super::client_hello::ClientHello;

/// MD5 of the empty string
pub const EMPTY_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Canonical string used when the ClientHello could not be parsed
pub const DEGRADED_JA3: &str = ",,,,";

/// The five ordered JA3 fields.
///
/// `version` is `None` only for a degraded capture, which renders every
/// field empty. A parsed ClientHello always carries a version, so the
/// degraded string never equals a real client's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3 {
    pub version: Option<u16>,
    pub ciphers: Vec<u16>,
    pub extensions: Vec<u16>,
    pub curves: Vec<u16>,
    pub point_formats: Vec<u8>,
}

impl Ja3 {
    pub fn from_client_hello(hello: &ClientHello) -> Self {
        Self {
            version: Some(hello.version),
            ciphers: hello.cipher_suites.clone(),
            extensions: hello.extensions.clone(),
            curves: hello.elliptic_curves.clone(),
            point_formats: hello.ec_point_formats.clone(),
        }
    }

    pub fn degraded() -> Self {
        Self {
            version: None,
            ciphers: Vec::new(),
            extensions: Vec::new(),
            curves: Vec::new(),
            point_formats: Vec::new(),
        }
    }

    pub fn digest(&self) -> String {
        ja3_digest(&self.to_string())
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for Ja3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.version.map(|v| v.to_string()).unwrap_or_default();
        write!(
            f,
            "{},{},{},{},{}",
            version,
            join(&self.ciphers),
            join(&self.extensions),
            join(&self.curves),
            join(&self.point_formats)
        )
    }
}

/// Canonical JA3 string for a capture; `None` renders [`DEGRADED_JA3`]
pub fn ja3_string(hello: Option<&ClientHello>) -> String {
    hello
        .map(Ja3::from_client_hello)
        .unwrap_or_else(Ja3::degraded)
        .to_string()
}

/// Hash a JA3 string into its 32-character lowercase hex digest
pub fn ja3_digest(ja3: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(ja3.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint computed once per connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3Fingerprint {
    /// Canonical JA3 string
    pub raw: String,
    /// MD5 of `raw`
    pub digest: String,
    /// True when the ClientHello could not be parsed
    pub degraded: bool,
}

impl Ja3Fingerprint {
    pub fn new(hello: Option<&ClientHello>) -> Self {
        let raw = ja3_string(hello);
        let digest = ja3_digest(&raw);
        Self { raw, digest, degraded: hello.is_none() }
    }
}

impl fmt::Display for Ja3Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}
