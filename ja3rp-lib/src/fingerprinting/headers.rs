/// HTTP header names for fingerprint injection
pub mod names {
    /// MD5 digest of the connection's JA3 string.
    ///
    /// Sent upstream only when `fingerprint_header` is enabled.
    pub const JA3_HASH: &str = "x-ja3-hash";

    /// Canonical JA3 string, sent alongside [`JA3_HASH`]
    pub const JA3: &str = "x-ja3";
}

/// HTTP header names for X-Forwarded-* headers
///
/// Injected by the proxy to inform the upstream about the original client request.
pub mod forwarded {
    /// Client IP address(es) in a comma-separated list.
    /// Each proxy in the chain appends the address it received the request from.
    pub const FOR: &str = "x-forwarded-for";

    /// Original Host header value from the client request.
    pub const HOST: &str = "x-forwarded-host";

    /// Protocol used by the client; always "https" here.
    pub const PROTO: &str = "x-forwarded-proto";
}
