//! ClientHello decoding on top of `tls-parser`.
//!
//! Works on the raw bytes read from the socket before the TLS engine sees
//! them, so every list keeps the order the client transmitted it in.
//! Handshake messages split over several records are reassembled here;
//! `tls-parser` then decodes the message and the extensions we need.

use thiserror::Error;
use tls_parser::nom::multi::length_data;
use tls_parser::nom::number::streaming::be_u16;
use tls_parser::nom::sequence::tuple;
use tls_parser::nom::{Err as NomErr, IResult};
use tls_parser::{
    parse_tls_extension, parse_tls_message_handshake, parse_tls_raw_record, SNIType,
    TlsExtension, TlsMessage, TlsMessageHandshake, TlsRecordType,
};

use super::grease::{is_grease, strip_grease};

const HANDSHAKE_HEADER_LEN: usize = 4;

/// Upper bound for a TLS plaintext fragment (2^14) plus slack for
/// implementations that pad the record.
pub const MAX_RECORD_LEN: usize = 16384 + 2048;

pub const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
pub const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;

/// Extension type codes decoded by the parser
pub mod extension {
    pub const SERVER_NAME: u16 = 0x0000;
    pub const SUPPORTED_GROUPS: u16 = 0x000a;
    pub const EC_POINT_FORMATS: u16 = 0x000b;
    pub const ALPN: u16 = 0x0010;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("truncated ClientHello: {0}")]
    Truncated(&'static str),

    #[error("not a TLS handshake record (content type 0x{0:02x})")]
    NotHandshake(u8),

    #[error("not a ClientHello (handshake type 0x{0:02x})")]
    NotClientHello(u8),

    #[error("SSLv2-compatible ClientHello is not supported")]
    Sslv2,

    #[error("malformed ClientHello: {0}")]
    Malformed(&'static str),
}

impl ParseError {
    /// More bytes from the socket could still turn this into a valid parse
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Truncated(_))
    }
}

/// Negotiable parameters of a single ClientHello, in transmission order.
///
/// GREASE values are already removed from `cipher_suites`, `extensions` and
/// `elliptic_curves`. Nothing else is sorted or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Version from the first record header
    pub record_version: u16,
    /// `legacy_version` offered in the ClientHello body
    pub version: u16,
    pub cipher_suites: Vec<u16>,
    pub extensions: Vec<u16>,
    /// Named groups from supported_groups (0x000a)
    pub elliptic_curves: Vec<u16>,
    /// Formats from ec_point_formats (0x000b)
    pub ec_point_formats: Vec<u8>,
    pub server_name: Option<String>,
    pub alpn_protocols: Vec<String>,
    /// Number of GREASE values dropped across all lists
    pub grease_count: usize,
}

/// Check the content type before `tls-parser` waits on a bogus length.
fn check_record_start(raw: &[u8]) -> Result<(), ParseError> {
    let Some(&first) = raw.first() else {
        return Err(ParseError::Truncated("record header"));
    };
    // SSLv2 record: high bit of the first length byte set, msg type 1
    if first & 0x80 != 0 {
        return match raw.get(2) {
            None => Err(ParseError::Truncated("record header")),
            Some(&HANDSHAKE_TYPE_CLIENT_HELLO) => Err(ParseError::Sslv2),
            Some(_) => Err(ParseError::NotHandshake(first)),
        };
    }
    if first != CONTENT_TYPE_HANDSHAKE {
        return Err(ParseError::NotHandshake(first));
    }
    Ok(())
}

/// Reassemble the first handshake message from one or more handshake records.
///
/// Returns the handshake message (header included) and the record-layer
/// version of the first record.
fn first_handshake_message(raw: &[u8]) -> Result<(Vec<u8>, u16), ParseError> {
    let mut message = Vec::new();
    let mut record_version = None;
    let mut rest = raw;

    loop {
        if let Some(needed) = needed_message_len(&message) {
            if message.len() >= needed {
                message.truncate(needed);
                let version = record_version.ok_or(ParseError::Truncated("record header"))?;
                return Ok((message, version));
            }
        }

        check_record_start(rest)?;
        let (next, record) = parse_tls_raw_record(rest).map_err(|e| match e {
            NomErr::Incomplete(_) => ParseError::Truncated("record fragment"),
            _ => ParseError::Malformed("record header"),
        })?;

        if record.hdr.record_type != TlsRecordType::Handshake {
            return Err(ParseError::NotHandshake(record.hdr.record_type.0));
        }
        if record.hdr.version.0 >> 8 != 0x03 {
            return Err(ParseError::Malformed("record version"));
        }
        let len = usize::from(record.hdr.len);
        if len == 0 || len > MAX_RECORD_LEN {
            return Err(ParseError::Malformed("record length"));
        }
        record_version.get_or_insert(record.hdr.version.0);

        message.extend_from_slice(record.data);
        rest = next;
    }
}

fn needed_message_len(message: &[u8]) -> Option<usize> {
    if message.len() < HANDSHAKE_HEADER_LEN {
        return None;
    }
    let body_len = u32::from_be_bytes([0, message[1], message[2], message[3]]) as usize;
    Some(HANDSHAKE_HEADER_LEN.saturating_add(body_len))
}

/// One extension as framed on the wire: type and opaque body
fn raw_extension(i: &[u8]) -> IResult<&[u8], (u16, &[u8])> {
    tuple((be_u16, length_data(be_u16)))(i)
}

/// Parse the ClientHello at the start of `raw`.
///
/// `raw` starts at the first TLS record header. Bytes after the ClientHello
/// (further records) are ignored. `ParseError::Truncated` means the input
/// ended early and more data could complete it.
pub fn parse_client_hello(raw: &[u8]) -> Result<ClientHello, ParseError> {
    let (message, record_version) = first_handshake_message(raw)?;

    if message[0] != HANDSHAKE_TYPE_CLIENT_HELLO {
        return Err(ParseError::NotClientHello(message[0]));
    }

    // The message is complete, so running out of bytes inside it is malformed
    let (_, parsed) = parse_tls_message_handshake(&message)
        .map_err(|_| ParseError::Malformed("client_hello"))?;
    let TlsMessage::Handshake(TlsMessageHandshake::ClientHello(ch)) = parsed else {
        return Err(ParseError::NotClientHello(message[0]));
    };

    if ch.comp.is_empty() {
        return Err(ParseError::Malformed("compression_methods"));
    }
    // version, random, then three length-prefixed vectors and the extensions
    let consumed = [
        2 + 32,
        1 + ch.session_id.map_or(0, <[u8]>::len),
        2 + 2 * ch.ciphers.len(),
        1 + ch.comp.len(),
        ch.ext.map_or(0, |e| 2 + e.len()),
    ]
    .iter()
    .sum::<usize>();
    if consumed != message.len() - HANDSHAKE_HEADER_LEN {
        return Err(ParseError::Malformed("trailing data after extensions"));
    }

    let raw_ciphers: Vec<u16> = ch.ciphers.iter().map(|c| c.0).collect();
    let mut grease_count = raw_ciphers.iter().filter(|c| is_grease(**c)).count();

    let mut hello = ClientHello {
        record_version,
        version: ch.version.0,
        cipher_suites: strip_grease(raw_ciphers),
        extensions: Vec::new(),
        elliptic_curves: Vec::new(),
        ec_point_formats: Vec::new(),
        server_name: None,
        alpn_protocols: Vec::new(),
        grease_count: 0,
    };

    // The extensions block is optional for pre-TLS 1.3 clients
    let mut rest = ch.ext.unwrap_or_default();
    while !rest.is_empty() {
        let (next, (ext_type, _body)) =
            raw_extension(rest).map_err(|_| ParseError::Malformed("extension body"))?;
        let framed = &rest[..rest.len() - next.len()];
        rest = next;

        if is_grease(ext_type) {
            grease_count = grease_count.saturating_add(1);
            continue;
        }
        hello.extensions.push(ext_type);

        match ext_type {
            extension::SUPPORTED_GROUPS => match parse_tls_extension(framed) {
                Ok((_, TlsExtension::EllipticCurves(groups))) => {
                    let groups: Vec<u16> = groups.iter().map(|g| g.0).collect();
                    grease_count = grease_count
                        .saturating_add(groups.iter().filter(|g| is_grease(**g)).count());
                    hello.elliptic_curves = strip_grease(groups);
                }
                _ => return Err(ParseError::Malformed("supported_groups")),
            },
            extension::EC_POINT_FORMATS => match parse_tls_extension(framed) {
                Ok((_, TlsExtension::EcPointFormats(formats))) => {
                    hello.ec_point_formats = formats.to_vec();
                }
                _ => return Err(ParseError::Malformed("ec_point_formats")),
            },
            // Decoded for logging only; a body tls-parser rejects is ignored
            extension::SERVER_NAME => {
                if let Ok((_, TlsExtension::SNI(names))) = parse_tls_extension(framed) {
                    hello.server_name = names
                        .iter()
                        .find(|(kind, _)| *kind == SNIType::HostName)
                        .and_then(|(_, name)| std::str::from_utf8(name).ok())
                        .map(str::to_string);
                }
            }
            extension::ALPN => {
                if let Ok((_, TlsExtension::ALPN(protocols))) = parse_tls_extension(framed) {
                    hello.alpn_protocols = protocols
                        .iter()
                        .map(|p| String::from_utf8_lossy(p).into_owned())
                        .collect();
                }
            }
            _ => {}
        }
    }

    hello.grease_count = grease_count;
    Ok(hello)
}
