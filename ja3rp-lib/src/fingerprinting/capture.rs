use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::debug;

use super::client_hello::{parse_client_hello, ClientHello};
use crate::telemetry::Metrics;

/// Default cap on bytes buffered while waiting for a complete ClientHello
pub const DEFAULT_MAX_CAPTURE: usize = 64 * 1024;

/// Reads the TLS ClientHello from the stream without interpreting anything else.
///
/// Returns every byte consumed from the socket so the caller can replay them
/// into the TLS engine, plus the parsed ClientHello. A malformed or
/// oversized ClientHello yields `None`; only socket errors are errors.
pub async fn read_client_hello<S>(
    stream: &mut S,
    max_capture: usize,
    metrics: Option<Arc<Metrics>>,
) -> std::io::Result<(Vec<u8>, Option<ClientHello>)>
where
    S: AsyncRead + Unpin,
{
    let start = Instant::now();
    let mut buf = Vec::with_capacity(4096);

    let hello = loop {
        match parse_client_hello(&buf) {
            Ok(hello) => break Some(hello),
            Err(e) if e.is_incomplete() => {}
            Err(e) => {
                debug!(error = %e, "unparseable ClientHello");
                break None;
            }
        }
        if buf.len() >= max_capture {
            debug!(captured = buf.len(), "ClientHello exceeds capture limit");
            break None;
        }
        let read = stream.read_buf(&mut buf).await?;
        if read == 0 {
            debug!(captured = buf.len(), "EOF before complete ClientHello");
            break None;
        }
    };

    if let Some(ref m) = metrics {
        if hello.is_some() {
            m.record_fingerprint_extracted(start.elapsed().as_secs_f64());
        } else {
            m.record_fingerprint_degraded();
        }
    }

    Ok((buf, hello))
}
