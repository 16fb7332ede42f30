use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::fingerprinting::{read_client_hello, Ja3Fingerprint};
use crate::proxy::connection::{ConnectionGuard, PrefixedStream};
use crate::proxy::context::{bind, ConnectionFingerprint};
use crate::proxy::router::Mux;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// Everything a connection task needs, shared across tasks
pub struct TlsConnectionConfig {
    pub acceptor: TlsAcceptor,
    pub mux: Arc<Mux>,
    pub builder: ConnBuilder<TokioExecutor>,
    pub max_capture_bytes: usize,
    pub client_hello_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub metrics: Option<Arc<Metrics>>,
}

/// Resolves once `shutdown` holds true. A dropped sender never resolves.
pub(crate) async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Capture the ClientHello, finish the handshake, then serve HTTP with the
/// fingerprint bound to every request.
pub async fn handle_tls_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: Arc<TlsConnectionConfig>,
    shutdown: watch::Receiver<bool>,
    _guard: ConnectionGuard,
) {
    let metrics = config.metrics.clone();

    let capture = tokio::time::timeout(
        config.client_hello_timeout,
        read_client_hello(&mut stream, config.max_capture_bytes, metrics.clone()),
    )
    .await;
    let (prefix, hello) = match capture {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            warn!(?peer, error = %e, "failed to read client hello");
            return;
        }
        Err(_) => {
            debug!(?peer, "client hello timeout");
            if let Some(ref m) = metrics {
                m.record_timeout(values::TIMEOUT_CLIENT_HELLO);
            }
            return;
        }
    };

    let ja3 = Ja3Fingerprint::new(hello.as_ref());
    let server_name = hello.as_ref().and_then(|h| h.server_name.clone());
    debug!(
        ?peer,
        ja3 = %ja3.raw,
        digest = %ja3.digest,
        sni = ?server_name,
        alpn = ?hello.as_ref().map(|h| &h.alpn_protocols),
        grease = hello.as_ref().map_or(0, |h| h.grease_count),
        "client hello captured"
    );

    let prefixed = PrefixedStream::new(prefix, stream);
    let handshake = config.acceptor.accept(prefixed);
    let tls = match tokio::time::timeout(config.tls_handshake_timeout, handshake).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            warn!(?peer, error = %e, "TLS accept failed");
            if let Some(ref m) = metrics {
                m.record_tls_handshake_error();
            }
            return;
        }
        Err(_) => {
            warn!(?peer, "TLS handshake timeout");
            if let Some(ref m) = metrics {
                m.record_timeout(values::TIMEOUT_TLS_HANDSHAKE);
                m.record_tls_handshake_error();
            }
            return;
        }
    };

    let negotiated_version = tls.get_ref().1.protocol_version().map(|v| format!("{v:?}"));
    if let Some(ref m) = metrics {
        m.record_tls_handshake(negotiated_version.as_deref().unwrap_or("unknown"));
    }

    let fingerprint =
        Arc::new(ConnectionFingerprint { ja3, negotiated_version, server_name, peer });

    let mux = config.mux.clone();
    let svc = hyper::service::service_fn(move |mut req: Request<Incoming>| {
        bind(&mut req, &fingerprint);
        let mux = mux.clone();
        async move { Ok::<_, hyper::Error>(mux.dispatch(req).await) }
    });

    let conn = config.builder.serve_connection(TokioIo::new(tls), svc);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown_requested(shutdown) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        debug!(?peer, error = %e, "serve_connection error");
    }
}
