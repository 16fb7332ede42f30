use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioExecutor;
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::fingerprinting::DEFAULT_MAX_CAPTURE;
use crate::proxy::connection::ConnectionManager;
use crate::proxy::forwarding::{Forwarder, Upstream};
use crate::proxy::handler::RootHandler;
use crate::proxy::router::{Handler, Mux};
use crate::proxy::transport::tls::shutdown_requested;
use crate::proxy::transport::{handle_tls_connection, TlsConnectionConfig};
use crate::security::AccessList;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;
use crate::tls::{build_tls_acceptor, build_upstream_client_config};

/// What the server does with each connection and request
pub struct ServerOptions {
    /// Upstream to relay accepted requests to; `None` answers with the digest
    pub destination: Option<Upstream>,
    pub access: AccessList,
    /// Replaces the default 403 for rejected requests
    pub on_blocked: Option<Arc<dyn Handler>>,
    /// Application routes; `/` is reserved for the fingerprinting pipeline
    pub mux: Option<Mux>,
    /// Trust for `https://` destinations; platform roots when `None`
    pub upstream_tls: Option<Arc<ClientConfig>>,
    /// Send `x-ja3-hash`/`x-ja3` upstream
    pub fingerprint_header: bool,
    pub max_capture_bytes: usize,
    pub max_connections: usize,
    pub client_hello_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub metrics: Option<Arc<Metrics>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            destination: None,
            access: AccessList::default(),
            on_blocked: None,
            mux: None,
            upstream_tls: None,
            fingerprint_header: false,
            max_capture_bytes: DEFAULT_MAX_CAPTURE,
            max_connections: 1024,
            client_hello_timeout: Duration::from_secs(10),
            tls_handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            metrics: None,
        }
    }
}

impl ServerOptions {
    /// Parse the destination and load both digest lists.
    pub fn from_config(config: &Config, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let destination = config.destination.as_deref().map(Upstream::parse).transpose()?;
        let access = AccessList::load(
            config.access.whitelist.as_deref(),
            config.access.blacklist.as_deref(),
        )?;
        let upstream_tls =
            config.tls.upstream_ca_path.as_deref().map(build_upstream_client_config).transpose()?;

        Ok(Self {
            destination,
            access,
            on_blocked: None,
            mux: None,
            upstream_tls,
            fingerprint_header: config.fingerprint.header,
            max_capture_bytes: config.fingerprint.max_capture_bytes,
            max_connections: config.security.max_connections,
            client_hello_timeout: Duration::from_millis(config.timeout.client_hello_ms),
            tls_handshake_timeout: Duration::from_millis(config.timeout.tls_handshake_ms),
            shutdown_timeout: Duration::from_secs(config.timeout.shutdown_secs),
            metrics,
        })
    }
}

pub struct Server {
    connection: Arc<TlsConnectionConfig>,
    connections: ConnectionManager,
    shutdown_timeout: Duration,
}

impl Server {
    /// Registers the fingerprinting pipeline at `/` on the given or a new router.
    pub fn new(options: ServerOptions, acceptor: TlsAcceptor) -> Result<Self> {
        let metrics = options.metrics;
        let forwarder = match options.destination {
            Some(upstream) => Some(Arc::new(Forwarder::new(
                upstream,
                options.upstream_tls,
                options.fingerprint_header,
                metrics.clone(),
            )?)),
            None => None,
        };

        let root = RootHandler::new(
            Arc::new(options.access),
            forwarder,
            options.on_blocked,
            metrics.clone(),
        );

        let mut mux = options.mux.unwrap_or_default();
        mux.handle("/", root)?;

        Ok(Self {
            connection: Arc::new(TlsConnectionConfig {
                acceptor,
                mux: Arc::new(mux),
                builder: ConnBuilder::new(TokioExecutor::new()),
                max_capture_bytes: options.max_capture_bytes,
                client_hello_timeout: options.client_hello_timeout,
                tls_handshake_timeout: options.tls_handshake_timeout,
                metrics,
            }),
            connections: ConnectionManager::new(options.max_connections),
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    /// Accept until `shutdown` holds true, then drain open connections.
    pub async fn serve(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown.clone()) => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok((stream, peer)) => (stream, peer),
                        Err(e) => {
                            warn!(error = %e, "accept error");
                            continue;
                        }
                    };

                    let guard = match self
                        .connections
                        .try_accept(peer, self.connection.metrics.as_ref())
                    {
                        Ok(guard) => guard,
                        Err(e) => {
                            debug!(?peer, error = %e, "connection refused");
                            continue;
                        }
                    };

                    tokio::spawn(handle_tls_connection(
                        stream,
                        peer,
                        Arc::clone(&self.connection),
                        shutdown.clone(),
                        guard,
                    ));
                }
            }
        }

        self.connections.begin_shutdown();
        drop(listener);

        info!(
            active_connections = self.connections.active(),
            "Waiting for active connections to finish (timeout: {}s)",
            self.shutdown_timeout.as_secs()
        );
        if self.connections.wait_for_drain(self.shutdown_timeout).await {
            info!("All connections closed, shutdown complete");
        } else {
            warn!(
                active_connections = self.connections.active(),
                "Shutdown timeout reached with connections still active"
            );
            if let Some(ref m) = self.connection.metrics {
                m.record_timeout(values::TIMEOUT_SHUTDOWN);
            }
        }

        Ok(())
    }
}

/// Flips to true on SIGINT or SIGTERM
pub fn signal_shutdown() -> Result<watch::Receiver<bool>> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        ProxyError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        ProxyError::Io(std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))
    })?;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
        let _ = tx.send(true);
    });
    Ok(rx)
}

/// Build everything from configuration and serve until `shutdown`.
pub async fn run(
    config: &Config,
    metrics: Option<Arc<Metrics>>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let acceptor = build_tls_acceptor(&config.tls)?;
    let options = ServerOptions::from_config(config, metrics)?;
    let mode = if options.destination.is_some() { "reverse proxy" } else { "fingerprint echo" };
    info!(
        whitelist = options.access.allow_len(),
        blacklist = options.access.deny_len(),
        mode,
        "access lists loaded"
    );

    let server = Server::new(options, acceptor)?;
    let listener = TcpListener::bind(config.listen.as_str()).await?;
    info!(addr = ?listener.local_addr()?, "Started listening on https://{}", config.listen);

    server.serve(listener, shutdown).await
}
