use crate::telemetry::observability_response;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bind `0.0.0.0:port` and serve `/metrics` and `/health` until `shutdown`
/// flips to true.
pub async fn start_observability_server(
    port: u16,
    registry: Registry,
    proxy_mode: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<(), BoxError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve_observability(listener, registry, proxy_mode, shutdown).await
}

/// Serve the observability endpoints over plain HTTP on an already bound
/// listener.
pub async fn serve_observability(
    listener: TcpListener,
    registry: Registry,
    proxy_mode: bool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), BoxError> {
    let registry = Arc::new(registry);
    info!(addr = ?listener.local_addr()?, proxy_mode, "Observability server started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Observability server: accept error");
                        continue;
                    }
                };

                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let res = observability_response(req.uri().path(), &registry, proxy_mode);
                        async move { Ok::<_, hyper::Error>(res) }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "Observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("Observability server stopped");
    Ok(())
}
