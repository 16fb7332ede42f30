use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderValue, Request, Response, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::HOST;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::proxy::context::fingerprint;
use crate::proxy::handler::headers::{
    add_forwarded_headers, inject_fingerprint_headers, strip_hop_by_hop,
};
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::RespBody;
use crate::telemetry::Metrics;

pub type HttpClient = Client<HttpsConnector<HttpConnector>, Incoming>;

/// Parsed destination URL
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    path: String,
    query: Option<String>,
}

impl Upstream {
    /// Accepts absolute `http://` and `https://` URLs.
    pub fn parse(destination: &str) -> Result<Self> {
        let uri: Uri = destination.parse()?;
        let parts = uri.into_parts();

        let scheme = parts.scheme.ok_or_else(|| {
            ProxyError::Config(format!("destination must be absolute: {destination}"))
        })?;
        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(ProxyError::Config(format!(
                "unsupported destination scheme '{scheme}', expected http:// or https://"
            )));
        }
        let authority = parts
            .authority
            .ok_or_else(|| ProxyError::Config(format!("destination has no host: {destination}")))?;

        let (path, query) = match parts.path_and_query {
            Some(pq) => (pq.path().to_string(), pq.query().map(str::to_string)),
            None => (String::new(), None),
        };

        Ok(Self { scheme, authority, path, query })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// Absolute URI for a request received with `inbound`
    pub fn target_uri(&self, inbound: &Uri) -> HttpResult<Uri> {
        let path = join_paths(&self.path, inbound.path());
        let query = match (self.query.as_deref(), inbound.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{a}&{b}")),
            (Some(a), _) if !a.is_empty() => Some(a.to_string()),
            (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
            _ => None,
        };
        let pq = match query {
            Some(q) => format!("{path}?{q}"),
            None => path,
        };
        let pq = PathAndQuery::try_from(pq).map_err(|e| HttpError::InvalidUri(e.to_string()))?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(pq)
            .build()
            .map_err(|e| HttpError::InvalidUri(e.to_string()))
    }
}

/// Join two paths with exactly one slash between them
pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Client config for upstreams that never speak TLS
fn plaintext_only_config() -> Result<ClientConfig> {
    Ok(ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProxyError::Tls(format!("Failed to select TLS versions: {e}")))?
        .with_root_certificates(RootCertStore::empty())
        .with_no_client_auth())
}

/// Pooled HTTP/1.1 client for both schemes.
///
/// `tls` replaces the platform trust store for `https://` upstreams and must
/// not preset ALPN. Native roots are only loaded when `native_roots` is set.
pub fn create_client(tls: Option<Arc<ClientConfig>>, native_roots: bool) -> Result<HttpClient> {
    let mut http = HttpConnector::new();
    http.set_keepalive(Some(Duration::from_secs(60)));
    http.set_nodelay(true);
    http.enforce_http(false);

    let builder = match (tls, native_roots) {
        (Some(config), _) => HttpsConnectorBuilder::new().with_tls_config((*config).clone()),
        (None, true) => HttpsConnectorBuilder::new().with_native_roots().map_err(|e| {
            ProxyError::Tls(format!("Failed to load native root certificates: {e}"))
        })?,
        (None, false) => HttpsConnectorBuilder::new().with_tls_config(plaintext_only_config()?),
    };
    let connector = builder.https_or_http().enable_http1().wrap_connector(http);

    let mut client = Client::builder(TokioExecutor::new());
    client.pool_idle_timeout(Duration::from_secs(90));
    Ok(client.build(connector))
}

/// Relays accepted requests to one fixed upstream over a pooled client
pub struct Forwarder {
    upstream: Upstream,
    client: HttpClient,
    fingerprint_header: bool,
    metrics: Option<Arc<Metrics>>,
}

impl Forwarder {
    pub fn new(
        upstream: Upstream,
        tls: Option<Arc<ClientConfig>>,
        fingerprint_header: bool,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self> {
        let client = create_client(tls, upstream.is_https())?;
        Ok(Self { upstream, client, fingerprint_header, metrics })
    }

    pub async fn forward(&self, mut req: Request<Incoming>) -> HttpResult<Response<RespBody>> {
        let start = Instant::now();

        let uri = self.upstream.target_uri(req.uri())?;
        let host = HeaderValue::from_str(self.upstream.authority().as_str())
            .map_err(|_| HttpError::InvalidHostInRequestHeader)?;

        if let Some(fp) = fingerprint(&req).cloned() {
            add_forwarded_headers(&mut req, fp.peer);
            if self.fingerprint_header {
                inject_fingerprint_headers(&mut req, &fp);
            }
        }

        let (mut parts, body) = req.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(HOST, host);
        parts.uri = uri;
        parts.version = Version::HTTP_11;

        debug!(uri = %parts.uri, "forwarding request upstream");
        let out_req = Request::from_parts(parts, body);

        match self.client.request(out_req).await {
            Ok(resp) => {
                if let Some(ref m) = self.metrics {
                    let elapsed = start.elapsed().as_secs_f64();
                    m.record_upstream_request(resp.status().as_u16(), elapsed);
                }
                let (mut parts, body) = resp.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, body.boxed()))
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_upstream_error(if e.is_connect() { "connect" } else { "request" });
                }
                Err(HttpError::FailedToGetResponseFromUpstream(e.to_string()))
            }
        }
    }
}
