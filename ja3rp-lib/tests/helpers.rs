#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use ja3rp_lib::tls::build_tls_acceptor_from_der;
use ja3rp_lib::{Server, ServerOptions};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, SupportedCipherSuite};
use tokio_rustls::{TlsAcceptor, TlsConnector};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub fn tmp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Self-signed certificate for `localhost` in both PEM and DER form
pub struct TestCert {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
    pub key_der: Vec<u8>,
}

impl TestCert {
    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

pub fn generate_test_cert() -> TestResult<TestCert> {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
    Ok(TestCert {
        cert_pem: cert.pem(),
        key_pem: signing_key.serialize_pem(),
        cert_der: cert.der().clone(),
        key_der: signing_key.serialize_der(),
    })
}

/// Writes the certificate pair to `dir` and returns (cert, key) paths
pub fn write_test_cert(dir: &Path, cert: &TestCert) -> TestResult<(PathBuf, PathBuf)> {
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, &cert.cert_pem)?;
    std::fs::write(&key_path, &cert.key_pem)?;
    Ok((cert_path, key_path))
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<ja3rp_lib::Result<()>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }

    /// Flip the shutdown signal and wait for `serve` to return
    pub async fn stop(self) -> TestResult {
        self.shutdown.send(true)?;
        tokio::time::timeout(Duration::from_secs(10), self.handle).await???;
        Ok(())
    }
}

pub async fn start_proxy(options: ServerOptions, cert: &TestCert) -> TestResult<RunningProxy> {
    let acceptor = build_tls_acceptor_from_der(
        vec![cert.cert_der.clone()],
        cert.key(),
        &["h2".to_string(), "http/1.1".to_string()],
    )?;
    let server = Server::new(options, acceptor)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn(server.serve(listener, rx));

    Ok(RunningProxy { addr, shutdown, handle })
}

/// Fresh client per call so every request starts from a full handshake
pub fn insecure_client() -> TestResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()?)
}

/// Pulls the digest out of the echo-mode body
pub fn digest_from_body(body: &str) -> Option<String> {
    body.strip_prefix("Access granted. JA3 hash: ")
        .map(|d| d.trim().to_string())
}

/// Digest the proxy computes for reqwest's ClientHello
pub async fn learn_reqwest_digest(cert: &TestCert) -> TestResult<String> {
    let proxy = start_proxy(ServerOptions::default(), cert).await?;
    let body = insecure_client()?.get(proxy.url("/")).send().await?.text().await?;
    proxy.stop().await?;
    digest_from_body(&body).ok_or_else(|| format!("unexpected body: {body}").into())
}

/// Client config trusting `cert`, optionally with a custom cipher suite order
pub fn rustls_client(
    cert: &TestCert,
    cipher_suites: Option<Vec<SupportedCipherSuite>>,
) -> TestResult<Arc<ClientConfig>> {
    let mut provider = aws_lc_rs::default_provider();
    if let Some(suites) = cipher_suites {
        provider.cipher_suites = suites;
    }

    let mut roots = RootCertStore::empty();
    roots.add(cert.cert_der.clone())?;

    let config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// One HTTP/1.1 GET over a new TLS connection; returns (status, body)
pub async fn raw_get(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
    path: &str,
) -> TestResult<(u16, String)> {
    let tcp = TcpStream::connect(addr).await?;
    let connector = TlsConnector::from(config);
    let mut tls = connector
        .connect(ServerName::try_from("localhost")?, tcp)
        .await?;

    let request =
        format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    tls.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), tls.read(&mut buf)).await? {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }

    let text = String::from_utf8_lossy(&raw).into_owned();
    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| format!("malformed response: {text:?}"))?;
    let status = head
        .split_whitespace()
        .nth(1)
        .ok_or("missing status")?
        .parse::<u16>()?;
    Ok((status, body.to_string()))
}

/// Headers seen by the mock upstream, one map per request
pub type SeenRequests = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

/// Plain HTTP upstream answering 201 with `upstream:<path+query>` and an
/// `x-upstream` marker header
pub async fn spawn_upstream() -> TestResult<(SocketAddr, SeenRequests)> {
    spawn_upstream_with(None).await
}

/// Same mock upstream behind TLS terminated with `cert`
pub async fn spawn_tls_upstream(cert: &TestCert) -> TestResult<(SocketAddr, SeenRequests)> {
    let acceptor = build_tls_acceptor_from_der(
        vec![cert.cert_der.clone()],
        cert.key(),
        &["http/1.1".to_string()],
    )?;
    spawn_upstream_with(Some(acceptor)).await
}

async fn spawn_upstream_with(tls: Option<TlsAcceptor>) -> TestResult<(SocketAddr, SeenRequests)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let seen_accept = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let seen = Arc::clone(&seen_accept);
            let tls = tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => {
                        if let Ok(stream) = acceptor.accept(stream).await {
                            serve_mock(stream, seen).await;
                        }
                    }
                    None => serve_mock(stream, seen).await,
                }
            });
        }
    });

    Ok((addr, seen))
}

async fn serve_mock<I>(io: I, seen: SeenRequests)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let seen = Arc::clone(&seen);
        async move {
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect::<HashMap<_, _>>();
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            if let Ok(mut guard) = seen.lock() {
                guard.push((target.clone(), headers));
            }

            Response::builder()
                .status(201)
                .header("x-upstream", "yes")
                .body(Full::new(Bytes::from(format!("upstream:{target}"))))
        }
    });
    let _ = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(io), service)
        .await;
}

/// Plain HTTP GET returning (status, body)
pub async fn http_get(addr: SocketAddr, path: &str) -> TestResult<(u16, String)> {
    let resp = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()?
        .get(format!("http://{addr}{path}"))
        .send()
        .await?;
    Ok((resp.status().as_u16(), resp.text().await?))
}

/// Address that refuses connections
pub async fn closed_port() -> TestResult<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
