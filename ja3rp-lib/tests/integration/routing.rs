use std::collections::HashSet;

use http::StatusCode;
use hyper::body::Incoming;
use hyper::Request;
use ja3rp_lib::proxy::synthetic_response::text_response;
use ja3rp_lib::{AccessList, Mux, Server, ServerOptions};

use crate::helpers::{
    generate_test_cert, insecure_client, learn_reqwest_digest, start_proxy, TestResult,
};

fn app_routes() -> TestResult<Mux> {
    let mut mux = Mux::new();
    mux.handle("/status", |_req: Request<Incoming>| async { text_response(StatusCode::OK, "up") })?;
    mux.handle("/docs/", |_req: Request<Incoming>| async {
        text_response(StatusCode::OK, "docs")
    })?;
    Ok(mux)
}

#[tokio::test]
async fn custom_routes_bypass_fingerprint_pipeline() -> TestResult {
    let cert = generate_test_cert()?;
    let digest = learn_reqwest_digest(&cert).await?;

    let options = ServerOptions {
        access: AccessList::new(HashSet::new(), HashSet::from([digest])),
        mux: Some(app_routes()?),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;
    let client = insecure_client()?;

    let resp = client.get(proxy.url("/status")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, "up");

    let resp = client.get(proxy.url("/docs/intro")).send().await?;
    assert_eq!(resp.text().await?, "docs");

    let resp = client.get(proxy.url("/elsewhere")).send().await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    proxy.stop().await
}

#[tokio::test]
async fn subtree_without_slash_redirects() -> TestResult {
    let cert = generate_test_cert()?;
    let options = ServerOptions { mux: Some(app_routes()?), ..Default::default() };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/docs?page=1")).send().await?;
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        resp.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/docs/?page=1")
    );

    proxy.stop().await
}

#[test]
fn root_pattern_is_reserved() -> TestResult {
    let mut mux = Mux::new();
    mux.handle("/", |_req: Request<Incoming>| async { text_response(StatusCode::OK, "mine") })?;

    let cert = generate_test_cert()?;
    let acceptor = ja3rp_lib::tls::build_tls_acceptor_from_der(
        vec![cert.cert_der.clone()],
        cert.key(),
        &[],
    )?;
    let options = ServerOptions { mux: Some(mux), ..Default::default() };
    assert!(Server::new(options, acceptor).is_err());
    Ok(())
}
