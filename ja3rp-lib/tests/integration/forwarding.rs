use std::collections::HashSet;

use http::StatusCode;
use ja3rp_lib::proxy::Upstream;
use ja3rp_lib::{AccessList, ServerOptions};

use crate::helpers::{
    closed_port, generate_test_cert, insecure_client, learn_reqwest_digest, rustls_client,
    spawn_tls_upstream, spawn_upstream, start_proxy, TestResult,
};

#[tokio::test]
async fn relays_status_body_and_headers() -> TestResult {
    let cert = generate_test_cert()?;
    let (upstream, seen) = spawn_upstream().await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{upstream}"))?),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/hello?x=1")).send().await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get("x-upstream").and_then(|v| v.to_str().ok()),
        Some("yes")
    );
    assert_eq!(resp.text().await?, "upstream:/hello?x=1");

    let seen = seen.lock().map_err(|e| e.to_string())?.clone();
    assert_eq!(seen.len(), 1);
    let (target, headers) = &seen[0];
    assert_eq!(target, "/hello?x=1");
    assert_eq!(headers.get("host").map(String::as_str), Some(upstream.to_string().as_str()));
    assert_eq!(
        headers.get("x-forwarded-host").map(String::as_str),
        Some(proxy.addr.to_string().as_str())
    );
    assert_eq!(headers.get("x-forwarded-proto").map(String::as_str), Some("https"));
    assert_eq!(headers.get("x-forwarded-for").map(String::as_str), Some("127.0.0.1"));
    assert!(!headers.contains_key("x-ja3-hash"));

    proxy.stop().await
}

#[tokio::test]
async fn destination_base_path_is_prefixed() -> TestResult {
    let cert = generate_test_cert()?;
    let (upstream, _seen) = spawn_upstream().await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{upstream}/api/?k=v"))?),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/users?page=2")).send().await?;
    assert_eq!(resp.text().await?, "upstream:/api/users?k=v&page=2");

    proxy.stop().await
}

#[tokio::test]
async fn fingerprint_headers_replace_client_values() -> TestResult {
    let cert = generate_test_cert()?;
    let digest = learn_reqwest_digest(&cert).await?;
    let (upstream, seen) = spawn_upstream().await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{upstream}"))?),
        fingerprint_header: true,
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    insecure_client()?
        .get(proxy.url("/"))
        .header("x-ja3-hash", "spoofed")
        .send()
        .await?;

    let seen = seen.lock().map_err(|e| e.to_string())?.clone();
    let (_, headers) = seen.first().ok_or("upstream saw no request")?;
    assert_eq!(headers.get("x-ja3-hash"), Some(&digest));
    let raw = headers.get("x-ja3").ok_or("missing x-ja3")?;
    assert_eq!(raw.split(',').count(), 5);

    proxy.stop().await
}

#[tokio::test]
async fn blocked_requests_never_reach_upstream() -> TestResult {
    let cert = generate_test_cert()?;
    let digest = learn_reqwest_digest(&cert).await?;
    let (upstream, seen) = spawn_upstream().await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{upstream}"))?),
        access: AccessList::new(HashSet::new(), HashSet::from([digest])),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/")).send().await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(seen.lock().map_err(|e| e.to_string())?.is_empty());

    proxy.stop().await
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() -> TestResult {
    let cert = generate_test_cert()?;
    let dead = closed_port().await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{dead}"))?),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/")).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    proxy.stop().await
}

#[tokio::test]
async fn relays_to_tls_upstream() -> TestResult {
    let cert = generate_test_cert()?;
    let upstream_cert = generate_test_cert()?;
    let (upstream, seen) = spawn_tls_upstream(&upstream_cert).await?;

    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("https://localhost:{}", upstream.port()))?),
        upstream_tls: Some(rustls_client(&upstream_cert, None)?),
        fingerprint_header: true,
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/secure?x=1")).send().await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.text().await?, "upstream:/secure?x=1");

    let seen = seen.lock().map_err(|e| e.to_string())?.clone();
    let (_, headers) = seen.first().ok_or("upstream saw no request")?;
    let expected_host = format!("localhost:{}", upstream.port());
    assert_eq!(headers.get("host"), Some(&expected_host));
    assert!(headers.contains_key("x-ja3-hash"));

    proxy.stop().await
}

#[tokio::test]
async fn untrusted_tls_upstream_is_bad_gateway() -> TestResult {
    let cert = generate_test_cert()?;
    let (upstream, seen) = spawn_tls_upstream(&generate_test_cert()?).await?;

    // Trusts a different certificate than the one the upstream presents
    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("https://localhost:{}", upstream.port()))?),
        upstream_tls: Some(rustls_client(&generate_test_cert()?, None)?),
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let resp = insecure_client()?.get(proxy.url("/")).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(seen.lock().map_err(|e| e.to_string())?.is_empty());

    proxy.stop().await
}
