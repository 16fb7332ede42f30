use ja3rp_lib::fingerprinting::ja3_digest;
use ja3rp_lib::proxy::Upstream;
use ja3rp_lib::ServerOptions;
use tokio_rustls::rustls::crypto::aws_lc_rs;

use crate::helpers::{
    digest_from_body, generate_test_cert, raw_get, rustls_client, spawn_upstream, start_proxy,
    TestResult,
};

#[tokio::test]
async fn same_client_config_gives_same_digest() -> TestResult {
    let cert = generate_test_cert()?;
    let proxy = start_proxy(ServerOptions::default(), &cert).await?;

    let (status, first) = raw_get(proxy.addr, rustls_client(&cert, None)?, "/").await?;
    assert_eq!(status, 200);
    let (_, second) = raw_get(proxy.addr, rustls_client(&cert, None)?, "/").await?;

    let first = digest_from_body(&first).ok_or("missing digest")?;
    let second = digest_from_body(&second).ok_or("missing digest")?;
    assert_eq!(first, second);

    proxy.stop().await
}

#[tokio::test]
async fn cipher_order_changes_digest() -> TestResult {
    let cert = generate_test_cert()?;
    let proxy = start_proxy(ServerOptions::default(), &cert).await?;

    let mut reversed = aws_lc_rs::default_provider().cipher_suites;
    reversed.reverse();

    let (_, default_body) = raw_get(proxy.addr, rustls_client(&cert, None)?, "/").await?;
    let (_, reversed_body) =
        raw_get(proxy.addr, rustls_client(&cert, Some(reversed))?, "/").await?;

    let default_digest = digest_from_body(&default_body).ok_or("missing digest")?;
    let reversed_digest = digest_from_body(&reversed_body).ok_or("missing digest")?;
    assert_ne!(default_digest, reversed_digest);

    proxy.stop().await
}

#[tokio::test]
async fn forwarded_ja3_matches_offered_ciphers() -> TestResult {
    let cert = generate_test_cert()?;
    let (upstream, seen) = spawn_upstream().await?;
    let options = ServerOptions {
        destination: Some(Upstream::parse(&format!("http://{upstream}"))?),
        fingerprint_header: true,
        ..Default::default()
    };
    let proxy = start_proxy(options, &cert).await?;

    let suites = aws_lc_rs::default_provider().cipher_suites;
    let (status, _) = raw_get(proxy.addr, rustls_client(&cert, Some(suites.clone()))?, "/").await?;
    assert_eq!(status, 201);

    let seen = seen.lock().map_err(|e| e.to_string())?.clone();
    let (_, headers) = seen.first().ok_or("upstream saw no request")?;
    let raw = headers.get("x-ja3").ok_or("missing x-ja3")?;
    let hash = headers.get("x-ja3-hash").ok_or("missing x-ja3-hash")?;
    assert_eq!(&ja3_digest(raw), hash);

    let fields: Vec<&str> = raw.split(',').collect();
    assert_eq!(fields.len(), 5);
    // ClientHello legacy_version is always TLS 1.2 for rustls
    assert_eq!(fields[0], "771");

    let offered = suites
        .iter()
        .map(|s| u16::from(s.suite()).to_string())
        .collect::<Vec<_>>()
        .join("-");
    assert!(fields[1].starts_with(&offered), "{} does not start with {offered}", fields[1]);

    proxy.stop().await
}
