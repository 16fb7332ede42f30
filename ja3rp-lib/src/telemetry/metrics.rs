use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, MeterProvider, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const REASON: &str = "reason";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const TLS_VERSION: &str = "tls_version";
    pub const TIMEOUT_TYPE: &str = "timeout_type";
    pub const ERROR_TYPE: &str = "error_type";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const TIMEOUT_CLIENT_HELLO: &str = "client_hello";
    pub const TIMEOUT_TLS_HANDSHAKE: &str = "tls_handshake";
    pub const TIMEOUT_SHUTDOWN: &str = "shutdown";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connections_rejected_total: Counter<u64>,

    // JA3 capture
    pub fingerprints_extracted_total: Counter<u64>,
    pub fingerprint_extraction_duration_seconds: Histogram<f64>,
    pub fingerprints_degraded_total: Counter<u64>,

    // Access decisions
    pub requests_allowed_total: Counter<u64>,
    pub requests_blocked_total: Counter<u64>,

    pub upstream_requests_total: Counter<u64>,
    pub upstream_errors_total: Counter<u64>,
    pub upstream_duration_seconds: Histogram<f64>,

    pub tls_handshakes_total: Counter<u64>,
    pub tls_handshake_errors_total: Counter<u64>,

    pub timeouts_total: Counter<u64>,

    pub build_info: Gauge<u64>,

    // Instruments stop exporting once the provider is dropped
    _provider: SdkMeterProvider,
}

impl Metrics {
    fn new(provider: SdkMeterProvider) -> Self {
        let meter: Meter = provider.meter("ja3rp");
        Self {
            connections_total: meter
                .u64_counter("ja3rp_connections_total")
                .with_description("Total number of connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("ja3rp_connections_active")
                .with_description("Number of active connections")
                .build(),
            connections_rejected_total: meter
                .u64_counter("ja3rp_connections_rejected_total")
                .with_description("Total number of connections rejected due to connection limit")
                .build(),

            fingerprints_extracted_total: meter
                .u64_counter("ja3rp_fingerprints_extracted_total")
                .with_description("Total number of ClientHello messages parsed into a fingerprint")
                .build(),
            fingerprint_extraction_duration_seconds: meter
                .f64_histogram("ja3rp_fingerprint_extraction_duration_seconds")
                .with_description("Time spent reading and parsing the ClientHello in seconds")
                .build(),
            fingerprints_degraded_total: meter
                .u64_counter("ja3rp_fingerprints_degraded_total")
                .with_description("Total number of connections with an unparsable ClientHello")
                .build(),

            requests_allowed_total: meter
                .u64_counter("ja3rp_requests_allowed_total")
                .with_description("Total number of requests accepted by the access lists")
                .build(),
            requests_blocked_total: meter
                .u64_counter("ja3rp_requests_blocked_total")
                .with_description("Total number of requests rejected by the access lists")
                .build(),

            upstream_requests_total: meter
                .u64_counter("ja3rp_upstream_requests_total")
                .with_description("Total number of requests forwarded upstream")
                .build(),
            upstream_errors_total: meter
                .u64_counter("ja3rp_upstream_errors_total")
                .with_description("Total number of failed upstream requests (502)")
                .build(),
            upstream_duration_seconds: meter
                .f64_histogram("ja3rp_upstream_duration_seconds")
                .with_description("Upstream request duration in seconds")
                .build(),

            tls_handshakes_total: meter
                .u64_counter("ja3rp_tls_handshakes_total")
                .with_description("Total number of TLS handshakes completed")
                .build(),
            tls_handshake_errors_total: meter
                .u64_counter("ja3rp_tls_handshake_errors_total")
                .with_description("Total number of TLS handshake errors")
                .build(),

            timeouts_total: meter
                .u64_counter("ja3rp_timeouts_total")
                .with_description("Total number of timeouts by type")
                .build(),

            build_info: meter
                .u64_gauge("ja3rp_build_info")
                .with_description("Build information (version, rust version)")
                .build(),

            _provider: provider,
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_connection_opened(&self) {
        self.connections_total.add(1, &[]);
        self.connections_active.add(1, &[]);
    }

    pub fn record_connection_closed(&self) {
        self.connections_active.add(-1, &[]);
    }

    pub fn record_connection_rejected(&self) {
        self.connections_rejected_total.add(1, &[]);
    }

    pub fn record_fingerprint_extracted(&self, duration_secs: f64) {
        self.fingerprints_extracted_total.add(1, &[]);
        self.fingerprint_extraction_duration_seconds
            .record(duration_secs, &[]);
    }

    pub fn record_fingerprint_degraded(&self) {
        self.fingerprints_degraded_total.add(1, &[]);
    }

    pub fn record_request_allowed(&self, method: &str) {
        self.requests_allowed_total
            .add(1, &[KeyValue::new(labels::METHOD, method.to_string())]);
    }

    pub fn record_request_blocked(&self, reason: &str) {
        self.requests_blocked_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_upstream_request(&self, status_code: u16, duration: f64) {
        let attrs = &[KeyValue::new(labels::STATUS_CODE, status_code.to_string())];
        self.upstream_requests_total.add(1, attrs);
        self.upstream_duration_seconds.record(duration, attrs);
    }

    pub fn record_upstream_error(&self, error_type: &str) {
        self.upstream_errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, error_type.to_string())]);
    }

    pub fn record_tls_handshake(&self, tls_version: &str) {
        self.tls_handshakes_total
            .add(1, &[KeyValue::new(labels::TLS_VERSION, tls_version.to_string())]);
    }

    pub fn record_tls_handshake_error(&self) {
        self.tls_handshake_errors_total.add(1, &[]);
    }

    pub fn record_timeout(&self, timeout_type: &str) {
        self.timeouts_total
            .add(1, &[KeyValue::new(labels::TIMEOUT_TYPE, timeout_type.to_string())]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    // Each call exports into its own registry
    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();
    let metrics = Arc::new(Metrics::new(meter_provider));

    metrics.set_build_info();

    Ok((metrics, registry))
}
