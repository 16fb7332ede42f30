use http::header::CONTENT_TYPE;
use http::HeaderValue;
use hyper::{Response, StatusCode};
use prometheus::{Registry, TextEncoder};
use tracing::warn;

use crate::error::{ProxyError, Result};
use crate::proxy::synthetic_response::{full_body, text_response};
use crate::proxy::RespBody;
use crate::telemetry::health_check_response;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Prometheus text exposition of everything in `registry`
pub fn metrics_response(registry: &Registry) -> Result<Response<RespBody>> {
    let encoder = TextEncoder::new();
    let text = encoder
        .encode_to_string(&registry.gather())
        .map_err(|e| ProxyError::Http(format!("Failed to encode metrics: {e}")))?;

    let mut res = Response::new(full_body(text));
    let content_type = HeaderValue::from_str(encoder.format_type())
        .map_err(|e| ProxyError::Http(format!("Invalid metrics content type: {e}")))?;
    res.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(res)
}

/// Dispatch one request on the observability listener by path.
pub fn observability_response(
    path: &str,
    registry: &Registry,
    proxy_mode: bool,
) -> Response<RespBody> {
    let result = match path {
        HEALTH_PATH => health_check_response(proxy_mode),
        METRICS_PATH => metrics_response(registry),
        _ => return text_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    result.unwrap_or_else(|e| {
        warn!(path, error = %e, "observability response failed");
        text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}
