use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::error::{ProxyError, Result};
use crate::proxy::RespBody;

fn json_response(status: StatusCode, body: serde_json::Value) -> Result<Response<RespBody>> {
    let body_bytes = serde_json::to_vec(&body)
        .map_err(|e| ProxyError::Http(format!("Failed to serialize health response: {e}")))?;

    let body = Full::new(Bytes::from(body_bytes))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)
        .map_err(|e| ProxyError::Http(format!("Failed to build health response: {e}")))
}

/// Always 200 while the process is running; reports the configured mode.
pub fn health_check_response(proxy_mode: bool) -> Result<Response<RespBody>> {
    let mode = if proxy_mode { "proxy" } else { "echo" };
    json_response(StatusCode::OK, json!({"status": "healthy", "mode": mode}))
}
