use crate::error::{ProxyError, ProxyResult};
use crate::proxy::RespBody;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;

/// Build HTTP response with status code of 4xx and 5xx
pub(crate) fn synthetic_error_response(status_code: StatusCode) -> ProxyResult<Response<RespBody>> {
    let res = Response::builder()
        .status(status_code)
        .body(empty_body())
        .map_err(|e| ProxyError::Http(format!("Failed to build error response: {e}")))?;
    Ok(res)
}

/// `text/plain` response with a fixed body
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<RespBody> {
    let mut res = Response::new(full_body(body));
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

/// 301 pointing at `location`
pub(crate) fn redirect_response(location: &str) -> ProxyResult<Response<RespBody>> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .body(empty_body())
        .map_err(|e| ProxyError::Http(format!("Failed to build redirect response: {e}")))
}

pub fn full_body(body: impl Into<Bytes>) -> RespBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> RespBody {
    full_body(Bytes::new())
}
