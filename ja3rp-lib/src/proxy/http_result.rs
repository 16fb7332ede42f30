use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is used to generate a synthetic error response
pub(crate) type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong in the forwarder
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("Invalid host in request header")]
    InvalidHostInRequestHeader,

    #[error("Failed to get response from upstream: {0}")]
    FailedToGetResponseFromUpstream(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        match e {
            HttpError::InvalidHostInRequestHeader => StatusCode::BAD_REQUEST,
            HttpError::FailedToGetResponseFromUpstream(_) => StatusCode::BAD_GATEWAY,
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
        }
    }
}
