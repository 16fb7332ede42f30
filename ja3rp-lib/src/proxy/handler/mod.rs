pub mod headers;

use std::sync::Arc;

use http::StatusCode;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tracing::{debug, info, warn};

use crate::fingerprinting::{ja3_digest, DEGRADED_JA3};
use crate::proxy::context::fingerprint;
use crate::proxy::forwarding::Forwarder;
use crate::proxy::router::{BoxFuture, Handler};
use crate::proxy::synthetic_response::text_response;
use crate::proxy::RespBody;
use crate::security::{AccessDecision, AccessList};
use crate::telemetry::Metrics;

pub const FORBIDDEN_BODY: &str = "Access forbidden.";

/// Access control followed by forwarding, registered at `/`
#[derive(Clone)]
pub struct RootHandler {
    access: Arc<AccessList>,
    forwarder: Option<Arc<Forwarder>>,
    on_blocked: Option<Arc<dyn Handler>>,
    metrics: Option<Arc<Metrics>>,
}

impl RootHandler {
    pub fn new(
        access: Arc<AccessList>,
        forwarder: Option<Arc<Forwarder>>,
        on_blocked: Option<Arc<dyn Handler>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { access, forwarder, on_blocked, metrics }
    }

    pub async fn handle(&self, req: Request<Incoming>) -> Response<RespBody> {
        let (digest, peer) = match fingerprint(&req) {
            Some(fp) => (fp.ja3.digest.clone(), Some(fp.peer)),
            None => (ja3_digest(DEGRADED_JA3), None),
        };

        if let AccessDecision::Deny(reason) = self.access.evaluate(&digest) {
            info!(?peer, ja3 = %digest, reason = reason.as_str(), "request blocked");
            if let Some(ref m) = self.metrics {
                m.record_request_blocked(reason.as_str());
            }
            return match self.on_blocked {
                Some(ref handler) => handler.call(req).await,
                None => text_response(StatusCode::FORBIDDEN, FORBIDDEN_BODY),
            };
        }

        debug!(?peer, ja3 = %digest, "request allowed");
        if let Some(ref m) = self.metrics {
            m.record_request_allowed(req.method().as_str());
        }

        match self.forwarder {
            Some(ref forwarder) => match forwarder.forward(req).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(?peer, error = %e, "upstream request failed");
                    let status = StatusCode::from(e);
                    text_response(status, status.canonical_reason().unwrap_or_default())
                }
            },
            None => text_response(StatusCode::OK, format!("Access granted. JA3 hash: {digest}")),
        }
    }
}

impl Handler for RootHandler {
    fn call(&self, req: Request<Incoming>) -> BoxFuture<Response<RespBody>> {
        let this = self.clone();
        Box::pin(async move { this.handle(req).await })
    }
}
