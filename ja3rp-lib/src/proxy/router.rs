use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tracing::warn;

use crate::error::{ProxyError, Result};
use crate::proxy::synthetic_response::{redirect_response, synthetic_error_response, text_response};
use crate::proxy::RespBody;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Something that turns a request into a complete response
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Incoming>) -> BoxFuture<Response<RespBody>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<RespBody>> + Send + 'static,
{
    fn call(&self, req: Request<Incoming>) -> BoxFuture<Response<RespBody>> {
        Box::pin(self(req))
    }
}

/// Outcome of matching a path against the registered patterns
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Handler(&'a str),
    /// Path with a trailing slash added
    Redirect(String),
    NotFound,
}

/// Path router.
///
/// A pattern ending in `/` matches its whole subtree; any other pattern
/// matches only itself. The exact pattern wins, then the longest subtree.
#[derive(Clone, Default)]
pub struct Mux {
    routes: HashMap<String, Arc<dyn Handler>>,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<()> {
        self.handle_arc(pattern, Arc::new(handler))
    }

    pub fn handle_arc(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<()> {
        if !pattern.starts_with('/') {
            return Err(ProxyError::Config(format!(
                "route pattern must start with '/': {pattern:?}"
            )));
        }
        if self.routes.contains_key(pattern) {
            return Err(ProxyError::Config(format!("multiple registrations for {pattern}")));
        }
        self.routes.insert(pattern.to_string(), handler);
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        if let Some((pattern, _)) = self.routes.get_key_value(path) {
            return Lookup::Handler(pattern);
        }

        if !path.ends_with('/') {
            let with_slash = format!("{path}/");
            if self.routes.contains_key(&with_slash) {
                return Lookup::Redirect(with_slash);
            }
        }

        self.routes
            .keys()
            .filter(|p| p.ends_with('/') && path.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .map_or(Lookup::NotFound, |p| Lookup::Handler(p.as_str()))
    }

    pub async fn dispatch(&self, req: Request<Incoming>) -> Response<RespBody> {
        let handler = match self.lookup(req.uri().path()) {
            Lookup::Handler(pattern) => self.routes.get(pattern).cloned(),
            Lookup::Redirect(path) => {
                let location = match req.uri().query() {
                    Some(q) => format!("{path}?{q}"),
                    None => path,
                };
                return redirect_response(&location).unwrap_or_else(|e| {
                    warn!(error = %e, "failed to build redirect");
                    internal_error()
                });
            }
            Lookup::NotFound => None,
        };

        match handler {
            Some(h) => h.call(req).await,
            None => text_response(StatusCode::NOT_FOUND, "404 page not found"),
        }
    }
}

fn internal_error() -> Response<RespBody> {
    synthetic_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        .unwrap_or_else(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, ""))
}
