//! Middleware hooks.
//!
//! # Responsibilities
//! - Pre hooks run once a request is parsed, before matching; a hook may
//!   short-circuit with a ready response (auth rejection and the like),
//!   skipping matching and invocation entirely
//! - Post hooks run right before the response is written and may rewrite
//!   headers or body

use std::future::Future;
use std::pin::Pin;

use crate::http::{RequestContext, Response};

pub type BeforeFuture<'a> = Pin<Box<dyn Future<Output = Option<Response>> + Send + 'a>>;

pub trait Middleware: Send + Sync + 'static {
    /// Runs at the headers-parsed stage. Returning a response
    /// short-circuits the exchange straight to response writing.
    fn before<'a>(&'a self, _ctx: &'a mut RequestContext) -> BeforeFuture<'a> {
        Box::pin(async { None })
    }

    /// Runs at the response-writing stage.
    fn after(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// An ordered middleware chain, shared across connections.
#[derive(Default)]
pub struct Chain {
    entries: Vec<Box<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.entries.push(Box::new(middleware));
    }

    /// Run pre hooks in order; the first short-circuit wins and later
    /// hooks do not run.
    pub async fn run_before(&self, ctx: &mut RequestContext) -> Option<Response> {
        for entry in &self.entries {
            if let Some(response) = entry.before(ctx).await {
                return Some(response);
            }
        }
        None
    }

    /// Run post hooks in order; every hook sees the response.
    pub fn run_after(&self, ctx: &RequestContext, response: &mut Response) {
        for entry in &self.entries {
            entry.after(ctx, response);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode, Version};

    use crate::http::RequestHead;

    fn ctx() -> RequestContext {
        let head = RequestHead::new(
            Method::GET,
            "/x".to_string(),
            Version::HTTP_11,
            HeaderMap::new(),
        )
        .unwrap();
        RequestContext::new(head, Bytes::new())
    }

    struct Reject;
    impl Middleware for Reject {
        fn before<'a>(&'a self, _ctx: &'a mut RequestContext) -> BeforeFuture<'a> {
            Box::pin(async { Some(Response::error_json(StatusCode::UNAUTHORIZED, "no")) })
        }
    }

    struct Tag;
    impl Middleware for Tag {
        fn after(&self, _ctx: &RequestContext, response: &mut Response) {
            *response = response.clone().with_header(
                http::header::HeaderName::from_static("x-tagged"),
                http::header::HeaderValue::from_static("1"),
            );
        }
    }

    #[tokio::test]
    async fn first_short_circuit_wins() {
        let mut chain = Chain::new();
        chain.push(Reject);
        chain.push(Tag);
        let mut c = ctx();
        let resp = chain.run_before(&mut c).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_chain_passes_through() {
        let chain = Chain::new();
        let mut c = ctx();
        assert!(chain.run_before(&mut c).await.is_none());
    }

    #[test]
    fn after_hooks_rewrite_response() {
        let mut chain = Chain::new();
        chain.push(Tag);
        let mut resp = Response::new(StatusCode::OK);
        chain.run_after(&ctx(), &mut resp);
        let mut out = bytes::BytesMut::new();
        resp.write_to(&mut out, None, false);
        assert!(String::from_utf8(out.to_vec()).unwrap().contains("x-tagged: 1"));
    }
}
