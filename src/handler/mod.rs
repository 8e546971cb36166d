//! Handler abstraction and invocation.
//!
//! # Responsibilities
//! - Define the `Handler` trait and the shared `HandlerRef` stored in routes
//! - Define the argument bag handed to handlers (`Args`)
//! - Define handler return values (`Reply`) and declared error mappings
//!   (`Problem`)
//!
//! Handlers never see the connection or the raw request; the adapter binds
//! declared parameters into `Args` before invocation, so a handler owns its
//! inputs and can run on any task.

pub mod adapter;
pub mod extract;
pub mod reply;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use reply::{Problem, Reply};

/// One bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Path, query, and header bindings arrive as text.
    Text(String),
    /// Body bindings arrive decoded.
    Json(serde_json::Value),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            ArgValue::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ArgValue::Json(v) => Some(v),
            ArgValue::Text(_) => None,
        }
    }
}

/// Arguments bound for one invocation, in declaration order. Optional
/// bindings that were absent from the request simply do not appear.
#[derive(Debug, Default, Clone)]
pub struct Args {
    values: Vec<(String, ArgValue)>,
}

impl Args {
    pub(crate) fn push(&mut self, name: String, value: ArgValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_text)
    }

    pub fn json(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name).and_then(ArgValue::as_json)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, Problem>> + Send + 'static>>;

/// An endpoint handler. Implemented for any
/// `Fn(Args) -> impl Future<Output = Result<Reply, Problem>>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, args: Args) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, Problem>> + Send + 'static,
{
    fn call(&self, args: Args) -> HandlerFuture {
        Box::pin((self)(args))
    }
}

/// Shared handle to a handler, stored in compiled routes.
#[derive(Clone)]
pub struct HandlerRef(Arc<dyn Handler>);

impl HandlerRef {
    pub fn new<H: Handler>(handler: H) -> Self {
        Self(Arc::new(handler))
    }

    pub fn call(&self, args: Args) -> HandlerFuture {
        self.0.call(args)
    }
}

/// Wrap a closure as a [`HandlerRef`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerRef
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, Problem>> + Send + 'static,
{
    HandlerRef::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_handlers_are_callable() {
        let h = handler_fn(|args: Args| async move {
            let who = args.text("name").unwrap_or("world").to_string();
            Ok(Reply::text(format!("hello {who}")))
        });
        let mut args = Args::default();
        args.push("name".into(), ArgValue::Text("trellis".into()));
        let reply = h.call(args).await.unwrap();
        assert_eq!(reply.status(), http::StatusCode::OK);
    }

    #[test]
    fn args_lookup_by_name() {
        let mut args = Args::default();
        args.push("id".into(), ArgValue::Text("42".into()));
        args.push("payload".into(), ArgValue::Json(serde_json::json!({"a": 1})));
        assert_eq!(args.text("id"), Some("42"));
        assert!(args.json("payload").is_some());
        assert!(args.get("missing").is_none());
        assert_eq!(args.len(), 2);
    }
}
