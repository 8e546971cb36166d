//! Per-exchange request pipeline.
//!
//! # Data Flow
//! ```text
//! parsed request
//!     → pre middleware (may short-circuit)
//!     → route lookup (404 / 405 / match)
//!     → parameter binding (400 on failure)
//!     → handler invocation on the worker pool (500/504 on fault)
//!     → post middleware
//!     → response, written by the connection in parse order
//! ```
//!
//! Every exchange walks an explicit state machine; `Errored` is reachable
//! from any non-terminal state and every error kind is converted to an
//! HTTP response here. Nothing propagates past this boundary.

pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use tracing::Instrument;
use uuid::Uuid;

use crate::handler::adapter;
use crate::http::{ParsedRequest, RequestContext, Response};
use crate::observability::metrics;
use crate::pipeline::middleware::Chain;
use crate::route::{Lookup, RouteTable};
use crate::server::workers::HandlerPool;

/// Exchange lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    HeadersParsed,
    BodyBuffered,
    Matched,
    Invoking,
    ResponseWriting,
    Complete,
    Errored,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Complete | ExchangeState::Errored)
    }

    /// Legal forward transitions. `Errored` is reachable from every
    /// non-terminal state; hooks and route misses short-circuit straight
    /// to `ResponseWriting`.
    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Errored {
            return true;
        }
        matches!(
            (self, next),
            (Idle, HeadersParsed)
                | (HeadersParsed, BodyBuffered)
                | (HeadersParsed, ResponseWriting)
                | (BodyBuffered, Matched)
                | (BodyBuffered, ResponseWriting)
                | (Matched, Invoking)
                | (Invoking, ResponseWriting)
                | (ResponseWriting, Complete)
        )
    }
}

/// Tracks one exchange's state, enforcing the transition table.
#[derive(Debug)]
pub struct ExchangeTracker {
    request_id: Uuid,
    state: ExchangeState,
}

impl ExchangeTracker {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn advance(&mut self, next: ExchangeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal exchange transition {:?} -> {next:?}",
            self.state
        );
        tracing::trace!(request_id = %self.request_id, from = ?self.state, to = ?next, "exchange transition");
        self.state = next;
    }
}

/// The outcome handed back to the connection for write-back.
#[derive(Debug)]
pub struct Outcome {
    pub response: Response,
    /// Absent for responses built before a request existed (parse errors).
    pub request_id: Option<Uuid>,
    /// HEAD responses carry framing headers but no body bytes.
    pub head_only: bool,
    pub keep_alive: bool,
}

/// Drives parsed requests through matching, binding, and invocation.
/// One pipeline is shared by all connections; per-exchange state lives on
/// the stack of `process`.
pub struct Pipeline {
    table: Arc<RouteTable>,
    middleware: Arc<Chain>,
    pool: HandlerPool,
    handler_timeout_secs: u64,
}

impl Pipeline {
    pub fn new(
        table: Arc<RouteTable>,
        middleware: Arc<Chain>,
        pool: HandlerPool,
        handler_timeout_secs: u64,
    ) -> Self {
        Self {
            table,
            middleware,
            pool,
            handler_timeout_secs,
        }
    }

    pub fn route_count(&self) -> usize {
        self.table.len()
    }

    /// Process one exchange to completion. Backpressure note: when the
    /// handler pool is saturated this future waits inside the submission,
    /// which stalls only the owning connection's pipeline slot.
    pub async fn process(&self, parsed: ParsedRequest) -> Outcome {
        let ParsedRequest { head, body } = parsed;
        let method = head.method.clone();
        let head_only = method == http::Method::HEAD;
        let wants_keep_alive = head.keep_alive();

        metrics::record_request(method.as_str());

        let mut ctx = RequestContext::new(head, body);
        let request_id = ctx.id;
        let span = tracing::debug_span!(
            "exchange",
            request_id = %request_id,
            method = %method,
            path = %ctx.head.path(),
        );

        async {
            let mut tracker = ExchangeTracker::new(request_id);
            tracker.advance(ExchangeState::HeadersParsed);

            // Body arrives buffered alongside the head; the pre hooks still
            // run at the headers-parsed stage so they can reject before any
            // work.
            let mut response = match self.middleware.run_before(&mut ctx).await {
                Some(response) => {
                    tracker.advance(ExchangeState::ResponseWriting);
                    response
                }
                None => {
                    tracker.advance(ExchangeState::BodyBuffered);
                    self.dispatch(&mut ctx, &mut tracker).await
                }
            };

            if !matches!(
                tracker.state(),
                ExchangeState::Errored | ExchangeState::ResponseWriting
            ) {
                tracker.advance(ExchangeState::ResponseWriting);
            }
            self.middleware.run_after(&ctx, &mut response);
            if tracker.state() == ExchangeState::ResponseWriting {
                tracker.advance(ExchangeState::Complete);
            }

            metrics::record_response(method.as_str(), response.status().as_u16());
            tracing::debug!(status = %response.status(), "exchange complete");

            // The written connection header must reflect the actual decision,
            // not just what the handler set.
            let keep_alive = wants_keep_alive && !response.must_close();
            let response = if keep_alive {
                response
            } else {
                response.close_connection()
            };

            Outcome {
                keep_alive,
                response,
                request_id: Some(request_id),
                head_only,
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, ctx: &mut RequestContext, tracker: &mut ExchangeTracker) -> Response {
        match self.table.lookup(&ctx.head.method, ctx.head.path()) {
            Lookup::NotFound => {
                tracing::debug!("no route matched");
                return Response::error_json(StatusCode::NOT_FOUND, "no matching route");
            }
            Lookup::MethodNotAllowed { allow } => {
                tracing::debug!(?allow, "method not allowed");
                return Response::error_json(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "method not allowed for this path",
                )
                .allow_header(&allow);
            }
            Lookup::Matched { route, params } => {
                ctx.route = Some(route);
                ctx.path_params = params;
            }
        }
        tracker.advance(ExchangeState::Matched);

        let route = ctx.route.clone().expect("route set by lookup");

        let args = match adapter::bind(&route, ctx) {
            Ok(args) => args,
            Err(err) => {
                tracker.advance(ExchangeState::Errored);
                metrics::record_error("binding");
                tracing::debug!(error = %err, "binding failed");
                return adapter::binding_response(&err);
            }
        };

        tracker.advance(ExchangeState::Invoking);
        let started = Instant::now();
        let invoked = self
            .pool
            .invoke(&route, args, self.handler_timeout_secs)
            .await;
        metrics::record_handler_duration(route.method.as_str(), started.elapsed());

        match invoked {
            Ok(Ok(reply)) => match adapter::encode_reply(&route, reply) {
                Ok(response) => {
                    tracker.advance(ExchangeState::ResponseWriting);
                    response
                }
                Err(fault) => {
                    tracker.advance(ExchangeState::Errored);
                    metrics::record_error(fault.kind());
                    tracing::error!(error = %fault, pattern = %route.pattern, "response encoding failed");
                    adapter::fault_response(&fault)
                }
            },
            Ok(Err(problem)) => {
                tracker.advance(ExchangeState::ResponseWriting);
                tracing::debug!(status = %problem.status(), "handler answered with declared error");
                adapter::problem_response(&problem)
            }
            Err(fault) => {
                tracker.advance(ExchangeState::Errored);
                metrics::record_error(fault.kind());
                tracing::error!(error = %fault, pattern = %route.pattern, "handler fault");
                adapter::fault_response(&fault)
            }
        }
    }
}
