//! Route data model.
//!
//! # Responsibilities
//! - Represent declared endpoints (method, pattern, handler, bindings)
//! - Represent compiled routes as immutable segment lists
//!
//! Pure data; parsing lives in `pattern`, validation in `compiler`,
//! matching in `matcher`.

use std::sync::Arc;

use http::Method;

use crate::handler::HandlerRef;

/// One segment of a compiled path pattern.
///
/// Matching precedence is literal over param over wildcard; the ordering is
/// an explicit function so the tie-break rule can be tested on its own
/// rather than being implied by container order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact text, e.g. `users` in `/users/{id}`.
    Literal(String),
    /// Named single-segment parameter, e.g. `{id}`.
    Param(String),
    /// Trailing multi-segment capture, e.g. `{*path}`. Always last.
    Wildcard(String),
}

impl Segment {
    /// Lower rank wins when two segment kinds compete for the same
    /// concrete path segment.
    pub fn precedence(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Param(_) => 1,
            Segment::Wildcard(_) => 2,
        }
    }

    /// The capture name, for param and wildcard segments.
    pub fn capture_name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

/// Where a declared handler parameter is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// A named segment captured by the matcher.
    Path,
    /// A key in the request query string.
    Query,
    /// A request header value.
    Header,
    /// The decoded request body.
    Body,
}

impl ParamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Body => "body",
        }
    }
}

/// A declared binding from the request to one handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub source: ParamSource,
    pub required: bool,
}

/// A user-declared endpoint, not yet validated.
///
/// Built through [`crate::route::Endpoints`]; consumed by the compiler.
#[derive(Clone)]
pub struct EndpointDecl {
    pub method: Method,
    pub pattern: String,
    pub handler: HandlerRef,
    pub params: Vec<ParamSpec>,
    /// Response content type for encoded payloads.
    pub produces: String,
    /// Run the handler on the blocking pool instead of the async workers.
    pub blocking: bool,
}

impl std::fmt::Debug for EndpointDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDecl")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .field("produces", &self.produces)
            .field("blocking", &self.blocking)
            .finish_non_exhaustive()
    }
}

/// The compiled, immutable form of an endpoint. Owned by the route table
/// and never mutated after compilation.
pub struct Route {
    pub method: Method,
    /// Normalized pattern text, kept for diagnostics and conflict reports.
    pub pattern: String,
    pub segments: Vec<Segment>,
    pub handler: HandlerRef,
    pub params: Vec<ParamSpec>,
    pub produces: String,
    pub blocking: bool,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Names of path captures in declaration (left-to-right) order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::capture_name)
    }
}

/// Shared, read-only handle to a compiled route.
pub type RouteRef = Arc<Route>;
