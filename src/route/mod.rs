//! Route declaration, compilation, and matching.
//!
//! # Data Flow
//! ```text
//! Endpoints registry (declarations)
//!     → compiler.rs (parse patterns, reject duplicates/ambiguity)
//!     → RouteTable (immutable per-method tries)
//!     → matcher lookup per request: Matched / MethodNotAllowed / NotFound
//! ```
//!
//! The table is compiled once before the listener binds and is shared
//! read-only afterwards; nothing here runs on the request path except
//! `RouteTable::lookup`.

pub mod compiler;
pub mod matcher;
pub mod model;
pub mod pattern;

pub use compiler::compile;
pub use matcher::{Lookup, RouteTable};
pub use model::{EndpointDecl, ParamSource, ParamSpec, Route, RouteRef, Segment};

use http::Method;

use crate::error::CompileError;
use crate::handler::{Handler, HandlerRef};

/// Builder for one endpoint declaration.
///
/// Path captures in the pattern bind automatically as required path
/// parameters; query, header, and body bindings are declared explicitly.
pub struct Endpoint {
    decl: EndpointDecl,
}

impl Endpoint {
    pub fn new<H: Handler>(method: Method, pattern: &str, handler: H) -> Self {
        Self {
            decl: EndpointDecl {
                method,
                pattern: pattern.to_string(),
                handler: HandlerRef::new(handler),
                params: Vec::new(),
                produces: "application/json".to_string(),
                blocking: false,
            },
        }
    }

    pub fn get<H: Handler>(pattern: &str, handler: H) -> Self {
        Self::new(Method::GET, pattern, handler)
    }

    pub fn post<H: Handler>(pattern: &str, handler: H) -> Self {
        Self::new(Method::POST, pattern, handler)
    }

    pub fn put<H: Handler>(pattern: &str, handler: H) -> Self {
        Self::new(Method::PUT, pattern, handler)
    }

    pub fn delete<H: Handler>(pattern: &str, handler: H) -> Self {
        Self::new(Method::DELETE, pattern, handler)
    }

    /// Declare an optional query-string binding.
    pub fn query(mut self, name: &str) -> Self {
        self.decl.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Query,
            required: false,
        });
        self
    }

    /// Declare a required query-string binding.
    pub fn query_required(mut self, name: &str) -> Self {
        self.decl.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Query,
            required: true,
        });
        self
    }

    /// Declare an optional header binding.
    pub fn header(mut self, name: &str) -> Self {
        self.decl.params.push(ParamSpec {
            name: name.to_ascii_lowercase(),
            source: ParamSource::Header,
            required: false,
        });
        self
    }

    /// Declare a required header binding.
    pub fn header_required(mut self, name: &str) -> Self {
        self.decl.params.push(ParamSpec {
            name: name.to_ascii_lowercase(),
            source: ParamSource::Header,
            required: true,
        });
        self
    }

    /// Declare a required decoded-body binding.
    pub fn body(mut self, name: &str) -> Self {
        self.decl.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Body,
            required: true,
        });
        self
    }

    /// Response content type for encoded payloads.
    pub fn produces(mut self, content_type: &str) -> Self {
        self.decl.produces = content_type.to_string();
        self
    }

    /// Run this handler on the blocking pool.
    pub fn blocking(mut self) -> Self {
        self.decl.blocking = true;
        self
    }

    pub fn into_decl(self) -> EndpointDecl {
        self.decl
    }
}

/// The endpoint registry: collects declarations, compiles them into a
/// route table.
#[derive(Default)]
pub struct Endpoints {
    decls: Vec<EndpointDecl>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(mut self, endpoint: Endpoint) -> Self {
        self.decls.push(endpoint.into_decl());
        self
    }

    pub fn declare(mut self, decl: EndpointDecl) -> Self {
        self.decls.push(decl);
        self
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn compile(self) -> Result<RouteTable, CompileError> {
        compile(self.decls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::reply::Reply;

    #[test]
    fn registry_compiles_mounted_endpoints() {
        let table = Endpoints::new()
            .mount(Endpoint::get("/users/{id}", |_args| async {
                Ok(Reply::no_content())
            }))
            .mount(
                Endpoint::post("/users", |_args| async { Ok(Reply::no_content()) })
                    .body("user")
                    .query("dry_run"),
            )
            .compile()
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn header_bindings_are_lowercased() {
        let e = Endpoint::get("/x", |_args| async { Ok(Reply::no_content()) })
            .header_required("X-Api-Key");
        assert_eq!(e.decl.params[0].name, "x-api-key");
        assert!(e.decl.params[0].required);
    }
}
