//! Trellis: a REST-serving framework with a compile-time route table.
//!
//! Applications declare endpoints against a registry; the route compiler
//! turns the declarations into a conflict-free, immutable table before
//! the listener binds; the dispatch engine serves HTTP/1.1 against that
//! table with a bounded handler pool.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                      TRELLIS                       │
//!                  │                                                    │
//!  declarations ───┼─▶ route::Endpoints ──▶ route::compile ──▶ table    │
//!  (startup)       │                         (duplicate/ambiguity       │
//!                  │                          checks, fatal on error)   │
//!                  │                                                    │
//!  client bytes ───┼─▶ server::listener ──▶ server::connection          │
//!  (per request)   │        │                   │  parse (http::parser) │
//!                  │   bounded accept           ▼                       │
//!                  │                        pipeline ──▶ route lookup   │
//!                  │                            │        (404/405/200)  │
//!                  │                            ▼                       │
//!                  │                     handler::adapter ──▶ handlers  │
//!                  │                     (bind, invoke on bounded pool, │
//!                  │                      encode via codec)             │
//!                  │                            │                       │
//!  response ◀──────┼────────────────────────────┘ (written in parse     │
//!                  │                               order per conn)      │
//!                  │                                                    │
//!                  │  ┌──────────────────────────────────────────────┐  │
//!                  │  │            Cross-Cutting Concerns            │  │
//!                  │  │  config   observability   lifecycle   error  │  │
//!                  │  └──────────────────────────────────────────────┘  │
//!                  └────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod codec;
pub mod handler;
pub mod http;
pub mod pipeline;
pub mod route;
pub mod server;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use error::{BindingError, CompileError, HandlerFault, ParseError, StartupError};
pub use handler::{handler_fn, Args, Handler, Problem, Reply};
pub use lifecycle::Shutdown;
pub use route::{Endpoint, Endpoints, RouteTable};
pub use server::Server;
