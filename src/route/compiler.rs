//! Route compilation.
//!
//! # Responsibilities
//! - Parse every declared pattern into segments
//! - Reject duplicate and ambiguous declarations, naming both offenders
//! - Reconcile declared parameter bindings with pattern captures
//! - Emit the immutable, matchable route table
//!
//! Runs once at startup. A failure here must keep the server from binding;
//! nothing in this module is reachable from request-handling tasks.

use std::collections::HashSet;

use http::Method;

use crate::error::CompileError;
use crate::route::matcher::RouteTable;
use crate::route::model::{EndpointDecl, ParamSource, ParamSpec, Route};
use crate::route::pattern;

/// Compile declared endpoints into a route table.
pub fn compile(declarations: Vec<EndpointDecl>) -> Result<RouteTable, CompileError> {
    let mut seen: HashSet<(Method, String)> = HashSet::new();
    let mut routes = Vec::with_capacity(declarations.len());

    for decl in declarations {
        let segments = pattern::parse(&decl.pattern)?;
        let normalized = pattern::render(&segments);

        if !seen.insert((decl.method.clone(), normalized.clone())) {
            return Err(CompileError::DuplicateRoute {
                method: decl.method.to_string(),
                pattern: normalized,
            });
        }

        let params = reconcile_params(&decl, &segments, &normalized)?;

        routes.push(Route {
            method: decl.method,
            pattern: normalized,
            segments,
            handler: decl.handler,
            params,
            produces: decl.produces,
            blocking: decl.blocking,
        });
    }

    RouteTable::build(routes).map_err(|(conflict, routes)| {
        let existing = &routes[conflict.existing];
        let incoming = &routes[conflict.incoming];
        CompileError::AmbiguousRoute {
            method: incoming.method.to_string(),
            first: existing.pattern.clone(),
            second: incoming.pattern.clone(),
        }
    })
}

/// Cross-check declared bindings against the pattern and fill in the
/// implicit ones: every capture binds as a required path parameter unless
/// the declaration already names it.
fn reconcile_params(
    decl: &EndpointDecl,
    segments: &[crate::route::model::Segment],
    normalized: &str,
) -> Result<Vec<ParamSpec>, CompileError> {
    let captures: Vec<&str> = segments
        .iter()
        .filter_map(crate::route::model::Segment::capture_name)
        .collect();

    let invalid = |reason: String| CompileError::InvalidPattern {
        pattern: normalized.to_string(),
        reason,
    };

    let mut body_count = 0;
    for spec in &decl.params {
        match spec.source {
            ParamSource::Path => {
                if !captures.contains(&spec.name.as_str()) {
                    return Err(invalid(format!(
                        "declared path parameter {:?} does not appear in the pattern",
                        spec.name
                    )));
                }
            }
            ParamSource::Body => body_count += 1,
            ParamSource::Query | ParamSource::Header => {}
        }
    }
    if body_count > 1 {
        return Err(invalid("more than one body parameter declared".to_string()));
    }

    let mut params = decl.params.clone();
    for name in captures {
        let declared = params
            .iter()
            .any(|p| p.source == ParamSource::Path && p.name == name);
        if !declared {
            params.push(ParamSpec {
                name: name.to_string(),
                source: ParamSource::Path,
                required: true,
            });
        }
    }
    Ok(params)
}
