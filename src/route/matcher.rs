//! Compiled route table and path matching.
//!
//! # Responsibilities
//! - Hold the per-method tries of compiled routes
//! - Resolve (method, path) to a route plus extracted parameters
//! - Distinguish "no route at all" from "route exists under other methods"
//!
//! Immutable after construction; shared via `Arc` with no locking. Children
//! are tried literal-first, then param, then wildcard, mirroring the
//! compiler's precedence rule, with backtracking so a dead literal branch
//! falls back to its param or wildcard sibling.

use std::collections::HashMap;

use http::Method;

use crate::route::model::{Route, RouteRef, Segment};
use crate::route::pattern;

/// Result of a table lookup.
#[derive(Debug)]
pub enum Lookup {
    /// A route matched; `params` holds captures in declaration order.
    Matched {
        route: RouteRef,
        params: Vec<(String, String)>,
    },
    /// The path exists under other methods. `allow` is sorted.
    MethodNotAllowed { allow: Vec<Method> },
    /// No route under any method.
    NotFound,
}

#[derive(Default)]
struct Node {
    literals: HashMap<String, Node>,
    param: Option<Box<Node>>,
    /// Wildcards are always terminal, so the child is just a route index.
    wildcard: Option<usize>,
    terminal: Option<usize>,
}

/// Two routes landed on the same trie position: they accept the same
/// concrete paths and precedence cannot order them.
pub(crate) struct InsertConflict {
    pub existing: usize,
    pub incoming: usize,
}

impl Node {
    fn insert(&mut self, segments: &[Segment], idx: usize) -> Result<(), InsertConflict> {
        match segments.split_first() {
            None => match self.terminal {
                Some(existing) => Err(InsertConflict {
                    existing,
                    incoming: idx,
                }),
                None => {
                    self.terminal = Some(idx);
                    Ok(())
                }
            },
            Some((Segment::Literal(text), rest)) => self
                .literals
                .entry(text.clone())
                .or_default()
                .insert(rest, idx),
            Some((Segment::Param(_), rest)) => self
                .param
                .get_or_insert_with(Box::default)
                .insert(rest, idx),
            Some((Segment::Wildcard(_), _)) => match self.wildcard {
                Some(existing) => Err(InsertConflict {
                    existing,
                    incoming: idx,
                }),
                None => {
                    self.wildcard = Some(idx);
                    Ok(())
                }
            },
        }
    }

    /// Walk the trie; on a match, `captures` holds the raw captured values
    /// in pattern order (the wildcard remainder joined with `/`).
    fn walk(&self, segments: &[String], at: usize, captures: &mut Vec<String>) -> Option<usize> {
        if at == segments.len() {
            if let Some(idx) = self.terminal {
                return Some(idx);
            }
            // A wildcard also matches the empty remainder, but an exact
            // terminal above outranks it.
            if let Some(idx) = self.wildcard {
                captures.push(String::new());
                return Some(idx);
            }
            return None;
        }

        if let Some(child) = self.literals.get(&segments[at]) {
            if let Some(idx) = child.walk(segments, at + 1, captures) {
                return Some(idx);
            }
        }

        if let Some(child) = &self.param {
            captures.push(segments[at].clone());
            if let Some(idx) = child.walk(segments, at + 1, captures) {
                return Some(idx);
            }
            captures.pop();
        }

        if let Some(idx) = self.wildcard {
            captures.push(segments[at..].join("/"));
            return Some(idx);
        }

        None
    }
}

/// The full compiled route set, organized per method for fast lookup.
pub struct RouteTable {
    tries: HashMap<Method, Node>,
    routes: Vec<RouteRef>,
}

impl RouteTable {
    /// Build the table from validated routes. A conflict means two routes
    /// occupy the same trie position, which the compiler reports as an
    /// ambiguity.
    pub(crate) fn build(routes: Vec<Route>) -> Result<Self, (InsertConflict, Vec<Route>)> {
        let mut tries: HashMap<Method, Node> = HashMap::new();
        let mut conflict = None;
        for (idx, route) in routes.iter().enumerate() {
            let root = tries.entry(route.method.clone()).or_default();
            if let Err(c) = root.insert(&route.segments, idx) {
                conflict = Some(c);
                break;
            }
        }
        if let Some(conflict) = conflict {
            return Err((conflict, routes));
        }
        Ok(Self {
            tries,
            routes: routes.into_iter().map(RouteRef::new).collect(),
        })
    }

    /// Match a request path. The path must not include the query string.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let Some(segments) = pattern::split_path(path) else {
            return Lookup::NotFound;
        };

        if let Some(root) = self.tries.get(method) {
            let mut captures = Vec::new();
            if let Some(idx) = root.walk(&segments, 0, &mut captures) {
                let route = self.routes[idx].clone();
                let params = route
                    .capture_names()
                    .map(str::to_string)
                    .zip(captures)
                    .collect();
                return Lookup::Matched { route, params };
            }
        }

        // 405 needs to know whether any other method serves this path.
        let mut allow: Vec<Method> = Vec::new();
        for (other, root) in &self.tries {
            if other == method {
                continue;
            }
            let mut scratch = Vec::new();
            if root.walk(&segments, 0, &mut scratch).is_some() {
                allow.push(other.clone());
            }
        }
        if allow.is_empty() {
            Lookup::NotFound
        } else {
            allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            Lookup::MethodNotAllowed { allow }
        }
    }

    /// All compiled routes, for startup logging and reachability checks.
    pub fn routes(&self) -> &[RouteRef] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.len())
            .field("methods", &self.tries.len())
            .finish()
    }
}
