//! Parsed request representation.
//!
//! # Responsibilities
//! - Hold the parsed request line and headers (`RequestHead`)
//! - Hold per-exchange state (`RequestContext`): id, head, body, matched
//!   route and captures once matching has run
//!
//! A request id is attached as early as possible so every later log line
//! and error can be correlated.

use bytes::Bytes;
use http::header::{HeaderMap, CONNECTION};
use http::{Method, Version};
use uuid::Uuid;

use crate::error::ParseError;
use crate::route::pattern::percent_decode;
use crate::route::RouteRef;

/// Request line plus headers.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub version: Version,
    /// Raw request target as received (origin-form).
    pub target: String,
    path_len: usize,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(
        method: Method,
        target: String,
        version: Version,
        headers: HeaderMap,
    ) -> Result<Self, ParseError> {
        let path_len = memchr::memchr(b'?', target.as_bytes()).unwrap_or(target.len());
        Ok(Self {
            method,
            version,
            target,
            path_len,
            headers,
        })
    }

    /// Path portion of the target, still percent-encoded.
    pub fn path(&self) -> &str {
        &self.target[..self.path_len]
    }

    /// Query portion without the `?`, if present.
    pub fn query(&self) -> Option<&str> {
        self.target.get(self.path_len + 1..)
    }

    /// First value of a header, when it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decoded query parameters in wire order. Keys without `=` get an
    /// empty value; undecodable components are dropped.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let Some(query) = self.query() else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (key, value) = match pair.split_once('=') {
                    Some((k, v)) => (k, v),
                    None => (pair, ""),
                };
                Some((decode_component(key)?, decode_component(value)?))
            })
            .collect()
    }

    /// Whether the connection should stay open after this exchange.
    pub fn keep_alive(&self) -> bool {
        let connection = self
            .headers
            .get(CONNECTION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        match self.version {
            Version::HTTP_10 => connection.eq_ignore_ascii_case("keep-alive"),
            _ => !connection
                .split(',')
                .any(|t| t.trim().eq_ignore_ascii_case("close")),
        }
    }
}

/// In query strings `+` means space, unlike in paths.
fn decode_component(raw: &str) -> Option<String> {
    percent_decode(&raw.replace('+', " "))
}

/// State for one request/response exchange. Created when a complete
/// request is parsed off the connection; the adapter borrows it for the
/// duration of the invocation.
#[derive(Debug)]
pub struct RequestContext {
    pub id: Uuid,
    pub head: RequestHead,
    pub body: Bytes,
    /// Filled in once the matcher has run.
    pub route: Option<RouteRef>,
    /// Path captures in declaration order.
    pub path_params: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new(head: RequestHead, body: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            head,
            body,
            route: None,
            path_params: Vec::new(),
        }
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
