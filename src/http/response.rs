//! Response construction and wire serialization.
//!
//! # Responsibilities
//! - Build responses (status, headers, body)
//! - Serialize HTTP/1.1 response framing into the connection buffer
//! - Provide the canonical JSON error body shape
//!
//! Content-Length framing only; the framework buffers handler output, so
//! chunked responses are never needed.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use uuid::Uuid;

/// One response, ready to serialize.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    /// Close the connection after writing, regardless of keep-alive.
    close: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            close: false,
        }
    }

    pub fn with_body(mut self, content_type: &str, body: Bytes) -> Self {
        self.headers.push((
            http::header::CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream")),
        ));
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Canonical error body, `{"error": "..."}`.
    pub fn error_json(status: StatusCode, detail: &str) -> Self {
        let body = serde_json::json!({ "error": detail }).to_string();
        Self::new(status).with_body("application/json", Bytes::from(body))
    }

    pub fn allow_header(self, methods: &[Method]) -> Self {
        let list = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        self.with_header(
            http::header::ALLOW,
            HeaderValue::from_str(&list).unwrap_or(HeaderValue::from_static("GET")),
        )
    }

    /// Mark the connection for closure once this response is written.
    pub fn close_connection(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn must_close(&self) -> bool {
        self.close
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize into `out`. `head_only` suppresses the body for HEAD
    /// requests while keeping the Content-Length of the full response.
    pub fn write_to(&self, out: &mut BytesMut, request_id: Option<Uuid>, head_only: bool) {
        out.reserve(128 + self.body.len());
        out.put_slice(b"HTTP/1.1 ");
        out.put_slice(self.status.as_str().as_bytes());
        out.put_slice(b" ");
        out.put_slice(
            self.status
                .canonical_reason()
                .unwrap_or("Unknown")
                .as_bytes(),
        );
        out.put_slice(b"\r\n");

        for (name, value) in &self.headers {
            out.put_slice(name.as_str().as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        out.put_slice(b"content-length: ");
        out.put_slice(self.body.len().to_string().as_bytes());
        out.put_slice(b"\r\n");

        if let Some(id) = request_id {
            out.put_slice(b"x-request-id: ");
            out.put_slice(id.to_string().as_bytes());
            out.put_slice(b"\r\n");
        }

        if self.close {
            out.put_slice(b"connection: close\r\n");
        } else {
            out.put_slice(b"connection: keep-alive\r\n");
        }

        out.put_slice(b"\r\n");
        if !head_only {
            out.put_slice(&self.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(resp: &Response) -> String {
        let mut out = BytesMut::new();
        resp.write_to(&mut out, None, false);
        String::from_utf8(out.to_vec()).unwrap()
    }

    #[test]
    fn serializes_status_line_and_framing() {
        let resp = Response::new(StatusCode::OK).with_body("text/plain", Bytes::from("hi"));
        let text = rendered(&resp);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(text.contains("content-length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn error_body_is_json() {
        let resp = Response::error_json(StatusCode::NOT_FOUND, "no route");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(&resp.body()[..], br#"{"error":"no route"}"#);
    }

    #[test]
    fn allow_header_lists_methods() {
        let resp = Response::new(StatusCode::METHOD_NOT_ALLOWED)
            .allow_header(&[Method::DELETE, Method::GET]);
        assert!(rendered(&resp).contains("allow: DELETE, GET\r\n"));
    }

    #[test]
    fn head_only_keeps_content_length() {
        let resp = Response::new(StatusCode::OK).with_body("text/plain", Bytes::from("body"));
        let mut out = BytesMut::new();
        resp.write_to(&mut out, None, true);
        let text = String::from_utf8(out.to_vec()).unwrap();
        assert!(text.contains("content-length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn close_marks_connection_header() {
        let resp = Response::new(StatusCode::BAD_REQUEST).close_connection();
        assert!(resp.must_close());
        assert!(rendered(&resp).contains("connection: close\r\n"));
    }

    #[test]
    fn request_id_is_echoed() {
        let id = Uuid::new_v4();
        let resp = Response::new(StatusCode::OK);
        let mut out = BytesMut::new();
        resp.write_to(&mut out, Some(id), false);
        let text = String::from_utf8(out.to_vec()).unwrap();
        assert!(text.contains(&format!("x-request-id: {id}")));
    }
}
