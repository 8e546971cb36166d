//! Incremental HTTP/1.1 request parser.
//!
//! # Responsibilities
//! - Parse request line, headers, and body (Content-Length or chunked)
//!   from a growing connection buffer
//! - Enforce URI, header-block, and body size limits before buffering
//! - Report malformed framing distinctly from size rejections
//!
//! The parser is stateless: each call re-examines the buffer from the
//! front and either consumes one complete request, asks for more bytes
//! (`Ok(None)`), or fails. Limits are checked as early as the available
//! bytes allow, so an oversized declaration is rejected without waiting
//! for (or storing) the full payload.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Method, Version};
use memchr::memmem;

use crate::error::ParseError;
use crate::http::request::RequestHead;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Size limits applied while parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub max_uri_bytes: usize,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_uri_bytes: 8 * 1024,
            max_header_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// One fully parsed request.
#[derive(Debug)]
pub struct ParsedRequest {
    pub head: RequestHead,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestParser {
    limits: ParserLimits,
}

impl RequestParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self { limits }
    }

    /// Try to parse one complete request off the front of `buf`. Consumed
    /// bytes are split off on success; `Ok(None)` means more bytes are
    /// needed.
    pub fn parse(&self, buf: &mut BytesMut) -> Result<Option<ParsedRequest>, ParseError> {
        let Some(header_end) = memmem::find(buf, HEADER_END) else {
            // Header block still incomplete; bound how large it may grow.
            if buf.len() > self.limits.max_header_bytes + self.limits.max_uri_bytes {
                return Err(ParseError::HeadersTooLarge {
                    limit: self.limits.max_header_bytes,
                });
            }
            return Ok(None);
        };

        let head_bytes = &buf[..header_end];
        let line_end = memmem::find(head_bytes, CRLF).unwrap_or(head_bytes.len());
        let (method, target, version) = self.parse_request_line(&head_bytes[..line_end])?;

        let header_block = &head_bytes[(line_end + CRLF.len()).min(head_bytes.len())..];
        if header_block.len() > self.limits.max_header_bytes {
            return Err(ParseError::HeadersTooLarge {
                limit: self.limits.max_header_bytes,
            });
        }
        let headers = parse_headers(header_block)?;

        let body_start = header_end + HEADER_END.len();
        let framing = body_framing(&headers, self.limits.max_body_bytes)?;

        let (body, consumed) = match framing {
            BodyFraming::None => (Bytes::new(), body_start),
            BodyFraming::Length(len) => {
                if buf.len() < body_start + len {
                    return Ok(None);
                }
                let body = Bytes::copy_from_slice(&buf[body_start..body_start + len]);
                (body, body_start + len)
            }
            BodyFraming::Chunked => {
                match parse_chunked(&buf[body_start..], self.limits.max_body_bytes)? {
                    None => {
                        // Chunk framing and trailers inflate the encoding,
                        // but an incomplete stream may not buffer without
                        // limit either.
                        let cap = self.limits.max_body_bytes * 4 + self.limits.max_header_bytes;
                        if buf.len() - body_start > cap {
                            return Err(ParseError::PayloadTooLarge {
                                limit: self.limits.max_body_bytes,
                            });
                        }
                        return Ok(None);
                    }
                    Some((body, used)) => (body, body_start + used),
                }
            }
        };

        let _ = buf.split_to(consumed);

        let head = RequestHead::new(method, target, version, headers)?;
        Ok(Some(ParsedRequest { head, body }))
    }

    fn parse_request_line(
        &self,
        line: &[u8],
    ) -> Result<(Method, String, Version), ParseError> {
        let malformed = |reason: &str| ParseError::MalformedRequest(reason.to_string());

        let mut parts = line.split(|&b| b == b' ');
        let method = parts.next().filter(|m| !m.is_empty()).ok_or_else(|| {
            malformed("empty request line")
        })?;
        let target = parts.next().ok_or_else(|| malformed("missing request target"))?;
        let version = parts.next().ok_or_else(|| malformed("missing HTTP version"))?;
        if parts.next().is_some() {
            return Err(malformed("extra tokens in request line"));
        }

        let method = Method::from_bytes(method)
            .map_err(|_| malformed("invalid method token"))?;

        if target.len() > self.limits.max_uri_bytes {
            return Err(ParseError::UriTooLong {
                limit: self.limits.max_uri_bytes,
            });
        }
        if !target.starts_with(b"/") {
            return Err(malformed("request target must be origin-form"));
        }
        let target = std::str::from_utf8(target)
            .map_err(|_| malformed("request target is not valid UTF-8"))?
            .to_string();

        let version = match version {
            b"HTTP/1.1" => Version::HTTP_11,
            b"HTTP/1.0" => Version::HTTP_10,
            _ => return Err(malformed("unsupported HTTP version")),
        };

        Ok((method, target, version))
    }
}

fn parse_headers(block: &[u8]) -> Result<HeaderMap, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedRequest(reason.to_string());

    let mut headers = HeaderMap::new();
    let mut offset = 0;
    let mut finder = memmem::find_iter(block, CRLF);
    loop {
        let line_end = match finder.next() {
            Some(end) => end,
            None => block.len(),
        };
        if offset >= block.len() {
            break;
        }
        let line = &block[offset..line_end];
        offset = line_end + CRLF.len();

        if line.is_empty() {
            return Err(malformed("empty header line"));
        }
        // Continuation lines (obs-fold) are obsolete and ambiguous.
        if line[0] == b' ' || line[0] == b'\t' {
            return Err(malformed("folded header line"));
        }
        let colon = memchr::memchr(b':', line).ok_or_else(|| malformed("header missing ':'"))?;
        let name = HeaderName::from_bytes(&line[..colon])
            .map_err(|_| malformed("invalid header name"))?;
        let value = trim_ows(&line[colon + 1..]);
        let value =
            HeaderValue::from_bytes(value).map_err(|_| malformed("invalid header value"))?;
        headers.append(name, value);

        if line_end == block.len() {
            break;
        }
    }
    Ok(headers)
}

fn trim_ows(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

enum BodyFraming {
    None,
    Length(usize),
    Chunked,
}

fn body_framing(headers: &HeaderMap, max_body: usize) -> Result<BodyFraming, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedRequest(reason.to_string());

    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case("chunked"));

    let mut lengths = headers.get_all(CONTENT_LENGTH).iter();
    let length = match lengths.next() {
        None => None,
        Some(first) => {
            let first = first
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| malformed("invalid content-length"))?;
            // Duplicate Content-Length headers must agree.
            for other in lengths {
                let other = other
                    .to_str()
                    .ok()
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .ok_or_else(|| malformed("invalid content-length"))?;
                if other != first {
                    return Err(malformed("conflicting content-length headers"));
                }
            }
            Some(first)
        }
    };

    if chunked {
        if length.is_some() {
            // Request smuggling vector; reject outright.
            return Err(malformed("both content-length and chunked framing"));
        }
        return Ok(BodyFraming::Chunked);
    }
    match length {
        None | Some(0) => Ok(BodyFraming::None),
        Some(len) if len > max_body => Err(ParseError::PayloadTooLarge { limit: max_body }),
        Some(len) => Ok(BodyFraming::Length(len)),
    }
}

/// Decode a chunked body. Returns the decoded bytes and how many input
/// bytes were consumed, or `None` when the input is still incomplete.
fn parse_chunked(input: &[u8], max_body: usize) -> Result<Option<(Bytes, usize)>, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedRequest(reason.to_string());

    let mut decoded = BytesMut::new();
    let mut offset = 0;
    loop {
        let Some(line_end) = memmem::find(&input[offset..], CRLF) else {
            return incomplete_or_oversized(decoded.len(), max_body);
        };
        let size_line = &input[offset..offset + line_end];
        // Chunk extensions after ';' are ignored.
        let size_part = match memchr::memchr(b';', size_line) {
            Some(semi) => &size_line[..semi],
            None => size_line,
        };
        let size_str =
            std::str::from_utf8(size_part).map_err(|_| malformed("invalid chunk size"))?;
        let size = usize::from_str_radix(size_str.trim(), 16)
            .map_err(|_| malformed("invalid chunk size"))?;
        offset += line_end + CRLF.len();

        if size == 0 {
            // Trailer section: header lines until a bare CRLF.
            loop {
                let Some(trailer_end) = memmem::find(&input[offset..], CRLF) else {
                    return incomplete_or_oversized(decoded.len(), max_body);
                };
                let line = &input[offset..offset + trailer_end];
                offset += trailer_end + CRLF.len();
                if line.is_empty() {
                    return Ok(Some((decoded.freeze(), offset)));
                }
            }
        }

        if decoded.len() + size > max_body {
            return Err(ParseError::PayloadTooLarge { limit: max_body });
        }
        if input.len() < offset + size + CRLF.len() {
            return incomplete_or_oversized(decoded.len(), max_body);
        }
        decoded.extend_from_slice(&input[offset..offset + size]);
        offset += size;
        if &input[offset..offset + CRLF.len()] != CRLF {
            return Err(malformed("chunk data not terminated by CRLF"));
        }
        offset += CRLF.len();
    }
}

fn incomplete_or_oversized(
    decoded_so_far: usize,
    max_body: usize,
) -> Result<Option<(Bytes, usize)>, ParseError> {
    if decoded_so_far > max_body {
        Err(ParseError::PayloadTooLarge { limit: max_body })
    } else {
        Ok(None)
    }
}
