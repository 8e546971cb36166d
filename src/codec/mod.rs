//! Serialization boundary.
//!
//! # Responsibilities
//! - Decode request bodies into values for body-bound parameters
//! - Encode handler payloads into response bytes
//! - Negotiate by content type
//!
//! The framework itself never interprets payload semantics; everything
//! flows through this seam so the encoding library stays swappable.

use bytes::Bytes;
use thiserror::Error;

use crate::handler::reply::Payload;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
#[error("encode failed: {0}")]
pub struct EncodeError(String);

#[derive(Debug, Error)]
#[error("decode failed: {0}")]
pub struct DecodeError(String);

/// Whether a request content type is accepted for body decoding.
/// Parameters after `;` (charset etc.) are ignored.
pub fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|t| t.eq_ignore_ascii_case(APPLICATION_JSON))
}

/// Decode a JSON request body.
pub fn decode_json(body: &[u8]) -> Result<serde_json::Value, DecodeError> {
    serde_json::from_slice(body).map_err(|e| DecodeError(e.to_string()))
}

/// Encode a handler payload; returns the bytes and their content type.
/// `produces` applies to structured payloads, text payloads keep their
/// own type, and empty payloads have neither.
pub fn encode(payload: &Payload, produces: &str) -> Result<Option<(Bytes, String)>, EncodeError> {
    match payload {
        Payload::Empty => Ok(None),
        Payload::Text(text) => Ok(Some((
            Bytes::copy_from_slice(text.as_bytes()),
            TEXT_PLAIN.to_string(),
        ))),
        Payload::Json(value) => {
            let bytes = serde_json::to_vec(value).map_err(|e| EncodeError(e.to_string()))?;
            Ok(Some((Bytes::from(bytes), produces.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_content_type_detection() {
        assert!(is_json("application/json"));
        assert!(is_json("Application/JSON; charset=utf-8"));
        assert!(!is_json("text/plain"));
        assert!(!is_json(""));
    }

    #[test]
    fn decodes_json_bodies() {
        let v = decode_json(br#"{"id": 7}"#).unwrap();
        assert_eq!(v["id"], 7);
        assert!(decode_json(b"{not json").is_err());
    }

    #[test]
    fn encodes_payload_kinds() {
        let (bytes, ct) = encode(&Payload::Json(serde_json::json!({"a": 1})), APPLICATION_JSON)
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[..], br#"{"a":1}"#);
        assert_eq!(ct, APPLICATION_JSON);

        let (bytes, ct) = encode(&Payload::Text("hi".into()), APPLICATION_JSON)
            .unwrap()
            .unwrap();
        assert_eq!(&bytes[..], b"hi");
        assert!(ct.starts_with("text/plain"));

        assert!(encode(&Payload::Empty, APPLICATION_JSON).unwrap().is_none());
    }
}
