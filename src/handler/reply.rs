//! Handler return values.

use http::StatusCode;
use serde::Serialize;

/// The payload a handler hands back; encoding to bytes happens at the
/// adapter boundary through the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
    Empty,
}

/// A successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    payload: Payload,
}

impl Reply {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            payload: Payload::Json(value),
        }
    }

    /// Serialize any value into a JSON reply. Failures surface as a
    /// `Problem` so the handler decides how to degrade.
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self, Problem> {
        serde_json::to_value(value)
            .map(Self::json)
            .map_err(|e| Problem::internal(format!("serialization failed: {e}")))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            payload: Payload::Empty,
        }
    }

    pub fn created(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            payload: Payload::Json(value),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(self) -> (StatusCode, Payload) {
        (self.status, self.payload)
    }
}

/// A declared error mapping: handlers return this to answer with an
/// explicit status instead of the default 500.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    status: StatusCode,
    detail: String,
}

impl Problem {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_builds_json_reply() {
        #[derive(Serialize)]
        struct User {
            id: u64,
        }
        let reply = Reply::serialize(&User { id: 7 }).unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.payload(), &Payload::Json(serde_json::json!({"id": 7})));
    }

    #[test]
    fn status_override() {
        let reply = Reply::json(serde_json::json!({})).with_status(StatusCode::ACCEPTED);
        assert_eq!(reply.status(), StatusCode::ACCEPTED);
    }
}
