//! JSON envelope returned by every `/api` endpoint
//!
//! ```text
//! {"status": "OK" | "KO" | "INVALID" | "INVALID_SESSION" | <custom>, "response": <payload>}
//! ```
//!
//! The envelope is delivered with HTTP 200; clients treat `status`, not the
//! HTTP status line, as authoritative.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope discriminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Ok,
    Ko,
    Invalid,
    InvalidSession,
    /// Handler-specific status string
    Custom(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Ok => "OK",
            Status::Ko => "KO",
            Status::Invalid => "INVALID",
            Status::InvalidSession => "INVALID_SESSION",
            Status::Custom(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OK" => Status::Ok,
            "KO" => Status::Ko,
            "INVALID" => Status::Invalid,
            "INVALID_SESSION" => Status::InvalidSession,
            _ => Status::Custom(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    pub response: Value,
}

impl Envelope {
    pub fn new(status: Status, response: Value) -> Self {
        Self { status, response }
    }

    /// `OK` with a payload
    pub fn ok(response: impl Serialize) -> Self {
        let response = serde_json::to_value(response).unwrap_or(Value::Null);
        Self::new(Status::Ok, response)
    }

    /// `OK` with a null payload
    pub fn ok_empty() -> Self {
        Self::new(Status::Ok, Value::Null)
    }

    /// `KO` carrying a single human-readable message
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::error_with(Status::Ko, message)
    }

    /// Error envelope with an explicit status
    pub fn error_with(status: Status, message: impl std::fmt::Display) -> Self {
        Self::new(status, Value::from(vec![message.to_string()]))
    }

    pub fn invalid_session() -> Self {
        Self::new(Status::InvalidSession, Value::Null)
    }

    /// Unknown route
    pub fn not_found() -> Self {
        Self::error_with(Status::Invalid, "invalid method")
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn to_json(&self) -> String {
        // Status and Value always serialize
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"status":"KO"}"#))
    }
}
