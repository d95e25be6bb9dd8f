//! Backend IPC protocol
//!
//! Newline-delimited JSON exchanged with the hardware control backend over a
//! Unix domain socket. Each request carries an id that the response echoes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum message size for IPC (8KB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Maximum length of a role, component or attribute name
const MAX_NAME_LENGTH: usize = 128;

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: generate_request_id(),
            request,
        }
    }

    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    /// Resolve the component currently holding a role
    LookupComponent { role: String },
    /// Read the current value of a component attribute
    ReadAttribute { component: String, attribute: String },
}

impl Request {
    /// Validate request parameters before sending to the backend
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Ping => Ok(()),
            Request::LookupComponent { role } => validate_name("role", role),
            Request::ReadAttribute { component, attribute } => {
                validate_name("component", component)?;
                validate_name("attribute", attribute)
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::LookupComponent { .. } => "LookupComponent",
            Request::ReadAttribute { .. } => "ReadAttribute",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

/// Failure category reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No component matches the requested role or name
    Lookup,
    /// The component failed to talk to its hardware
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Name of the component resolved by LookupComponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Attribute value returned by ReadAttribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ResponseData {
    pub fn component(name: impl Into<String>) -> Self { Self { component: Some(name.into()), ..Self::default() } }
    pub fn value(v: serde_json::Value) -> Self { Self { value: Some(v), ..Self::default() } }
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(ResponseData::default())
    }

    pub fn error(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Response::Error { kind, message: msg.into() }
    }

    /// Check that a successful response carries what the request asked for
    pub fn answers(&self, req: &Request) -> bool {
        match self {
            Response::Error { .. } => true,
            Response::Ok(data) => match req {
                Request::Ping => true,
                Request::LookupComponent { .. } => data.component.is_some(),
                Request::ReadAttribute { .. } => data.value.is_some(),
            },
        }
    }
}

pub fn validate_name(what: &str, name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{} cannot be empty", what));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "{} too long: {} > {} chars",
            what,
            name.len(),
            MAX_NAME_LENGTH
        ));
    }

    if let Some(c) = name.chars().find(|c| c.is_control()) {
        return Err(format!("{} contains control character {:?}", what, c));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let env = RequestEnvelope::with_id(
            Request::LookupComponent { role: "power-control".into() },
            7,
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["cmd"], "LookupComponent");
        assert_eq!(json["data"]["role"], "power-control");
    }

    #[test]
    fn test_error_response_parses() {
        let line = r#"{"id":3,"status":"error","kind":"lookup","message":"no such role"}"#;
        let env: ResponseEnvelope = serde_json::from_str(line).unwrap();
        assert_eq!(env.id, 3);
        match env.response {
            Response::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::Lookup);
                assert_eq!(message, "no such role");
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_plain_ok_carries_no_data() {
        let json = serde_json::to_value(ResponseEnvelope::new(4, Response::ok())).unwrap();
        assert_eq!(json, serde_json::json!({"id": 4, "status": "ok"}));
    }

    #[test]
    fn test_response_answers_request() {
        let read = Request::ReadAttribute {
            component: "pcu".into(),
            attribute: "memory_ids".into(),
        };
        assert!(!Response::ok().answers(&read));
        assert!(Response::Ok(ResponseData::value(serde_json::json!([]))).answers(&read));
        assert!(Response::error(ErrorKind::Io, "dead").answers(&read));
        assert!(!Response::Ok(ResponseData::value(serde_json::json!(1)))
            .answers(&Request::LookupComponent { role: "x".into() }));
    }

    #[test]
    fn test_validate_names() {
        assert!(Request::Ping.validate().is_ok());
        assert!(Request::LookupComponent { role: "power-control".into() }.validate().is_ok());
        assert!(Request::LookupComponent { role: String::new() }.validate().is_err());
        assert!(Request::LookupComponent { role: "a\nb".into() }.validate().is_err());
        assert!(Request::LookupComponent { role: "r".repeat(200) }.validate().is_err());
    }

    #[test]
    fn test_request_ids_increase() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(b > a);
    }
}
