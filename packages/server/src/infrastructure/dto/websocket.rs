//! WebSocket envelope DTOs.
//!
//! Client → server:
//!
//! ```json
//! {"invocation_id": 1, "request": {"method": "JoinRoom", "params": {"room_id": 1}}}
//! ```
//!
//! Server → client:
//!
//! ```json
//! {"type": "completion", "invocation_id": 1, "result": {...}}
//! {"type": "completion", "invocation_id": 2, "error": {"kind": "invalid_state", "message": "..."}}
//! {"type": "event", "event": {"name": "UserJoined", "args": {...}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ClientEvent, ServerRequest, ServerResponse};

/// A remote call issued by the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvocationMessage {
    pub invocation_id: u64,
    pub request: ServerRequest,
}

/// Error category reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Database,
    /// The envelope could not be parsed
    InvalidRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDto {
    pub kind: ErrorKind,
    pub message: String,
}

/// A message pushed from the server to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// The outcome of an invocation. `invocation_id` is `null` when the request could not be parsed.
    Completion {
        invocation_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<ServerResponse>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorDto>,
    },
    /// A server-initiated notification
    Event { event: &'a ClientEvent },
}
