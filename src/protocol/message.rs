//! Request and response entities carried by frames.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde_json::Value;

use crate::rpc::{RpcInvocation, RpcResult};

/// Protocol version stamped on requests and responses.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response status codes (byte 3 of a response header).
pub mod status {
    pub const OK: u8 = 20;
    pub const CLIENT_TIMEOUT: u8 = 30;
    pub const SERVER_TIMEOUT: u8 = 31;
    pub const BAD_REQUEST: u8 = 40;
    pub const BAD_RESPONSE: u8 = 50;
    pub const SERVICE_NOT_FOUND: u8 = 60;
    pub const SERVICE_ERROR: u8 = 70;
    pub const SERVER_ERROR: u8 = 80;
    pub const CLIENT_ERROR: u8 = 90;

    /// Human readable name for logs.
    pub fn name(status: u8) -> &'static str {
        match status {
            OK => "OK",
            CLIENT_TIMEOUT => "CLIENT_TIMEOUT",
            SERVER_TIMEOUT => "SERVER_TIMEOUT",
            BAD_REQUEST => "BAD_REQUEST",
            BAD_RESPONSE => "BAD_RESPONSE",
            SERVICE_NOT_FOUND => "SERVICE_NOT_FOUND",
            SERVICE_ERROR => "SERVICE_ERROR",
            SERVER_ERROR => "SERVER_ERROR",
            CLIENT_ERROR => "CLIENT_ERROR",
            _ => "UNKNOWN",
        }
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate a process-wide unique request id.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Body of a request or response.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// Nothing to send.
    #[default]
    Empty,
    /// Generic data value (event data, untyped calls).
    Value(Value),
    /// RPC call.
    Invocation(RpcInvocation),
    /// RPC outcome.
    Result(RpcResult),
    /// Body already encoded by the serialization in use; copied verbatim.
    Encoded(Bytes),
    /// Description of the fault that prevented decoding.
    Broken(String),
}

impl Payload {
    /// Short name of the variant, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Value(_) => "value",
            Payload::Invocation(_) => "invocation",
            Payload::Result(_) => "result",
            Payload::Encoded(_) => "encoded",
            Payload::Broken(_) => "broken",
        }
    }
}

/// A request frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub version: String,
    /// Reply expected.
    pub two_way: bool,
    /// Control message, not a business call.
    pub event: bool,
    /// Decoding the payload failed; `data` holds the fault.
    pub broken: bool,
    pub data: Payload,
}

impl Request {
    /// Two-way request with a fresh id.
    pub fn new(data: Payload) -> Self {
        Self::with_id(next_request_id(), data)
    }

    /// Two-way request with an explicit id.
    pub fn with_id(id: u64, data: Payload) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            two_way: true,
            event: false,
            broken: false,
            data,
        }
    }

    /// Heartbeat event (null data, reply expected).
    pub fn heartbeat() -> Self {
        let mut request = Self::new(Payload::Value(Value::Null));
        request.event = true;
        request
    }

    /// Whether this is a heartbeat event.
    pub fn is_heartbeat(&self) -> bool {
        self.event && matches!(self.data, Payload::Value(Value::Null) | Payload::Empty)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request [id={}, version={}, twoway={}, event={}, broken={}, data={}]",
            self.id,
            self.version,
            self.two_way,
            self.event,
            self.broken,
            self.data.kind()
        )
    }
}

/// A response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    pub version: String,
    pub status: u8,
    pub event: bool,
    /// Result payload, meaningful when `status == OK`.
    pub result: Payload,
    /// Error text, meaningful when `status != OK`.
    pub error_message: Option<String>,
}

impl Response {
    /// OK response for the given request id.
    pub fn new(id: u64) -> Self {
        Self::with_version(id, PROTOCOL_VERSION)
    }

    pub fn with_version(id: u64, version: &str) -> Self {
        Self {
            id,
            version: version.to_string(),
            status: status::OK,
            event: false,
            result: Payload::Empty,
            error_message: None,
        }
    }

    /// OK response answering `request`.
    pub fn ok(request: &Request, result: Payload) -> Self {
        let mut response = Self::with_version(request.id, &request.version);
        response.event = request.event;
        response.result = result;
        response
    }

    /// Error response answering `request`.
    pub fn error(request: &Request, status: u8, message: impl Into<String>) -> Self {
        let mut response = Self::with_version(request.id, &request.version);
        response.event = request.event;
        response.status = status;
        response.error_message = Some(message.into());
        response
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    #[inline]
    pub fn is_bad_response(&self) -> bool {
        self.status == status::BAD_RESPONSE
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response [id={}, version={}, status={}, event={}, error={}, result={}]",
            self.id,
            self.version,
            status::name(self.status),
            self.event,
            self.error_message.as_deref().unwrap_or(""),
            self.result.kind()
        )
    }
}

/// Anything the codec can put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    /// Not enough buffered bytes; nothing was consumed.
    NeedMoreInput,
    /// Bytes that are not part of any frame, consumed from the buffer.
    Unrecognized(Bytes),
    Request(Request),
    Response(Response),
}
