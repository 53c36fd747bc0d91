//! Error types for codec and transport operations.
//!
//! Invocation-level failures use [`RpcFault`](crate::rpc::RpcFault); this
//! module covers everything below it (framing, serialization, I/O).

use thiserror::Error;

/// Main error type for codec, buffer and exchange operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// I/O error during stream operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (bad frame, unexpected message, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Payload length exceeds the configured maximum.
    #[error("Data length too large: {length}, max payload: {max}")]
    PayloadTooLarge { length: usize, max: usize },

    /// No serialization registered for the given name or id.
    #[error("Unknown serialization: {0}")]
    UnknownSerialization(String),

    /// Payload could not be encoded or decoded by the body codec.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Malformed connection descriptor.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No response arrived in time.
    #[error("Waiting for response of request {id} timed out after {timeout_ms}ms")]
    Timeout { id: u64, timeout_ms: u64 },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl RemoteError {
    /// Whether this error was produced by a serialization plug-in.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            RemoteError::Json(_)
                | RemoteError::MsgPackEncode(_)
                | RemoteError::MsgPackDecode(_)
                | RemoteError::Codec(_)
        )
    }
}

/// Failure reported by a server-side request handler.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No service or method matches the request.
    #[error("{0}")]
    NotFound(String),

    /// The handler could not process the request.
    #[error("{0}")]
    Failed(String),
}

/// Result type alias using RemoteError.
pub type Result<T> = std::result::Result<T, RemoteError>;
