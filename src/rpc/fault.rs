//! Invocation-level fault with retry classification.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::RemoteError;

/// Fault category carried as a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FaultKind {
    Unknown = 0,
    Network = 1,
    Timeout = 2,
    /// Raised by the remote business implementation.
    Business = 3,
    /// No provider available, or the provider refused the call.
    Forbidden = 4,
    Serialization = 5,
}

impl FaultKind {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a numeric code back to a kind; unknown codes become `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FaultKind::Network,
            2 => FaultKind::Timeout,
            3 => FaultKind::Business,
            4 => FaultKind::Forbidden,
            5 => FaultKind::Serialization,
            _ => FaultKind::Unknown,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Unknown => "unknown",
            FaultKind::Network => "network",
            FaultKind::Timeout => "timeout",
            FaultKind::Business => "business",
            FaultKind::Forbidden => "forbidden",
            FaultKind::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Shared, cloneable cause.
pub type FaultCause = Arc<dyn StdError + Send + Sync>;

/// Failure of a single invocation.
///
/// The two classification bits used by failover are derived from the
/// kind: [`RpcFault::is_business`] and [`RpcFault::is_timeout`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RpcFault {
    kind: FaultKind,
    message: String,
    #[source]
    cause: Option<FaultCause>,
}

impl RpcFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach a cause.
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach an already shared cause.
    pub fn with_shared_cause(mut self, cause: FaultCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Business, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Network, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Forbidden, message)
    }

    /// Wrap an error that did not originate in the RPC layer.
    pub fn from_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::new(FaultKind::Unknown, error.to_string()).with_cause(error)
    }

    #[inline]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    #[inline]
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&FaultCause> {
        self.cause.as_ref()
    }

    #[inline]
    pub fn is_business(&self) -> bool {
        self.kind == FaultKind::Business
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        self.kind == FaultKind::Timeout
    }
}

impl From<RemoteError> for RpcFault {
    fn from(error: RemoteError) -> Self {
        let kind = match &error {
            RemoteError::Timeout { .. } => FaultKind::Timeout,
            e if e.is_serialization() => FaultKind::Serialization,
            _ => FaultKind::Network,
        };
        RpcFault::new(kind, error.to_string()).with_cause(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(RpcFault::business("x").is_business());
        assert!(!RpcFault::business("x").is_timeout());
        assert!(RpcFault::timeout("x").is_timeout());
        assert!(!RpcFault::network("x").is_business());
        assert_eq!(RpcFault::forbidden("x").code(), 4);
    }

    #[test]
    fn test_code_round_trip() {
        for kind in [
            FaultKind::Unknown,
            FaultKind::Network,
            FaultKind::Timeout,
            FaultKind::Business,
            FaultKind::Forbidden,
            FaultKind::Serialization,
        ] {
            assert_eq!(FaultKind::from_code(kind.code()), kind);
        }
        assert_eq!(FaultKind::from_code(99), FaultKind::Unknown);
    }

    #[test]
    fn test_cause_chain() {
        let inner = RpcFault::network("connection reset");
        let outer = RpcFault::new(FaultKind::Network, "failed").with_cause(inner);

        let source = outer.source().unwrap();
        assert_eq!(source.to_string(), "connection reset");
        assert_eq!(outer.to_string(), "failed");
    }

    #[test]
    fn test_from_remote_error() {
        let timeout: RpcFault = RemoteError::Timeout {
            id: 1,
            timeout_ms: 10,
        }
        .into();
        assert!(timeout.is_timeout());

        let closed: RpcFault = RemoteError::ConnectionClosed.into();
        assert_eq!(closed.kind(), FaultKind::Network);

        let codec: RpcFault = RemoteError::Codec("bad".into()).into();
        assert_eq!(codec.kind(), FaultKind::Serialization);
    }

    #[test]
    fn test_from_foreign_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let fault = RpcFault::from_error(io);
        assert_eq!(fault.kind(), FaultKind::Unknown);
        assert!(!fault.is_business());
        assert!(fault.message().contains("disk on fire"));
    }
}
