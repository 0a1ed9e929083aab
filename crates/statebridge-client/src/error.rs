//! Client-side errors.

use statebridge_host::HostError;
use statebridge_protocol::{Mid, ProtocolError};
use thiserror::Error;

/// Failures returned synchronously by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The local host rejected the request.
    #[error(transparent)]
    Host(#[from] HostError),
    /// The request could not be encoded for the transport.
    #[error("failed to encode request: {0}")]
    Serialize(#[from] ProtocolError),
    /// The operation needs direct access to a host.
    #[error("{operation} is only available on a client attached to a local host")]
    LocalOnly {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

/// A failure reported by the remote host or raised while applying its
/// replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct RemoteError {
    /// Human-readable reason.
    pub reason: String,
    /// Mid of the request that failed, when known.
    pub request_mid: Option<Mid>,
}

impl RemoteError {
    /// Creates a remote error.
    #[must_use]
    pub fn new(reason: impl Into<String>, request_mid: Option<Mid>) -> Self {
        Self {
            reason: reason.into(),
            request_mid,
        }
    }

    /// Wraps a failure of a local host.
    #[must_use]
    pub fn from_host(error: &HostError) -> Self {
        Self::new(error.to_string(), None)
    }
}
