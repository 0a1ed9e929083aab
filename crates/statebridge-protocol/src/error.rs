//! Errors raised while decoding or encoding wire messages.

use std::io;

use thiserror::Error;

use crate::message::Mid;

/// Errors surfaced by the message codec.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not a well-formed message.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
        /// Mid of the envelope, when the text still carries a readable one.
        mid: Option<Mid>,
        /// Underlying JSON error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A message could not be serialised.
    #[error("failed to serialise message: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing an encoded message failed.
    #[error("failed to write message: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Creates a malformed message error with a custom message.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            mid: None,
            source: None,
        }
    }

    /// Mid of the malformed message, when one could be read.
    #[must_use]
    pub const fn mid(&self) -> Option<Mid> {
        match self {
            Self::Malformed { mid, .. } => *mid,
            Self::Serialize(_) | Self::Io(_) => None,
        }
    }
}
