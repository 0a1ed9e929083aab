//! Failure handling shared by both ends of a connection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How request failures crossing the transport are handled.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ErrorPolicy {
    /// Log the failure and drop the request.
    #[default]
    Silent,
    /// Log the failure and answer with an `error` message naming the request.
    Report,
}

impl ErrorPolicy {
    /// Returns `true` when failures are reported to the peer.
    #[must_use]
    pub const fn reports(self) -> bool {
        matches!(self, Self::Report)
    }
}

/// Errors encountered while parsing an [`ErrorPolicy`] from text.
pub type ErrorPolicyParseError = strum::ParseError;
