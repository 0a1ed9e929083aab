//! Wire messages exchanged between a client broker and a host adapter.
//!
//! Every message is a JSON object with a `type` tag and a correlation id
//! (`mid`). Field names are camelCase on the wire. Replies reuse the mid of
//! the request they answer (`change` reuses the observe mid, `action` the
//! watch mid); teardown requests carry a fresh mid and name the subscription
//! they end.

use serde::{Deserialize, Serialize};
use statebridge_diff::{Patch, Value};

use crate::action::{Action, PathSpec};
use crate::error::ProtocolError;

/// Correlation id; unique per sender until the sender is destroyed.
pub type Mid = u64;

#[derive(Deserialize)]
struct Envelope {
    mid: Mid,
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    /// Client asks to observe a path.
    Observe {
        /// Subscription id.
        mid: Mid,
        /// Observed path.
        path: PathSpec,
    },
    /// Client ends an observation.
    Unobserve {
        /// Fresh request id.
        mid: Mid,
        /// Mid of the `observe` being ended.
        observe_mid: Mid,
    },
    /// Host delivers a change for an observation.
    Change {
        /// Mid of the `observe`.
        mid: Mid,
        /// Patch against the previously delivered value.
        value: Patch,
    },
    /// Client asks for the current value of a path.
    Fetch {
        /// Request id.
        mid: Mid,
        /// Requested path.
        path: PathSpec,
    },
    /// Host answers a fetch.
    Feedback {
        /// Mid of the `fetch`.
        mid: Mid,
        /// Value at the path; `null` when absent.
        #[serde(default)]
        value: Value,
    },
    /// Client dispatches an action.
    Dispatch {
        /// Request id.
        mid: Mid,
        /// The action.
        action: Action,
        /// Whether the client waits for a watcher response.
        #[serde(default)]
        need_response: bool,
    },
    /// Host forwards a watcher response for a dispatch.
    DispatchRes {
        /// Mid of the `dispatch`.
        mid: Mid,
        /// Response value.
        #[serde(default)]
        value: Value,
    },
    /// Client watches an action type on the host.
    Watch {
        /// Watch id.
        mid: Mid,
        /// Watched action type.
        action_type: String,
    },
    /// Client ends a watch.
    Unwatch {
        /// Fresh request id.
        mid: Mid,
        /// Mid of the `watch` being ended.
        watch_mid: Mid,
    },
    /// Host forwards a watched action.
    Action {
        /// Mid of the `watch`.
        mid: Mid,
        /// Action payload.
        #[serde(default)]
        payload: Value,
        /// Present when the originating dispatch wants a response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        res_mid: Option<Mid>,
    },
    /// Client answers a forwarded action.
    WatchRes {
        /// The `resMid` of the forwarded action.
        mid: Mid,
        /// Response value.
        #[serde(default)]
        value: Value,
    },
    /// Either side reports a failed request.
    Error {
        /// Fresh id.
        mid: Mid,
        /// Human-readable reason.
        reason: String,
        /// Mid of the request that failed, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_mid: Option<Mid>,
    },
}

impl Message {
    /// Parses one message from text.
    ///
    /// Surrounding whitespace, including the line terminator, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the text is empty, is not
    /// JSON, or does not match any message type. When only the body is
    /// invalid, the error still carries the envelope's mid so the failure
    /// can be tied to its request.
    pub fn parse(text: &[u8]) -> Result<Self, ProtocolError> {
        let trimmed = text.trim_ascii();
        if trimmed.is_empty() {
            return Err(ProtocolError::malformed("empty message"));
        }
        serde_json::from_slice(trimmed).map_err(|source| ProtocolError::Malformed {
            message: source.to_string(),
            mid: serde_json::from_slice::<Envelope>(trimmed)
                .ok()
                .map(|envelope| envelope.mid),
            source: Some(source),
        })
    }

    /// Encodes the message as compact JSON text without a line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] when serialisation fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialize)
    }

    /// Returns the message's correlation id.
    #[must_use]
    pub const fn mid(&self) -> Mid {
        match self {
            Self::Observe { mid, .. }
            | Self::Unobserve { mid, .. }
            | Self::Change { mid, .. }
            | Self::Fetch { mid, .. }
            | Self::Feedback { mid, .. }
            | Self::Dispatch { mid, .. }
            | Self::DispatchRes { mid, .. }
            | Self::Watch { mid, .. }
            | Self::Unwatch { mid, .. }
            | Self::Action { mid, .. }
            | Self::WatchRes { mid, .. }
            | Self::Error { mid, .. } => *mid,
        }
    }

    /// Returns the wire name of the message type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Observe { .. } => "observe",
            Self::Unobserve { .. } => "unobserve",
            Self::Change { .. } => "change",
            Self::Fetch { .. } => "fetch",
            Self::Feedback { .. } => "feedback",
            Self::Dispatch { .. } => "dispatch",
            Self::DispatchRes { .. } => "dispatchRes",
            Self::Watch { .. } => "watch",
            Self::Unwatch { .. } => "unwatch",
            Self::Action { .. } => "action",
            Self::WatchRes { .. } => "watchRes",
            Self::Error { .. } => "error",
        }
    }
}
