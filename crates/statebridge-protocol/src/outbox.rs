//! Outbound half of a protocol peer.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::OUTBOX_TARGET;
use crate::connection::Connection;
use crate::error::ProtocolError;
use crate::message::{Message, Mid};
use crate::policy::ErrorPolicy;

/// Encodes and posts messages for one peer, minting its correlation ids.
///
/// The mid counter starts at zero and only goes back to zero on
/// [`Outbox::reset`].
pub struct Outbox {
    connection: Rc<dyn Connection>,
    policy: ErrorPolicy,
    next_mid: Cell<Mid>,
}

impl Outbox {
    /// Creates an outbox posting to `connection`.
    #[must_use]
    pub fn new(connection: Rc<dyn Connection>, policy: ErrorPolicy) -> Self {
        Self {
            connection,
            policy,
            next_mid: Cell::new(0),
        }
    }

    /// The failure policy this peer applies.
    #[must_use]
    pub const fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Mints the next correlation id.
    pub fn next_mid(&self) -> Mid {
        let mid = self.next_mid.get();
        self.next_mid.set(mid.wrapping_add(1));
        mid
    }

    /// Restarts the counter.
    pub fn reset(&self) {
        self.next_mid.set(0);
    }

    /// Encodes and posts one message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] when the message cannot be
    /// encoded; nothing is posted in that case.
    pub fn send(&self, message: &Message) -> Result<(), ProtocolError> {
        let encoded = message.encode()?;
        debug!(
            target: OUTBOX_TARGET,
            kind = message.kind(),
            mid = message.mid(),
            "posting message"
        );
        self.connection.post_message(encoded);
        Ok(())
    }

    /// Posts a message, logging instead of returning encoding failures.
    pub fn post(&self, message: &Message) {
        if let Err(error) = self.send(message) {
            warn!(target: OUTBOX_TARGET, %error, kind = message.kind(), "dropping message");
        }
    }

    /// Records a failed request according to the policy.
    ///
    /// The failure is always logged. Under [`ErrorPolicy::Report`] an `error`
    /// message naming `request_mid` is also posted to the peer.
    pub fn fail(&self, request_mid: Option<Mid>, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(target: OUTBOX_TARGET, ?request_mid, %reason, "request failed");
        if self.policy.reports() {
            let mid = self.next_mid();
            self.post(&Message::Error {
                mid,
                reason,
                request_mid,
            });
        }
    }
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbox")
            .field("policy", &self.policy)
            .field("next_mid", &self.next_mid.get())
            .finish_non_exhaustive()
    }
}
