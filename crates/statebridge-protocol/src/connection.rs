//! Transport abstraction and an in-memory channel.
//!
//! A [`Connection`] is an ordered, string-message, fire-and-forget sink.
//! Inbound delivery is the transport's business: the in-memory
//! [`ChannelEndpoint`] queues messages for its peer and hands them over only
//! when [`ChannelEndpoint::pump`] is called, which models the asynchronous
//! hop of a real transport inside a single thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::CHANNEL_TARGET;

/// Outbound half of a transport.
pub trait Connection {
    /// Sends one encoded message to the peer.
    fn post_message(&self, message: String);
}

impl<C: Connection + ?Sized> Connection for Rc<C> {
    fn post_message(&self, message: String) {
        (**self).post_message(message);
    }
}

type Queue = Rc<RefCell<VecDeque<String>>>;
type Inbound = Rc<dyn Fn(&str)>;

/// One end of an in-memory channel.
///
/// Clones share the same queues and handler.
#[derive(Clone)]
pub struct ChannelEndpoint {
    label: &'static str,
    inbox: Queue,
    peer_inbox: Queue,
    handler: Rc<RefCell<Option<Inbound>>>,
}

/// Creates a connected pair of endpoints.
#[must_use]
pub fn channel() -> (ChannelEndpoint, ChannelEndpoint) {
    let left: Queue = Rc::default();
    let right: Queue = Rc::default();
    (
        ChannelEndpoint {
            label: "left",
            inbox: Rc::clone(&left),
            peer_inbox: Rc::clone(&right),
            handler: Rc::default(),
        },
        ChannelEndpoint {
            label: "right",
            inbox: right,
            peer_inbox: left,
            handler: Rc::default(),
        },
    )
}

impl ChannelEndpoint {
    /// Installs the handler that receives pumped messages, replacing any
    /// previous one.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&str) + 'static,
    {
        *self.handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Number of messages waiting to be delivered to this endpoint.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// Copies of the messages waiting to be delivered to this endpoint.
    #[must_use]
    pub fn queued(&self) -> Vec<String> {
        self.inbox.borrow().iter().cloned().collect()
    }

    /// Delivers queued messages to the handler until the inbox is empty.
    ///
    /// Messages queued by the handler itself are delivered in the same call.
    /// Without a handler nothing is delivered. Returns the number of messages
    /// delivered.
    pub fn pump(&self) -> usize {
        let Some(handler) = self.handler.borrow().clone() else {
            return 0;
        };
        let mut delivered = 0;
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(message) = next else {
                break;
            };
            trace!(target: CHANNEL_TARGET, endpoint = self.label, %message, "delivering");
            handler(&message);
            delivered += 1;
        }
        if delivered > 0 {
            debug!(target: CHANNEL_TARGET, endpoint = self.label, delivered, "pumped");
        }
        delivered
    }
}

impl Connection for ChannelEndpoint {
    fn post_message(&self, message: String) {
        self.peer_inbox.borrow_mut().push_back(message);
    }
}

impl fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("label", &self.label)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Pumps every endpoint in turn until none has anything left to deliver.
///
/// Returns the total number of messages delivered.
pub fn pump_until_idle(endpoints: &[&ChannelEndpoint]) -> usize {
    let mut total = 0;
    loop {
        let round: usize = endpoints.iter().map(|endpoint| endpoint.pump()).sum();
        if round == 0 {
            return total;
        }
        total += round;
    }
}
