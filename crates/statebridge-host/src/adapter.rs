//! Serves a host container to one remote client over a [`Connection`].
//!
//! Observations are diffed against a per-subscription shadow of what the
//! client last received, so `change` messages carry patches rather than
//! whole values. Subscriptions are tracked by the client's mid; a request
//! reusing a live mid replaces the earlier subscription.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use statebridge_diff::{Value, diff};
use statebridge_protocol::{Action, Connection, ErrorPolicy, Message, Mid, Outbox, PathSpec};
use tracing::{debug, warn};

use crate::ADAPTER_TARGET;
use crate::container::{Container, HostContainer};
use crate::subscription::Subscription;
use crate::watch::Responder;

struct AdapterInner {
    host: HostContainer,
    outbox: Rc<Outbox>,
    observations: RefCell<HashMap<Mid, Subscription>>,
    watches: RefCell<HashMap<Mid, Subscription>>,
    responders: RefCell<HashMap<Mid, Responder>>,
}

/// Host end of the protocol.
#[derive(Clone)]
pub struct HostAdapter {
    inner: Rc<AdapterInner>,
}

impl HostAdapter {
    /// Serves `host` to the client behind `connection`.
    #[must_use]
    pub fn new(host: HostContainer, connection: Rc<dyn Connection>, policy: ErrorPolicy) -> Self {
        Self {
            inner: Rc::new(AdapterInner {
                host,
                outbox: Rc::new(Outbox::new(connection, policy)),
                observations: RefCell::default(),
                watches: RefCell::default(),
                responders: RefCell::default(),
            }),
        }
    }

    /// Routes one inbound message. Malformed text is logged and, under
    /// [`ErrorPolicy::Report`], answered with an `error` message naming the
    /// envelope's mid when one is readable.
    pub fn handle_message(&self, text: &str) {
        self.inner.handle(text);
    }

    /// A message handler for a transport that does not keep the adapter
    /// alive.
    #[must_use]
    pub fn handler(&self) -> impl Fn(&str) + 'static {
        let adapter = Rc::downgrade(&self.inner);
        move |text| {
            if let Some(live) = adapter.upgrade() {
                live.handle(text);
            }
        }
    }

    /// Number of live observations held for the client.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.inner.observations.borrow().len()
    }

    /// Number of live watches held for the client.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.inner.watches.borrow().len()
    }

    /// Ends every subscription held for the client. The host itself is left
    /// running.
    pub fn destroy(&self) {
        let observations: Vec<Subscription> = self
            .inner
            .observations
            .borrow_mut()
            .drain()
            .map(|(_, subscription)| subscription)
            .collect();
        let watches: Vec<Subscription> = self
            .inner
            .watches
            .borrow_mut()
            .drain()
            .map(|(_, subscription)| subscription)
            .collect();
        for subscription in observations.into_iter().chain(watches) {
            subscription.unsubscribe();
        }
        self.inner.responders.borrow_mut().clear();
        debug!(target: ADAPTER_TARGET, "adapter destroyed");
    }
}

impl fmt::Debug for HostAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostAdapter")
            .field("outbox", &self.inner.outbox)
            .field("observations", &self.observation_count())
            .field("watches", &self.watch_count())
            .finish_non_exhaustive()
    }
}

impl AdapterInner {
    fn handle(self: &Rc<Self>, text: &str) {
        let message = match Message::parse(text.as_bytes()) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.outbox.fail(error.mid(), format!("unparseable message: {error}"));
                return;
            }
        };
        debug!(
            target: ADAPTER_TARGET,
            kind = message.kind(),
            mid = message.mid(),
            "routing message"
        );
        match message {
            Message::Observe { mid, path } => self.observe(mid, path),
            Message::Unobserve { observe_mid, .. } => {
                end(&self.observations, observe_mid);
            }
            Message::Fetch { mid, path } => self.fetch(mid, path),
            Message::Dispatch {
                mid,
                action,
                need_response,
            } => self.dispatch(mid, &action, need_response),
            Message::Watch { mid, action_type } => self.watch(mid, &action_type),
            Message::Unwatch { watch_mid, .. } => {
                end(&self.watches, watch_mid);
            }
            Message::WatchRes { mid, value } => self.respond(mid, value),
            Message::Error {
                reason,
                request_mid,
                ..
            } => {
                warn!(target: ADAPTER_TARGET, ?request_mid, %reason, "client reported an error");
            }
            Message::Change { .. }
            | Message::Feedback { .. }
            | Message::DispatchRes { .. }
            | Message::Action { .. } => {
                debug!(target: ADAPTER_TARGET, "ignoring client-bound message");
            }
        }
    }

    fn observe(&self, mid: Mid, path: PathSpec) {
        end(&self.observations, mid);
        let outbox = Rc::clone(&self.outbox);
        let shadow: RefCell<Option<Value>> = RefCell::new(None);
        let observed = self.host.observe(path, move |value: Option<&Value>| {
            let result = diff(shadow.borrow().as_ref(), value);
            match result {
                Ok(patch) => {
                    *shadow.borrow_mut() = value.cloned();
                    outbox.post(&Message::Change { mid, value: patch });
                }
                Err(error) => outbox.fail(Some(mid), format!("cannot diff observed value: {error}")),
            }
        });
        match observed {
            Ok(subscription) => {
                self.observations.borrow_mut().insert(mid, subscription);
            }
            Err(error) => self.outbox.fail(Some(mid), error.to_string()),
        }
    }

    fn fetch(&self, mid: Mid, path: PathSpec) {
        match self.host.get_state(path) {
            Ok(value) => self.outbox.post(&Message::Feedback {
                mid,
                value: value.unwrap_or_default(),
            }),
            Err(error) => self.outbox.fail(Some(mid), error.to_string()),
        }
    }

    fn dispatch(&self, mid: Mid, action: &Action, need_response: bool) {
        let result = if need_response {
            let outbox = Rc::clone(&self.outbox);
            self.host.dispatch_with_response(action, move |value| {
                outbox.post(&Message::DispatchRes { mid, value });
            })
        } else {
            self.host.dispatch(action)
        };
        if let Err(error) = result {
            self.outbox.fail(Some(mid), error.to_string());
        }
    }

    fn watch(self: &Rc<Self>, mid: Mid, action_type: &str) {
        end(&self.watches, mid);
        let adapter = Rc::downgrade(self);
        let watched = self.host.watch(action_type, move |payload, responder| {
            if let Some(live) = adapter.upgrade() {
                live.forward(mid, payload, responder);
            }
        });
        match watched {
            Ok(subscription) => {
                self.watches.borrow_mut().insert(mid, subscription);
            }
            Err(error) => self.outbox.fail(Some(mid), error.to_string()),
        }
    }

    /// Sends a watched action to the client, registering a `resMid` when the
    /// dispatch still waits for a response.
    fn forward(&self, watch_mid: Mid, payload: &Value, responder: &Responder) {
        let res_mid = responder.wants_response().then(|| {
            let minted = self.outbox.next_mid();
            let mut responders = self.responders.borrow_mut();
            responders.retain(|_, pending| pending.wants_response());
            responders.insert(minted, responder.clone());
            minted
        });
        self.outbox.post(&Message::Action {
            mid: watch_mid,
            payload: payload.clone(),
            res_mid,
        });
    }

    fn respond(&self, res_mid: Mid, value: Value) {
        let responder = self.responders.borrow_mut().remove(&res_mid);
        match responder {
            Some(pending) => pending.respond(value),
            None => debug!(target: ADAPTER_TARGET, res_mid, "dropping response for unknown resMid"),
        }
    }
}

/// Ends the subscription registered under `mid`, if any.
fn end(subscriptions: &RefCell<HashMap<Mid, Subscription>>, mid: Mid) {
    let removed = subscriptions.borrow_mut().remove(&mid);
    if let Some(subscription) = removed {
        subscription.unsubscribe();
    }
}
