//! The client container.
//!
//! In remote mode every request is a message with a fresh mid. Requests
//! that expect replies leave a pending entry under that mid: `fetch` and
//! `dispatch` with a response are removed by their single reply, `observe`
//! and `watch` stay until their subscription ends. Observed values are kept
//! as a shadow per observation and updated by applying each `change` patch.
//! A `null` result is delivered as absent, matching a local observer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use statebridge_diff::{Patch, Value, apply_patch};
use statebridge_host::{
    Container, HostContainer, Listener, Responder, Selector, Subscription, Watcher,
};
use statebridge_protocol::{
    Action, Connection, ErrorPolicy, Message, Mid, Outbox, PathSpec, ProtocolError,
};
use tracing::{debug, warn};

use crate::BROKER_TARGET;
use crate::deferred::{Deferred, Resolver};
use crate::error::{ClientError, RemoteError};

/// Outcome of a fetch: the value at the path, or why the host refused.
pub type FetchResult = Result<Option<Value>, RemoteError>;

type ErrorHandler = Rc<dyn Fn(&RemoteError)>;

struct Observation {
    shadow: RefCell<Option<Value>>,
    listener: Listener,
}

enum Pending {
    Observe(Rc<Observation>),
    Fetch(Resolver<FetchResult>),
    Dispatch(Box<dyn FnOnce(Value)>),
    Watch(Watcher),
}

impl Pending {
    const fn is_one_shot(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Dispatch(_))
    }
}

struct Remote {
    outbox: Rc<Outbox>,
    pending: RefCell<HashMap<Mid, Pending>>,
}

impl Remote {
    /// Registers `entry` under a fresh mid and sends the request built for it.
    fn request<F>(&self, entry: Option<Pending>, build: F) -> Result<Mid, ProtocolError>
    where
        F: FnOnce(Mid) -> Message,
    {
        let mid = self.outbox.next_mid();
        if let Some(registered) = entry {
            self.pending.borrow_mut().insert(mid, registered);
        }
        if let Err(error) = self.outbox.send(&build(mid)) {
            let dropped = self.pending.borrow_mut().remove(&mid);
            drop(dropped);
            return Err(error);
        }
        Ok(mid)
    }

    fn take_if(&self, mid: Mid, wanted: fn(&Pending) -> bool) -> Option<Pending> {
        let mut pending = self.pending.borrow_mut();
        if pending.get(&mid).is_some_and(wanted) {
            pending.remove(&mid)
        } else {
            None
        }
    }

    fn observation(&self, mid: Mid) -> Option<Rc<Observation>> {
        match self.pending.borrow().get(&mid) {
            Some(Pending::Observe(observation)) => Some(Rc::clone(observation)),
            _ => None,
        }
    }

    fn watcher(&self, mid: Mid) -> Option<Watcher> {
        match self.pending.borrow().get(&mid) {
            Some(Pending::Watch(watcher)) => Some(Rc::clone(watcher)),
            _ => None,
        }
    }
}

enum Mode {
    Local(HostContainer),
    Remote(Remote),
}

struct ClientInner {
    mode: Mode,
    live: RefCell<Vec<Subscription>>,
    on_error: RefCell<Option<ErrorHandler>>,
}

/// Client view of a host: attached directly or through a transport.
///
/// Clones are handles to the same client.
#[derive(Clone)]
pub struct ClientContainer {
    inner: Rc<ClientInner>,
}

impl ClientContainer {
    /// A client calling `host` directly, without serialisation.
    #[must_use]
    pub fn local(host: HostContainer) -> Self {
        Self::with_mode(Mode::Local(host))
    }

    /// A client talking to a host adapter behind `connection`.
    ///
    /// Inbound messages must be routed to [`ClientContainer::handle_message`],
    /// typically through [`ClientContainer::handler`].
    #[must_use]
    pub fn remote(connection: Rc<dyn Connection>, policy: ErrorPolicy) -> Self {
        Self::with_mode(Mode::Remote(Remote {
            outbox: Rc::new(Outbox::new(connection, policy)),
            pending: RefCell::default(),
        }))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                mode,
                live: RefCell::default(),
                on_error: RefCell::default(),
            }),
        }
    }

    /// Returns `true` when requests travel over a transport.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.inner.mode, Mode::Remote(_))
    }

    /// Number of requests waiting for replies, durable ones included.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        match &self.inner.mode {
            Mode::Local(_) => 0,
            Mode::Remote(remote) => remote.pending.borrow().len(),
        }
    }

    /// Installs the handler told about remote failures, replacing any
    /// earlier one.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&RemoteError) + 'static,
    {
        *self.inner.on_error.borrow_mut() = Some(Rc::new(handler));
    }

    /// A message handler for a transport that does not keep the client
    /// alive.
    #[must_use]
    pub fn handler(&self) -> impl Fn(&str) + 'static {
        let client: Weak<ClientInner> = Rc::downgrade(&self.inner);
        move |text| {
            if let Some(live) = client.upgrade() {
                live.handle(text);
            }
        }
    }

    /// Routes one inbound message.
    pub fn handle_message(&self, text: &str) {
        self.inner.handle(text);
    }

    /// Reads the value at a path.
    ///
    /// Resolves immediately on a local client. A remote client resolves when
    /// the host's `feedback` arrives, or with an error when the host reports
    /// one; a remote `null` reads as absent.
    #[must_use]
    pub fn fetch_state(&self, path: impl Into<PathSpec>) -> Deferred<FetchResult> {
        match &self.inner.mode {
            Mode::Local(host) => {
                Deferred::resolved(host.get_state(path).map_err(|error| RemoteError::from_host(&error)))
            }
            Mode::Remote(remote) => {
                let spec = path.into();
                let (deferred, resolver) = Deferred::pending();
                match remote.request(Some(Pending::Fetch(resolver)), |mid| Message::Fetch {
                    mid,
                    path: spec,
                }) {
                    Ok(_) => deferred,
                    Err(error) => Deferred::resolved(Err(RemoteError::new(error.to_string(), None))),
                }
            }
        }
    }

    fn track(&self, subscription: &Subscription) {
        let mut live = self.inner.live.borrow_mut();
        live.retain(Subscription::is_active);
        live.push(subscription.clone());
    }

    /// A subscription that tears down the remote entry `mid` with one
    /// message built by `teardown`.
    fn remote_subscription(&self, mid: Mid, teardown: fn(Mid, Mid) -> Message) -> Subscription {
        let client = Rc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            if let Some(live) = client.upgrade() {
                live.end_remote(mid, teardown);
            }
        });
        self.track(&subscription);
        subscription
    }
}

impl ClientInner {
    const fn remote(&self) -> Option<&Remote> {
        match &self.mode {
            Mode::Remote(remote) => Some(remote),
            Mode::Local(_) => None,
        }
    }

    fn end_remote(&self, mid: Mid, teardown: fn(Mid, Mid) -> Message) {
        let Some(remote) = self.remote() else {
            return;
        };
        let ended = remote.pending.borrow_mut().remove(&mid);
        drop(ended);
        let fresh = remote.outbox.next_mid();
        remote.outbox.post(&teardown(fresh, mid));
    }

    fn report(&self, failure: &RemoteError) {
        let handler = self.on_error.borrow().clone();
        if let Some(notify) = handler {
            notify(failure);
        }
    }

    fn handle(&self, text: &str) {
        let Some(remote) = self.remote() else {
            debug!(target: BROKER_TARGET, "local client ignores inbound messages");
            return;
        };
        let message = match Message::parse(text.as_bytes()) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.reject(remote, &error);
                return;
            }
        };
        debug!(
            target: BROKER_TARGET,
            kind = message.kind(),
            mid = message.mid(),
            "routing message"
        );
        match message {
            Message::Change { mid, value } => self.apply_change(remote, mid, &value),
            Message::Feedback { mid, value } => {
                match remote.take_if(mid, |entry| matches!(entry, Pending::Fetch(_))) {
                    Some(Pending::Fetch(resolver)) => {
                        resolver.resolve(Ok((!value.is_null()).then_some(value)));
                    }
                    _ => debug!(target: BROKER_TARGET, mid, "dropping unmatched feedback"),
                }
            }
            Message::DispatchRes { mid, value } => {
                match remote.take_if(mid, |entry| matches!(entry, Pending::Dispatch(_))) {
                    Some(Pending::Dispatch(on_response)) => on_response(value),
                    _ => debug!(target: BROKER_TARGET, mid, "dropping unmatched dispatch response"),
                }
            }
            Message::Action {
                mid,
                payload,
                res_mid,
            } => Self::run_watcher(remote, mid, &payload, res_mid),
            Message::Error {
                reason,
                request_mid,
                ..
            } => self.fail_request(remote, RemoteError::new(reason, request_mid)),
            Message::Observe { .. }
            | Message::Unobserve { .. }
            | Message::Fetch { .. }
            | Message::Dispatch { .. }
            | Message::Watch { .. }
            | Message::Unwatch { .. }
            | Message::WatchRes { .. } => {
                debug!(target: BROKER_TARGET, "ignoring host-bound message");
            }
        }
    }

    /// A malformed reply to an observation fails that observation's update.
    fn reject(&self, remote: &Remote, error: &ProtocolError) {
        match error.mid().filter(|mid| remote.observation(*mid).is_some()) {
            Some(mid) => {
                let failure = RemoteError::new(format!("cannot apply change: {error}"), Some(mid));
                remote.outbox.fail(Some(mid), failure.reason.clone());
                self.report(&failure);
            }
            None => remote.outbox.fail(error.mid(), format!("unparseable message: {error}")),
        }
    }

    fn apply_change(&self, remote: &Remote, mid: Mid, patch: &Patch) {
        let Some(observation) = remote.observation(mid) else {
            debug!(target: BROKER_TARGET, mid, "dropping change for an ended observation");
            return;
        };
        let applied = apply_patch(observation.shadow.borrow().as_ref(), patch);
        match applied {
            Ok(next) => {
                let present = next.filter(|value| !value.is_null());
                *observation.shadow.borrow_mut() = present.clone();
                (observation.listener)(present.as_ref());
            }
            Err(error) => {
                let failure = RemoteError::new(format!("cannot apply change: {error}"), Some(mid));
                remote.outbox.fail(Some(mid), failure.reason.clone());
                self.report(&failure);
            }
        }
    }

    fn run_watcher(remote: &Remote, mid: Mid, payload: &Value, res_mid: Option<Mid>) {
        let Some(watcher) = remote.watcher(mid) else {
            debug!(target: BROKER_TARGET, mid, "dropping action for an ended watch");
            return;
        };
        let responder = match res_mid {
            Some(reply_mid) => {
                let outbox = Rc::clone(&remote.outbox);
                Responder::new(move |value| {
                    outbox.post(&Message::WatchRes {
                        mid: reply_mid,
                        value,
                    });
                })
            }
            None => Responder::discard(),
        };
        watcher(payload, &responder);
    }

    /// One-shot requests named by the error are settled; durable ones stay.
    fn fail_request(&self, remote: &Remote, failure: RemoteError) {
        warn!(
            target: BROKER_TARGET,
            request_mid = ?failure.request_mid,
            reason = %failure.reason,
            "host reported an error"
        );
        let settled = failure
            .request_mid
            .and_then(|request| remote.take_if(request, Pending::is_one_shot));
        if let Some(Pending::Fetch(resolver)) = settled {
            resolver.resolve(Err(failure.clone()));
        }
        self.report(&failure);
    }
}

impl Container for ClientContainer {
    type Error = ClientError;

    fn observe<P, F>(&self, path: P, listener: F) -> Result<Subscription, ClientError>
    where
        P: Into<PathSpec>,
        F: Fn(Option<&Value>) + 'static,
    {
        match &self.inner.mode {
            Mode::Local(host) => {
                let subscription = host.observe(path, listener)?;
                self.track(&subscription);
                Ok(subscription)
            }
            Mode::Remote(remote) => {
                let spec = path.into();
                let observation = Rc::new(Observation {
                    shadow: RefCell::new(None),
                    listener: Rc::new(listener),
                });
                let mid = remote.request(Some(Pending::Observe(observation)), |mid| {
                    Message::Observe { mid, path: spec }
                })?;
                Ok(self.remote_subscription(mid, |fresh, observe_mid| Message::Unobserve {
                    mid: fresh,
                    observe_mid,
                }))
            }
        }
    }

    fn dispatch(&self, action: &Action) -> Result<(), ClientError> {
        match &self.inner.mode {
            Mode::Local(host) => Ok(host.dispatch(action)?),
            Mode::Remote(remote) => {
                remote.request(None, |mid| Message::Dispatch {
                    mid,
                    action: action.clone(),
                    need_response: false,
                })?;
                Ok(())
            }
        }
    }

    fn dispatch_with_response<F>(&self, action: &Action, on_response: F) -> Result<(), ClientError>
    where
        F: FnOnce(Value) + 'static,
    {
        match &self.inner.mode {
            Mode::Local(host) => Ok(host.dispatch_with_response(action, on_response)?),
            Mode::Remote(remote) => {
                remote.request(Some(Pending::Dispatch(Box::new(on_response))), |mid| {
                    Message::Dispatch {
                        mid,
                        action: action.clone(),
                        need_response: true,
                    }
                })?;
                Ok(())
            }
        }
    }

    fn watch<F>(&self, action_type: &str, watcher: F) -> Result<Subscription, ClientError>
    where
        F: Fn(&Value, &Responder) + 'static,
    {
        match &self.inner.mode {
            Mode::Local(host) => {
                let subscription = host.watch(action_type, watcher)?;
                self.track(&subscription);
                Ok(subscription)
            }
            Mode::Remote(remote) => {
                let mid = remote.request(Some(Pending::Watch(Rc::new(watcher))), |mid| {
                    Message::Watch {
                        mid,
                        action_type: action_type.to_owned(),
                    }
                })?;
                Ok(self.remote_subscription(mid, |fresh, watch_mid| Message::Unwatch {
                    mid: fresh,
                    watch_mid,
                }))
            }
        }
    }

    fn define_selectors<I, K>(&self, selectors: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: Into<String>,
    {
        match &self.inner.mode {
            Mode::Local(host) => Ok(host.define_selectors(selectors)?),
            Mode::Remote(_) => Err(ClientError::LocalOnly {
                operation: "define_selectors",
            }),
        }
    }

    /// Ends every subscription made through this client, forgets pending
    /// requests and restarts the mid counter. A local host keeps running.
    fn destroy(&self) {
        let live: Vec<Subscription> = self.inner.live.borrow_mut().drain(..).collect();
        for subscription in live {
            subscription.unsubscribe();
        }
        if let Some(remote) = self.inner.remote() {
            let forgotten = std::mem::take(&mut *remote.pending.borrow_mut());
            drop(forgotten);
            remote.outbox.reset();
        }
        debug!(target: BROKER_TARGET, "client destroyed");
    }
}

impl fmt::Debug for ClientContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContainer")
            .field("remote", &self.is_remote())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
