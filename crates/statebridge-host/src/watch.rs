//! Action watchers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use statebridge_diff::Value;
use tracing::debug;

use crate::WATCH_TARGET;
use crate::subscription::Subscription;

type Sink = Box<dyn FnOnce(Value)>;

/// Answers the dispatch that triggered a watcher.
///
/// Clones share one slot: the first [`Responder::respond`] for a dispatch is
/// delivered and every later one is ignored.
#[derive(Clone, Default)]
pub struct Responder {
    sink: Rc<RefCell<Option<Sink>>>,
}

impl Responder {
    /// A responder forwarding the first response to `sink`.
    #[must_use]
    pub fn new<F>(sink: F) -> Self
    where
        F: FnOnce(Value) + 'static,
    {
        Self {
            sink: Rc::new(RefCell::new(Some(Box::new(sink)))),
        }
    }

    /// A responder for a dispatch that expects no response.
    #[must_use]
    pub fn discard() -> Self {
        Self::default()
    }

    /// Returns `true` while a response would still be delivered.
    #[must_use]
    pub fn wants_response(&self) -> bool {
        self.sink.borrow().is_some()
    }

    /// Sends a response. Only the first call has an effect.
    pub fn respond(&self, value: impl Into<Value>) {
        let sink = self.sink.borrow_mut().take();
        if let Some(deliver) = sink {
            deliver(value.into());
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("wants_response", &self.wants_response())
            .finish()
    }
}

/// Receives the payload of a watched action.
pub type Watcher = Rc<dyn Fn(&Value, &Responder)>;

struct Entry {
    action_type: String,
    watcher: Watcher,
    active: Cell<bool>,
}

/// Synchronous fan-out of dispatched actions to watchers by action type.
#[derive(Default)]
pub(crate) struct ActionWatchBus {
    entries: Rc<RefCell<Vec<Rc<Entry>>>>,
}

impl ActionWatchBus {
    pub(crate) fn watch(&self, action_type: &str, watcher: Watcher) -> Subscription {
        let entry = Rc::new(Entry {
            action_type: action_type.to_owned(),
            watcher,
            active: Cell::new(true),
        });
        self.entries.borrow_mut().push(Rc::clone(&entry));
        debug!(target: WATCH_TARGET, action_type, "watching");

        let entries = Rc::downgrade(&self.entries);
        Subscription::new(move || {
            entry.active.set(false);
            if let Some(live) = entries.upgrade() {
                live.borrow_mut().retain(|other| !Rc::ptr_eq(other, &entry));
            }
        })
    }

    /// Runs every watcher of `action_type`, in registration order.
    pub(crate) fn emit(&self, action_type: &str, payload: &Value, responder: &Responder) {
        let matching: Vec<Rc<Entry>> = self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.action_type == action_type)
            .cloned()
            .collect();
        if matching.is_empty() {
            return;
        }
        debug!(target: WATCH_TARGET, action_type, watchers = matching.len(), "emitting");
        for entry in matching {
            if entry.active.get() {
                (entry.watcher)(payload, responder);
            }
        }
    }

    pub(crate) fn watcher_count(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn clear(&self) {
        let drained: Vec<Rc<Entry>> = self.entries.borrow_mut().drain(..).collect();
        for entry in drained {
            entry.active.set(false);
        }
    }
}
