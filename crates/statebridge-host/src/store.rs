//! Store capability and a reference reducer store.
//!
//! The host consumes stores only through [`Store`]: read the current state,
//! dispatch an action, subscribe to transitions. Change detection relies on
//! identity, so a store must return a new composite for every container whose
//! contents changed and keep unchanged sub-trees shared. [`Value::set_in`] and
//! [`Value::remove_in`] update that way.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use statebridge_diff::Value;
use statebridge_protocol::Action;

use crate::error::HostError;
use crate::subscription::Subscription;

/// Callback run after every store transition.
pub type StoreListener = Rc<dyn Fn()>;

/// An observable key-value store.
pub trait Store {
    /// Current state.
    fn state(&self) -> Value;

    /// Applies an action and notifies subscribers.
    fn dispatch(&self, action: &Action);

    /// Registers a listener run after each dispatch.
    fn subscribe(&self, listener: StoreListener) -> Subscription;
}

/// Pure state transition used by [`ReducerStore`].
pub type Reducer = dyn Fn(&Value, &Action) -> Value;

type ListenerList = RefCell<Vec<(u64, StoreListener)>>;

/// Store driven by a reducer function.
///
/// Every dispatch replaces the state with the reducer's result and then runs
/// each subscriber, whether or not the state changed.
pub struct ReducerStore {
    state: RefCell<Value>,
    reducer: Box<Reducer>,
    listeners: Rc<ListenerList>,
    next_listener: Cell<u64>,
}

impl ReducerStore {
    /// Creates a store holding `initial`.
    #[must_use]
    pub fn new<R>(initial: Value, reducer: R) -> Self
    where
        R: Fn(&Value, &Action) -> Value + 'static,
    {
        Self {
            state: RefCell::new(initial),
            reducer: Box::new(reducer),
            listeners: Rc::default(),
            next_listener: Cell::new(0),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Store for ReducerStore {
    fn state(&self) -> Value {
        self.state.borrow().clone()
    }

    fn dispatch(&self, action: &Action) {
        let next = {
            let current = self.state.borrow();
            (self.reducer)(&current, action)
        };
        *self.state.borrow_mut() = next;

        let listeners: Vec<StoreListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    fn subscribe(&self, listener: StoreListener) -> Subscription {
        let id = self.next_listener.get();
        self.next_listener.set(id.wrapping_add(1));
        self.listeners.borrow_mut().push((id, listener));

        let registry: Weak<ListenerList> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(live) = registry.upgrade() {
                live.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }
}

impl fmt::Debug for ReducerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerStore")
            .field("state", &*self.state.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

type Handler = Box<dyn Fn(&Value, &Value) -> Value>;

/// Builds a reducer from per-action-type handlers.
///
/// Each handler receives the current state and the action payload. Actions
/// without a handler leave the state untouched, identity included.
///
/// ```rust
/// use statebridge_diff::Value;
/// use statebridge_host::{Handlers, Store};
/// use statebridge_protocol::Action;
///
/// let store = Handlers::new()
///     .on("SET_AGE", |state, payload| state.set_in(&["age"], payload.clone()))
///     .into_store(Value::object([("age", Value::from(20))]));
/// store.dispatch(&Action::new("SET_AGE", 21));
/// assert_eq!(store.state().get("age"), Some(&Value::from(21)));
/// ```
#[derive(Default)]
pub struct Handlers {
    handlers: HashMap<String, Handler>,
}

impl Handlers {
    /// Creates an empty handler table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for one action type, replacing any earlier one.
    #[must_use]
    pub fn on<F>(mut self, kind: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
        self
    }

    /// Runs the matching handler.
    #[must_use]
    pub fn reduce(&self, state: &Value, action: &Action) -> Value {
        self.handlers
            .get(&action.kind)
            .map_or_else(|| state.clone(), |handler| handler(state, &action.payload))
    }

    /// Wraps the table in a [`ReducerStore`].
    #[must_use]
    pub fn into_store(self, initial: Value) -> ReducerStore {
        ReducerStore::new(initial, move |state, action| self.reduce(state, action))
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("Handlers").field("kinds", &kinds).finish()
    }
}

/// The stores owned by one host, fixed at construction.
pub(crate) struct StoreSet {
    stores: BTreeMap<String, Rc<dyn Store>>,
    default_key: Option<String>,
}

impl StoreSet {
    pub(crate) const fn new(
        stores: BTreeMap<String, Rc<dyn Store>>,
        default_key: Option<String>,
    ) -> Self {
        Self {
            stores,
            default_key,
        }
    }

    pub(crate) fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    /// Resolves an optional key; `None` and `""` mean the default store.
    pub(crate) fn resolve(&self, key: Option<&str>) -> Result<(&str, &Rc<dyn Store>), HostError> {
        let name = match key.filter(|requested| !requested.is_empty()) {
            Some(requested) => requested,
            None => self.default_key().ok_or(HostError::NoDefaultStore)?,
        };
        self.stores
            .get_key_value(name)
            .map(|(owned, store)| (owned.as_str(), store))
            .ok_or_else(|| HostError::store_not_found(name))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Rc<dyn Store>)> {
        self.stores.iter().map(|(key, store)| (key.as_str(), store))
    }
}
