//! Host containers: stores, observation, watchers and selectors behind one
//! handle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use statebridge_diff::{Map, Value};
use statebridge_protocol::{Action, PathSpec};
use tracing::debug;

use crate::CONTAINER_TARGET;
use crate::engine::{Engine, Listener};
use crate::error::HostError;
use crate::interceptor::{Filter, Interceptor};
use crate::path::{self, ParsedPath, SelectorCall, StorePath};
use crate::selector::{Selector, SelectorRegistry, StateReader};
use crate::store::{Store, StoreSet};
use crate::subscription::Subscription;
use crate::watch::{ActionWatchBus, Responder};

/// Operations shared by host containers and client brokers.
pub trait Container: Clone + 'static {
    /// Failure type of the container's operations.
    type Error: Error + 'static;

    /// Observes a path. The listener receives the current value immediately
    /// and every later change.
    ///
    /// # Errors
    ///
    /// Fails when the path cannot be parsed or names an unknown store or
    /// selector.
    fn observe<P, F>(&self, path: P, listener: F) -> Result<Subscription, Self::Error>
    where
        P: Into<PathSpec>,
        F: Fn(Option<&Value>) + 'static;

    /// Dispatches an action without waiting for a response.
    ///
    /// # Errors
    ///
    /// Fails when the target store does not exist.
    fn dispatch(&self, action: &Action) -> Result<(), Self::Error>;

    /// Dispatches an action and delivers the first watcher response to
    /// `on_response`.
    ///
    /// # Errors
    ///
    /// Fails when the target store does not exist.
    fn dispatch_with_response<F>(&self, action: &Action, on_response: F) -> Result<(), Self::Error>
    where
        F: FnOnce(Value) + 'static;

    /// Runs `thunk` synchronously with this container.
    fn dispatch_thunk<R, F>(&self, thunk: F) -> R
    where
        F: FnOnce(&Self) -> R,
    {
        thunk(self)
    }

    /// Watches actions of one type dispatched to the default store.
    ///
    /// # Errors
    ///
    /// Fails when no default store is configured.
    fn watch<F>(&self, action_type: &str, watcher: F) -> Result<Subscription, Self::Error>
    where
        F: Fn(&Value, &Responder) + 'static;

    /// Registers selectors, replacing same-named ones.
    ///
    /// # Errors
    ///
    /// Fails when the container cannot host selectors.
    fn define_selectors<I, K>(&self, selectors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: Into<String>;

    /// Creates an interceptor whose watches only pass payloads accepted by
    /// `filter`.
    fn create_interceptor(&self, filter: Option<Filter>) -> Interceptor<Self> {
        Interceptor::new(self.clone(), filter)
    }

    /// Ends every subscription held by the container.
    fn destroy(&self);
}

struct HostInner {
    stores: Rc<StoreSet>,
    engine: Rc<Engine>,
    selectors: SelectorRegistry,
    watchers: ActionWatchBus,
    attachments: RefCell<Vec<Subscription>>,
}

/// Owns the stores of one host process.
///
/// Clones are handles to the same container.
#[derive(Clone)]
pub struct HostContainer {
    inner: Rc<HostInner>,
}

/// Collects stores for a [`HostContainer`].
#[derive(Default)]
pub struct HostBuilder {
    stores: BTreeMap<String, Rc<dyn Store>>,
    default_key: Option<String>,
}

impl HostBuilder {
    /// Adds a store under `key`.
    #[must_use]
    pub fn store<S>(self, key: impl Into<String>, store: S) -> Self
    where
        S: Store + 'static,
    {
        self.shared_store(key, Rc::new(store))
    }

    /// Adds a store the caller keeps a handle to.
    #[must_use]
    pub fn shared_store(mut self, key: impl Into<String>, store: Rc<dyn Store>) -> Self {
        self.stores.insert(key.into(), store);
        self
    }

    /// Designates the store targeted by paths and actions without a key.
    #[must_use]
    pub fn default_store(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Builds the container.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::StoreNotFound`] when the default key names no
    /// added store.
    pub fn build(self) -> Result<HostContainer, HostError> {
        if let Some(key) = self.default_key.as_deref()
            && !self.stores.contains_key(key)
        {
            return Err(HostError::store_not_found(key));
        }
        Ok(HostContainer::assemble(StoreSet::new(
            self.stores,
            self.default_key,
        )))
    }
}

impl fmt::Debug for HostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuilder")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .field("default_key", &self.default_key)
            .finish()
    }
}

impl HostContainer {
    /// Starts collecting stores.
    #[must_use]
    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }

    /// A container owning one store, which is also the default store.
    #[must_use]
    pub fn single<S>(key: impl Into<String>, store: S) -> Self
    where
        S: Store + 'static,
    {
        let store_key: String = key.into();
        let mut stores: BTreeMap<String, Rc<dyn Store>> = BTreeMap::new();
        stores.insert(store_key.clone(), Rc::new(store));
        Self::assemble(StoreSet::new(stores, Some(store_key)))
    }

    fn assemble(set: StoreSet) -> Self {
        let stores = Rc::new(set);
        let engine = Rc::new(Engine::new(Rc::clone(&stores)));
        let attachments = engine.attach();
        Self {
            inner: Rc::new(HostInner {
                stores,
                engine,
                selectors: SelectorRegistry::default(),
                watchers: ActionWatchBus::default(),
                attachments: RefCell::new(attachments),
            }),
        }
    }

    /// Key of the default store, if one is configured.
    #[must_use]
    pub fn default_store_key(&self) -> Option<&str> {
        self.inner.stores.default_key()
    }

    /// Handle to the store registered under `key`.
    #[must_use]
    pub fn store(&self, key: &str) -> Option<Rc<dyn Store>> {
        self.inner
            .stores
            .resolve(Some(key))
            .ok()
            .map(|(_, store)| Rc::clone(store))
    }

    /// Read access to every store, as handed to selectors.
    #[must_use]
    pub fn reader(&self) -> StateReader {
        StateReader::new(Rc::clone(&self.inner.stores))
    }

    /// Whole state of the default store.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NoDefaultStore`] when none is configured.
    pub fn state(&self) -> Result<Value, HostError> {
        let (_, store) = self.inner.stores.resolve(None)?;
        Ok(store.state())
    }

    /// Reads the value at a path.
    ///
    /// Missing segments resolve to `None`. A combined path yields an object
    /// keyed by label with absent members as `null`.
    ///
    /// # Errors
    ///
    /// Fails when a path cannot be parsed or names an unknown store or
    /// selector.
    pub fn get_state(&self, path: impl Into<PathSpec>) -> Result<Option<Value>, HostError> {
        match path.into() {
            PathSpec::Single(text) => self.read_path(&text),
            PathSpec::Combined(paths) => {
                let mut entries = Map::new();
                for (label, text) in paths {
                    entries.insert(label, self.read_path(&text)?.unwrap_or_default());
                }
                Ok(Some(Value::from(entries)))
            }
        }
    }

    /// Number of live path observables, counting each combined member.
    #[must_use]
    pub fn observable_count(&self) -> usize {
        self.inner.engine.observable_count()
    }

    /// Number of live action watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.watcher_count()
    }

    fn read_path(&self, text: &str) -> Result<Option<Value>, HostError> {
        match path::parse(text)? {
            ParsedPath::Store(store_path) => {
                let (_, store) = self.inner.stores.resolve(store_path.store.as_deref())?;
                Ok(store.state().get_in(&store_path.segments).cloned())
            }
            ParsedPath::Selector(call) => {
                let selector = self.selector(&call.name)?;
                Ok(evaluate(&selector, &self.reader(), &call))
            }
        }
    }

    fn selector(&self, name: &str) -> Result<Selector, HostError> {
        self.inner
            .selectors
            .get(name)
            .ok_or_else(|| HostError::selector_not_registered(name))
    }

    fn observe_path(&self, text: &str, listener: &Listener) -> Result<Subscription, HostError> {
        match path::parse(text)? {
            ParsedPath::Store(store_path) => self.inner.engine.observe(&store_path, listener),
            ParsedPath::Selector(call) => self.observe_selector(call, listener),
        }
    }

    /// Observes the selector's affected paths together and forwards the
    /// projected result whenever it differs from the last one delivered.
    fn observe_selector(
        &self,
        call: SelectorCall,
        listener: &Listener,
    ) -> Result<Subscription, HostError> {
        let selector = self.selector(&call.name)?;
        let affected: Vec<(String, StorePath)> = match selector.affected() {
            Some(paths) => paths
                .iter()
                .enumerate()
                .map(|(index, text)| path::parse_store(text).map(|parsed| (index.to_string(), parsed)))
                .collect::<Result<_, _>>()?,
            None => self
                .inner
                .stores
                .keys()
                .map(|key| {
                    let whole = StorePath {
                        store: Some(key.to_owned()),
                        segments: Vec::new(),
                    };
                    (key.to_owned(), whole)
                })
                .collect(),
        };
        debug!(
            target: CONTAINER_TARGET,
            selector = %call.name,
            affected = affected.len(),
            "observing selector"
        );

        let reader = self.reader();
        let target = Rc::clone(listener);
        let last: RefCell<Option<Option<Value>>> = RefCell::new(None);
        let recompute: Listener = Rc::new(move |_| {
            let next = evaluate(&selector, &reader, &call);
            let unchanged = last
                .borrow()
                .as_ref()
                .is_some_and(|previous| *previous == next);
            if unchanged {
                return;
            }
            *last.borrow_mut() = Some(next.clone());
            target(next.as_ref());
        });
        self.inner.engine.observe_group(affected, &recompute)
    }

    fn dispatch_to(&self, action: &Action, responder: &Responder) -> Result<(), HostError> {
        let (key, store) = self.inner.stores.resolve(action.store.as_deref())?;
        debug!(target: CONTAINER_TARGET, store = key, action = %action.kind, "dispatching");
        if self.inner.stores.default_key() == Some(key) {
            self.inner
                .watchers
                .emit(&action.kind, &action.payload, responder);
        }
        store.dispatch(action);
        Ok(())
    }
}

fn evaluate(selector: &Selector, reader: &StateReader, call: &SelectorCall) -> Option<Value> {
    selector
        .select(reader, &call.args)
        .and_then(|value| value.get_in(&call.segments).cloned())
}

impl Container for HostContainer {
    type Error = HostError;

    fn observe<P, F>(&self, path: P, listener: F) -> Result<Subscription, HostError>
    where
        P: Into<PathSpec>,
        F: Fn(Option<&Value>) + 'static,
    {
        let listener: Listener = Rc::new(listener);
        match path.into() {
            PathSpec::Single(text) => self.observe_path(&text, &listener),
            PathSpec::Combined(paths) => {
                let parsed = paths
                    .into_iter()
                    .map(|(label, text)| path::parse_store(&text).map(|store_path| (label, store_path)))
                    .collect::<Result<Vec<_>, _>>()?;
                self.inner.engine.observe_group(parsed, &listener)
            }
        }
    }

    fn dispatch(&self, action: &Action) -> Result<(), HostError> {
        self.dispatch_to(action, &Responder::discard())
    }

    fn dispatch_with_response<F>(&self, action: &Action, on_response: F) -> Result<(), HostError>
    where
        F: FnOnce(Value) + 'static,
    {
        self.dispatch_to(action, &Responder::new(on_response))
    }

    fn watch<F>(&self, action_type: &str, watcher: F) -> Result<Subscription, HostError>
    where
        F: Fn(&Value, &Responder) + 'static,
    {
        if self.inner.stores.default_key().is_none() {
            return Err(HostError::NoDefaultStore);
        }
        Ok(self.inner.watchers.watch(action_type, Rc::new(watcher)))
    }

    fn define_selectors<I, K>(&self, selectors: I) -> Result<(), HostError>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: Into<String>,
    {
        self.inner.selectors.define(selectors);
        Ok(())
    }

    /// Detaches from every store and drops all observations and watchers.
    /// Selector definitions survive.
    fn destroy(&self) {
        let attachments: Vec<Subscription> = self.inner.attachments.borrow_mut().drain(..).collect();
        for attachment in attachments {
            attachment.unsubscribe();
        }
        self.inner.engine.clear();
        self.inner.watchers.clear();
        debug!(target: CONTAINER_TARGET, "destroyed");
    }
}

impl fmt::Debug for HostContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContainer")
            .field("stores", &self.inner.stores.keys().collect::<Vec<_>>())
            .field("default_store", &self.default_store_key())
            .field("observables", &self.observable_count())
            .field("watchers", &self.watcher_count())
            .finish_non_exhaustive()
    }
}
