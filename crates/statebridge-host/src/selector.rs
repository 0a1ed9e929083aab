//! Named computed views over store state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use statebridge_diff::Value;

use crate::path;
use crate::store::StoreSet;

type SelectFn = dyn Fn(&StateReader, &[Value]) -> Option<Value>;

/// A computed view registered under a name and invoked as `$name(args)`.
///
/// `affected` lists the store paths whose changes re-evaluate the selector.
/// Without it every change of every store does.
#[derive(Clone)]
pub struct Selector {
    select: Rc<SelectFn>,
    affected: Option<Vec<String>>,
}

impl Selector {
    /// Wraps a select function.
    #[must_use]
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&StateReader, &[Value]) -> Option<Value> + 'static,
    {
        Self {
            select: Rc::new(select),
            affected: None,
        }
    }

    /// Restricts re-evaluation to changes of the given store paths.
    #[must_use]
    pub fn with_affected<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// The declared affected paths.
    #[must_use]
    pub fn affected(&self) -> Option<&[String]> {
        self.affected.as_deref()
    }

    /// Evaluates the selector.
    #[must_use]
    pub fn select(&self, reader: &StateReader, args: &[Value]) -> Option<Value> {
        (self.select)(reader, args)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("affected", &self.affected)
            .finish_non_exhaustive()
    }
}

/// Read access to host state handed to selectors.
///
/// Unknown stores and unresolvable paths read as `None`.
#[derive(Clone)]
pub struct StateReader {
    stores: Rc<StoreSet>,
}

impl StateReader {
    pub(crate) const fn new(stores: Rc<StoreSet>) -> Self {
        Self { stores }
    }

    /// Whole state of a store; `None` names the default store.
    #[must_use]
    pub fn state(&self, store: Option<&str>) -> Option<Value> {
        self.stores
            .resolve(store)
            .ok()
            .map(|(_, handle)| handle.state())
    }

    /// Value at a `[store#]a.b` path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let store_path = path::parse_store(path).ok()?;
        let state = self.state(store_path.store.as_deref())?;
        state.get_in(&store_path.segments).cloned()
    }
}

impl fmt::Debug for StateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReader").finish_non_exhaustive()
    }
}

/// Selectors known to one host. Definitions merge; later names win.
#[derive(Default)]
pub(crate) struct SelectorRegistry {
    selectors: RefCell<HashMap<String, Selector>>,
}

impl SelectorRegistry {
    pub(crate) fn define<I, K>(&self, selectors: I)
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: Into<String>,
    {
        self.selectors
            .borrow_mut()
            .extend(selectors.into_iter().map(|(name, selector)| (name.into(), selector)));
    }

    pub(crate) fn get(&self, name: &str) -> Option<Selector> {
        self.selectors.borrow().get(name).cloned()
    }
}
