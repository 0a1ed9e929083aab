//! Filtered, bulk-removable action watches.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use statebridge_diff::Value;

use crate::container::Container;
use crate::subscription::Subscription;
use crate::watch::Responder;

/// Decides whether an intercepted payload reaches the watcher.
pub type Filter = Rc<dyn Fn(&Value) -> bool>;

/// Installs watches on a container and removes them all at once.
pub struct Interceptor<C: Container> {
    target: C,
    filter: Option<Filter>,
    installed: RefCell<Vec<Subscription>>,
}

impl<C: Container> Interceptor<C> {
    /// Wraps `target`. Without a filter every payload passes.
    #[must_use]
    pub fn new(target: C, filter: Option<Filter>) -> Self {
        Self {
            target,
            filter,
            installed: RefCell::default(),
        }
    }

    /// Watches `action_type` on the target, forwarding payloads the filter
    /// accepts.
    ///
    /// # Errors
    ///
    /// Propagates the target's watch failure.
    pub fn watch<F>(&self, action_type: &str, watcher: F) -> Result<Subscription, C::Error>
    where
        F: Fn(&Value, &Responder) + 'static,
    {
        let filter = self.filter.clone();
        let subscription = self.target.watch(action_type, move |payload, responder| {
            if filter.as_ref().is_none_or(|accepts| accepts(payload)) {
                watcher(payload, responder);
            }
        })?;
        self.installed.borrow_mut().push(subscription.clone());
        Ok(subscription)
    }

    /// Number of watches installed and not yet ended.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.installed
            .borrow()
            .iter()
            .filter(|subscription| subscription.is_active())
            .count()
    }

    /// Ends every watch this interceptor installed.
    pub fn destroy(&self) {
        let installed: Vec<Subscription> = self.installed.borrow_mut().drain(..).collect();
        for subscription in installed {
            subscription.unsubscribe();
        }
    }
}

impl<C: Container + fmt::Debug> fmt::Debug for Interceptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("target", &self.target)
            .field("filtered", &self.filter.is_some())
            .field("active", &self.active_count())
            .finish()
    }
}
