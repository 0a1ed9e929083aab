//! Idempotent teardown handles.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;

/// Handle that ends an observation, watch or store subscription.
///
/// Clones share the same teardown, which runs at most once no matter how
/// many clones call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    teardown: Rc<RefCell<Option<Teardown>>>,
}

impl Subscription {
    /// Wraps a teardown closure.
    #[must_use]
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            teardown: Rc::new(RefCell::new(Some(Box::new(teardown)))),
        }
    }

    /// A handle that is already inactive.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            teardown: Rc::default(),
        }
    }

    /// Ends the subscription. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Returns `true` until the first [`Subscription::unsubscribe`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.teardown.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
