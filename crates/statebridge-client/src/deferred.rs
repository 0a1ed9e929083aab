//! Single-assignment replies.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct Slot<T> {
    value: Option<T>,
    resolved: bool,
    waker: Option<Waker>,
}

/// A value that arrives later, exactly once.
///
/// Poll it as a [`Future`] or check it with [`Deferred::take`] after the
/// transport has delivered the reply. The value can be taken once.
pub struct Deferred<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Write end of a [`Deferred`].
pub(crate) struct Resolver<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Deferred<T> {
    pub(crate) fn pending() -> (Self, Resolver<T>) {
        let slot = Rc::new(RefCell::new(Slot {
            value: None,
            resolved: false,
            waker: None,
        }));
        (
            Self {
                slot: Rc::clone(&slot),
            },
            Resolver { slot },
        )
    }

    /// A deferred that already holds `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let (deferred, resolver) = Self::pending();
        resolver.resolve(value);
        deferred
    }

    /// Returns `true` once a value has arrived, even if it was taken.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().resolved
    }

    /// Takes the value if it has arrived and was not taken before.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.slot.borrow_mut().value.take()
    }
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(self, value: T) {
        let waker = {
            let mut slot = self.slot.borrow_mut();
            if slot.resolved {
                return;
            }
            slot.resolved = true;
            slot.value = Some(value);
            slot.waker.take()
        };
        if let Some(waiting) = waker {
            waiting.wake();
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.slot.borrow_mut();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}
