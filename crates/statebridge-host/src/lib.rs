//! Host side of statebridge.
//!
//! A [`HostContainer`] owns one or more [`Store`]s and lets callers observe
//! paths inside them, dispatch actions, watch dispatched actions and define
//! computed [`Selector`]s. A [`HostAdapter`] serves a container to a remote
//! client over any [`Connection`](statebridge_protocol::Connection).
//!
//! Paths use `[store#]a.b.c` or `$selector(jsonArgs).a`; an omitted store key
//! means the default store.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use statebridge_diff::Value;
//! use statebridge_host::{Container, Handlers, HostContainer};
//! use statebridge_protocol::Action;
//!
//! let store = Handlers::new()
//!     .on("SET_CITY", |state, city| state.set_in(&["locale", "city"], city.clone()))
//!     .into_store(Value::from(serde_json::json!({"locale": {"city": "Wuhan"}})));
//! let host = HostContainer::single("main", store);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let subscription = host.observe("main#locale.city", move |city: Option<&Value>| {
//!     sink.borrow_mut().push(city.cloned());
//! })?;
//! host.dispatch(&Action::new("SET_CITY", "Shanghai"))?;
//! subscription.unsubscribe();
//!
//! assert_eq!(
//!     *seen.borrow(),
//!     [Some(Value::from("Wuhan")), Some(Value::from("Shanghai"))]
//! );
//! # Ok::<(), statebridge_host::HostError>(())
//! ```

mod adapter;
mod container;
mod engine;
mod error;
mod interceptor;
mod path;
mod selector;
mod store;
mod subscription;
mod watch;

#[cfg(test)]
mod tests;

pub use self::adapter::HostAdapter;
pub use self::container::{Container, HostBuilder, HostContainer};
pub use self::engine::Listener;
pub use self::error::HostError;
pub use self::interceptor::{Filter, Interceptor};
pub use self::selector::{Selector, StateReader};
pub use self::store::{Handlers, Reducer, ReducerStore, Store, StoreListener};
pub use self::subscription::Subscription;
pub use self::watch::{Responder, Watcher};

pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");
pub(crate) const WATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watch");
pub(crate) const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");
pub(crate) const ADAPTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::adapter");
