//! Client side of statebridge.
//!
//! A [`ClientContainer`] offers the same [`Container`] operations as a host,
//! either by calling a [`HostContainer`] in the same process or by exchanging
//! protocol messages with a [`HostAdapter`] over a
//! [`Connection`](statebridge_protocol::Connection).
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use statebridge_client::ClientContainer;
//! use statebridge_diff::Value;
//! use statebridge_host::{Container, Handlers, HostAdapter, HostContainer};
//! use statebridge_protocol::{Action, ErrorPolicy, channel, pump_until_idle};
//!
//! let store = Handlers::new()
//!     .on("SET_AGE", |state, age| state.set_in(&["age"], age.clone()))
//!     .into_store(Value::from(serde_json::json!({"age": 20})));
//! let host = HostContainer::single("main", store);
//!
//! let (near, far) = channel();
//! let adapter = HostAdapter::new(host, Rc::new(far.clone()), ErrorPolicy::Silent);
//! far.on_message(adapter.handler());
//! let client = ClientContainer::remote(Rc::new(near.clone()), ErrorPolicy::Silent);
//! near.on_message(client.handler());
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _age = client.observe("age", move |age: Option<&Value>| {
//!     sink.borrow_mut().push(age.cloned());
//! })?;
//! client.dispatch(&Action::new("SET_AGE", 21))?;
//! pump_until_idle(&[&near, &far]);
//!
//! assert_eq!(*seen.borrow(), [Some(Value::from(20)), Some(Value::from(21))]);
//! # Ok::<(), statebridge_client::ClientError>(())
//! ```
//!
//! [`HostContainer`]: statebridge_host::HostContainer
//! [`HostAdapter`]: statebridge_host::HostAdapter
//! [`Container`]: statebridge_host::Container

mod broker;
mod deferred;
mod error;


pub use self::broker::{ClientContainer, FetchResult};
pub use self::deferred::Deferred;
pub use self::error::{ClientError, RemoteError};

pub(crate) const BROKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::broker");
