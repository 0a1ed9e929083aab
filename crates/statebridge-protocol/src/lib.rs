//! Wire protocol shared by statebridge hosts and clients.
//!
//! The protocol is a closed set of JSON messages ([`Message`]) correlated by
//! message id. Messages travel over any ordered string transport that
//! implements [`Connection`]; an in-memory [`channel`] is provided for
//! embedding and tests, and [`MessageWriter`] frames messages as JSON lines
//! for stream transports. An [`Outbox`] mints correlation ids and applies
//! the peer's [`ErrorPolicy`] to failed requests.
//!
//! # Example
//!
//! ```rust
//! use statebridge_protocol::{Message, PathSpec};
//!
//! let message = Message::parse(br#"{"type":"observe","mid":1,"path":"main#user.name"}"#)?;
//! assert_eq!(
//!     message,
//!     Message::Observe { mid: 1, path: PathSpec::from("main#user.name") }
//! );
//! # Ok::<(), statebridge_protocol::ProtocolError>(())
//! ```

mod action;
mod connection;
mod error;
mod message;
mod outbox;
mod policy;
mod writer;


pub use self::action::{Action, PathSpec};
pub use self::connection::{ChannelEndpoint, Connection, channel, pump_until_idle};
pub use self::error::ProtocolError;
pub use self::message::{Message, Mid};
pub use self::outbox::Outbox;
pub use self::policy::{ErrorPolicy, ErrorPolicyParseError};
pub use self::writer::MessageWriter;

pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");
pub(crate) const OUTBOX_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::outbox");
