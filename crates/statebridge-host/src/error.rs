//! Errors raised by host containers.

use thiserror::Error;

/// Failures of host-side state access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// A path or action named a store the host does not own.
    #[error("store '{store}' not found")]
    StoreNotFound {
        /// Key of the missing store.
        store: String,
    },
    /// A path or action relied on the default store but none is configured.
    #[error("no default store is configured")]
    NoDefaultStore,
    /// A selector path named a selector that was never defined.
    #[error("selector '{name}' is not registered")]
    SelectorNotRegistered {
        /// Name of the selector.
        name: String,
    },
    /// A selector path does not follow `$name(args).path`.
    #[error("invalid selector path '{path}': {message}")]
    SelectorSyntax {
        /// The offending path.
        path: String,
        /// What was wrong with it.
        message: String,
    },
    /// Selector arguments are not a JSON argument list.
    #[error("invalid selector arguments '({args})': {message}")]
    SelectorArgs {
        /// Raw argument text between the parentheses.
        args: String,
        /// Parser diagnostic.
        message: String,
    },
}

impl HostError {
    /// Builds a [`HostError::StoreNotFound`].
    #[must_use]
    pub fn store_not_found(store: impl Into<String>) -> Self {
        Self::StoreNotFound {
            store: store.into(),
        }
    }

    /// Builds a [`HostError::SelectorNotRegistered`].
    #[must_use]
    pub fn selector_not_registered(name: impl Into<String>) -> Self {
        Self::SelectorNotRegistered { name: name.into() }
    }

    /// Builds a [`HostError::SelectorSyntax`].
    #[must_use]
    pub fn selector_syntax(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SelectorSyntax {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Builds a [`HostError::SelectorArgs`] from a JSON parse failure.
    #[must_use]
    pub fn selector_args(args: impl Into<String>, error: &serde_json::Error) -> Self {
        Self::SelectorArgs {
            args: args.into(),
            message: error.to_string(),
        }
    }
}
