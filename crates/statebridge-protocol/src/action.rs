//! Actions and observation paths carried by protocol messages.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use statebridge_diff::Value;

/// A request to change store state.
///
/// `store` names the target store; `None` targets the host's default store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action type matched by reducers and watchers.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action payload; `null` when the action carries none.
    #[serde(default)]
    pub payload: Value,
    /// Key of the target store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl Action {
    /// Creates an action for the default store.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
            store: None,
        }
    }

    /// Creates an action without a payload.
    #[must_use]
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Targets the action at the named store.
    #[must_use]
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }
}

/// What an observation or fetch addresses.
///
/// A single path uses the `[store#]a.b.c` or `$selector(args).a` grammar. A
/// combined path maps labels to single paths and yields an object keyed by
/// label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    /// One path string.
    Single(String),
    /// Labelled paths observed together.
    Combined(BTreeMap<String, String>),
}

impl PathSpec {
    /// Builds a combined path from label and path pairs.
    #[must_use]
    pub fn combined<L, P, I>(entries: I) -> Self
    where
        L: Into<String>,
        P: Into<String>,
        I: IntoIterator<Item = (L, P)>,
    {
        Self::Combined(
            entries
                .into_iter()
                .map(|(label, path)| (label.into(), path.into()))
                .collect(),
        )
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        Self::Single(path.to_owned())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        Self::Single(path)
    }
}

impl From<BTreeMap<String, String>> for PathSpec {
    fn from(paths: BTreeMap<String, String>) -> Self {
        Self::Combined(paths)
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(path) => f.write_str(path),
            Self::Combined(paths) => {
                f.write_str("{")?;
                for (index, (label, path)) in paths.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{label}: {path}")?;
                }
                f.write_str("}")
            }
        }
    }
}
