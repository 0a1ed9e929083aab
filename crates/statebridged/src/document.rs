//! The JSON document store served by the daemon.
//!
//! | action    | payload               | effect                          |
//! |-----------|-----------------------|---------------------------------|
//! | `set`     | `{"path", "value"}`   | stores `value` at the dotted path |
//! | `remove`  | `{"path"}`            | deletes the entry at the path   |
//! | `replace` | any value             | replaces the whole document     |
//! | `reset`   | ignored               | restores the seed document      |
//!
//! An empty path addresses the whole document. Malformed payloads leave the
//! document untouched.

use statebridge_diff::Value;
use statebridge_host::{Handlers, ReducerStore};
use tracing::warn;

use crate::DOCUMENT_TARGET;

/// Action type storing a value at a path.
pub const SET: &str = "set";
/// Action type deleting the entry at a path.
pub const REMOVE: &str = "remove";
/// Action type replacing the whole document.
pub const REPLACE: &str = "replace";
/// Action type restoring the seed document.
pub const RESET: &str = "reset";

/// Builds the document store seeded with `seed`.
#[must_use]
pub fn document_store(seed: Value) -> ReducerStore {
    let reset = seed.clone();
    Handlers::new()
        .on(SET, |state, payload| {
            edit_path(SET, payload).map_or_else(
                || state.clone(),
                |segments| {
                    let value = payload.get("value").cloned().unwrap_or_default();
                    state.set_in(&segments, value)
                },
            )
        })
        .on(REMOVE, |state, payload| {
            edit_path(REMOVE, payload)
                .map_or_else(|| state.clone(), |segments| state.remove_in(&segments))
        })
        .on(REPLACE, |_, payload| payload.clone())
        .on(RESET, move |_, _| reset.clone())
        .into_store(seed)
}

fn edit_path(kind: &str, payload: &Value) -> Option<Vec<String>> {
    let Some(path) = payload.get("path").and_then(Value::as_str) else {
        warn!(target: DOCUMENT_TARGET, kind, "ignoring edit without a string path");
        return None;
    };
    Some(
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}
