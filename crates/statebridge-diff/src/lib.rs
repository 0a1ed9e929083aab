//! Structural diff and patch codec for shared values.
//!
//! The crate models JSON-shaped data as [`Value`]s whose arrays and objects
//! are reference counted, so unchanged sub-trees can be recognised by
//! identity. [`diff`] turns a pair of values into a compact [`Patch`] and
//! [`apply_patch`] replays it; the pair round-trips for every supported
//! input, including absent values on either side.
//!
//! Patches serialise to the numeric tuple form used on the wire (see
//! [`patch`]), so a host can ship only the edits to a remote shadow copy.
//!
//! # Example
//!
//! ```rust
//! use statebridge_diff::{Value, apply_patch, diff};
//!
//! let lhs = Value::from(serde_json::json!({"name": "jack", "age": 20}));
//! let rhs = lhs.set_in(&["age"], Value::from(21));
//! let patch = diff(Some(&lhs), Some(&rhs))?;
//! assert_eq!(serde_json::to_string(&patch)?, r#"[[4,{"age":21}]]"#);
//! assert_eq!(apply_patch(Some(&lhs), &patch)?, Some(rhs));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod apply;
mod diff;
pub mod error;
pub mod patch;
pub mod value;

#[cfg(test)]
mod tests;

pub use self::apply::apply_patch;
pub use self::diff::diff;
pub use self::error::{DiffError, PatchError};
pub use self::patch::{MoveRun, Patch, PatchOp};
pub use self::value::{Map, Value, identical};
