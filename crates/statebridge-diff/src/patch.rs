//! Patch operations and their wire encoding.
//!
//! A [`Patch`] is an ordered list of [`PatchOp`]s. On the wire each operation
//! is a JSON array whose first element is a numeric tag:
//!
//! | tag | operation | layout |
//! |---|---|---|
//! | 0 | move | `[0, to, from, len, to, from, len, ...]` |
//! | 1 | add | `[1, start, patch, patch, ...]` |
//! | 2 | truncate | `[2, len]` |
//! | 3 | keys | `[3, {key: patch}]` |
//! | 4 | assign | `[4, value]` |
//! | 5 | retain | `[5, key, key, ...]` |
//! | 6 | delete | `[6, key, key, ...]` |

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::PatchError;
use crate::value::Value;

const TAG_MOVE: u64 = 0;
const TAG_ADD: u64 = 1;
const TAG_TRUNCATE: u64 = 2;
const TAG_KEYS: u64 = 3;
const TAG_ASSIGN: u64 = 4;
const TAG_RETAIN: u64 = 5;
const TAG_DELETE: u64 = 6;

/// A contiguous block of array elements copied from one position to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRun {
    /// First destination index.
    pub to: usize,
    /// First source index in the original array.
    pub from: usize,
    /// Number of elements in the block.
    pub len: usize,
}

impl MoveRun {
    /// Creates a move run.
    #[must_use]
    pub const fn new(to: usize, from: usize, len: usize) -> Self {
        Self { to, from, len }
    }
}

/// A single edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Copy blocks of the original array to new positions.
    Move(Vec<MoveRun>),
    /// Patch consecutive array slots, starting at `start`, against the
    /// original elements at those slots.
    Add {
        /// First slot written.
        start: usize,
        /// One nested patch per slot.
        patches: Vec<Patch>,
    },
    /// Shorten an array to the given length.
    Truncate(usize),
    /// Apply nested patches to the named object keys.
    Keys(BTreeMap<String, Patch>),
    /// Replace the value outright, or merge keys when both sides are objects.
    Assign(Option<Value>),
    /// Keep only the listed object keys (before assignment).
    Retain(Vec<String>),
    /// Remove the listed object keys.
    Delete(Vec<String>),
}

impl PatchOp {
    /// Operation name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Add { .. } => "add",
            Self::Truncate(_) => "truncate",
            Self::Keys(_) => "keys",
            Self::Assign(_) => "assign",
            Self::Retain(_) => "retain",
            Self::Delete(_) => "delete",
        }
    }

    fn to_json(&self) -> Json {
        let mut out = Vec::new();
        match self {
            Self::Move(runs) => {
                out.push(Json::from(TAG_MOVE));
                for run in runs {
                    out.extend([run.to, run.from, run.len].map(Json::from));
                }
            }
            Self::Add { start, patches } => {
                out.push(Json::from(TAG_ADD));
                out.push(Json::from(*start));
                out.extend(patches.iter().map(Patch::to_json));
            }
            Self::Truncate(len) => {
                out.extend([Json::from(TAG_TRUNCATE), Json::from(*len)]);
            }
            Self::Keys(nested) => {
                let map = nested
                    .iter()
                    .map(|(key, patch)| (key.clone(), patch.to_json()))
                    .collect();
                out.extend([Json::from(TAG_KEYS), Json::Object(map)]);
            }
            Self::Assign(value) => {
                let encoded = value.as_ref().map_or(Json::Null, Value::to_json);
                out.extend([Json::from(TAG_ASSIGN), encoded]);
            }
            Self::Retain(keys) => {
                out.push(Json::from(TAG_RETAIN));
                out.extend(keys.iter().cloned().map(Json::String));
            }
            Self::Delete(keys) => {
                out.push(Json::from(TAG_DELETE));
                out.extend(keys.iter().cloned().map(Json::String));
            }
        }
        Json::Array(out)
    }

    fn from_json(raw: &Json) -> Result<Self, PatchError> {
        let Json::Array(items) = raw else {
            return Err(PatchError::malformed("operation is not an array"));
        };
        let Some((tag, args)) = items.split_first() else {
            return Err(PatchError::malformed("operation is empty"));
        };
        let code = tag
            .as_u64()
            .ok_or_else(|| PatchError::malformed("operation tag is not an integer"))?;
        match code {
            TAG_MOVE => {
                let triples = args.chunks_exact(3);
                if !triples.remainder().is_empty() {
                    return Err(PatchError::malformed("move arguments are not triples"));
                }
                let runs = triples
                    .map(|chunk| match chunk {
                        [to, from, len] => Ok(MoveRun::new(index(to)?, index(from)?, index(len)?)),
                        _ => Err(PatchError::malformed("move arguments are not triples")),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Self::Move(runs))
            }
            TAG_ADD => {
                let Some((start, patches)) = args.split_first() else {
                    return Err(PatchError::malformed("add is missing its start index"));
                };
                let patches = patches
                    .iter()
                    .map(Patch::from_json)
                    .collect::<Result<_, _>>()?;
                Ok(Self::Add {
                    start: index(start)?,
                    patches,
                })
            }
            TAG_TRUNCATE => match args {
                [len] => Ok(Self::Truncate(index(len)?)),
                _ => Err(PatchError::malformed("truncate expects one length")),
            },
            TAG_KEYS => match args {
                [Json::Object(map)] => {
                    let nested = map
                        .iter()
                        .map(|(key, patch)| Ok((key.clone(), Patch::from_json(patch)?)))
                        .collect::<Result<_, PatchError>>()?;
                    Ok(Self::Keys(nested))
                }
                _ => Err(PatchError::malformed("keys expects one object")),
            },
            TAG_ASSIGN => match args {
                [] => Ok(Self::Assign(None)),
                [value] => Ok(Self::Assign(Some(Value::from(value.clone())))),
                _ => Err(PatchError::malformed("assign expects one value")),
            },
            TAG_RETAIN => keys(args).map(Self::Retain),
            TAG_DELETE => keys(args).map(Self::Delete),
            other => Err(PatchError::UnknownOp { tag: other }),
        }
    }
}

fn index(raw: &Json) -> Result<usize, PatchError> {
    raw.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PatchError::malformed(format!("expected an index, found {raw}")))
}

fn keys(args: &[Json]) -> Result<Vec<String>, PatchError> {
    args.iter()
        .map(|key| {
            key.as_str()
                .map(str::to_owned)
                .ok_or_else(|| PatchError::malformed(format!("expected a key, found {key}")))
        })
        .collect()
}

/// An ordered edit script. The empty patch means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Creates a patch holding a single assignment.
    #[must_use]
    pub fn assign(value: Option<Value>) -> Self {
        Self {
            ops: vec![PatchOp::Assign(value)],
        }
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    /// Returns `true` when the patch makes no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Appends an operation.
    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    /// Returns the assigned value when the patch is exactly one assignment.
    #[must_use]
    pub fn single_assign(&self) -> Option<Option<&Value>> {
        match self.ops.as_slice() {
            [PatchOp::Assign(value)] => Some(value.as_ref()),
            _ => None,
        }
    }

    /// Encodes the patch in its wire form.
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Array(self.ops.iter().map(PatchOp::to_json).collect())
    }

    /// Decodes a patch from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnknownOp`] for unrecognised tags and
    /// [`PatchError::Malformed`] for any other shape problem.
    pub fn from_json(raw: &Json) -> Result<Self, PatchError> {
        let Json::Array(items) = raw else {
            return Err(PatchError::malformed("patch is not an array"));
        };
        let ops = items
            .iter()
            .map(PatchOp::from_json)
            .collect::<Result<_, _>>()?;
        Ok(Self { ops })
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self { ops }
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Json::deserialize(deserializer)?;
        Self::from_json(&raw).map_err(D::Error::custom)
    }
}
