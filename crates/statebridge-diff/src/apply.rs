//! Patch application.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::PatchError;
use crate::patch::{Patch, PatchOp};
use crate::value::{Map, Value};

/// Replays `patch` on top of `lhs`, returning the new value.
///
/// `lhs` is never modified; composites that the patch touches are rebuilt
/// and everything else is shared with the input. The empty patch returns
/// `lhs` itself.
///
/// # Errors
///
/// Returns a [`PatchError`] when the patch does not fit the shape of `lhs`,
/// such as a move reading past the end of the original array.
pub fn apply_patch(lhs: Option<&Value>, patch: &Patch) -> Result<Option<Value>, PatchError> {
    if patch.is_empty() {
        return Ok(lhs.cloned());
    }
    if let Some(assigned) = patch.single_assign() {
        let merges = matches!(
            (lhs, assigned),
            (Some(Value::Object(_)), Some(Value::Object(_)))
        );
        if !merges {
            return Ok(assigned.cloned());
        }
    }
    match lhs {
        Some(Value::Array(items)) => apply_array(items, patch).map(Some),
        Some(Value::Object(map)) => apply_object(map, patch).map(Some),
        other => {
            let found = other.map_or("an absent value", Value::kind);
            let op = patch.ops().first().map_or("patch", PatchOp::name);
            Err(PatchError::unexpected_op(op, found))
        }
    }
}

fn place(items: &mut Vec<Value>, index: usize, value: Value) {
    if let Some(slot) = items.get_mut(index) {
        *slot = value;
    } else {
        items.resize(index, Value::Null);
        items.push(value);
    }
}

fn apply_array(lhs: &[Value], patch: &Patch) -> Result<Value, PatchError> {
    let mut items = lhs.to_vec();
    for op in patch.ops() {
        match op {
            PatchOp::Move(runs) => {
                for run in runs {
                    for offset in 0..run.len {
                        let source = run.from + offset;
                        let value = lhs
                            .get(source)
                            .ok_or_else(|| PatchError::move_out_of_range(source, lhs.len()))?;
                        place(&mut items, run.to + offset, value.clone());
                    }
                }
            }
            PatchOp::Add { start, patches } => {
                for (offset, nested) in patches.iter().enumerate() {
                    let slot = start + offset;
                    let value = apply_patch(lhs.get(slot), nested)?.unwrap_or_default();
                    place(&mut items, slot, value);
                }
            }
            PatchOp::Truncate(len) => items.truncate(*len),
            other => return Err(PatchError::unexpected_op(other.name(), "array")),
        }
    }
    Ok(Value::from(items))
}

fn apply_object(lhs: &Map, patch: &Patch) -> Result<Value, PatchError> {
    let mut out = lhs.clone();
    for op in patch.ops() {
        match op {
            PatchOp::Retain(keys) => {
                let kept: HashSet<&str> = keys.iter().map(String::as_str).collect();
                out.retain(|key, _| kept.contains(key.as_str()));
            }
            PatchOp::Delete(keys) => {
                for key in keys {
                    out.remove(key);
                }
            }
            PatchOp::Assign(Some(Value::Object(assigns))) => {
                out.extend(assigns.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            PatchOp::Assign(other) => {
                let found = other.as_ref().map_or("an absent value", Value::kind);
                return Err(PatchError::not_an_object(found));
            }
            PatchOp::Keys(nested) => {
                for (key, nested_patch) in nested {
                    match apply_patch(lhs.get(key), nested_patch)? {
                        Some(value) => {
                            out.insert(key.clone(), value);
                        }
                        None => {
                            out.remove(key);
                        }
                    }
                }
            }
            other => return Err(PatchError::unexpected_op(other.name(), "object")),
        }
    }
    Ok(Value::Object(Arc::new(out)))
}
