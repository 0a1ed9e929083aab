//! Structural differ.

use std::collections::{BTreeMap, HashMap};

use crate::error::DiffError;
use crate::patch::{MoveRun, Patch, PatchOp};
use crate::value::{Map, Value, identical};

/// Computes the patch that turns `lhs` into `rhs`.
///
/// Identical inputs yield the empty patch. When either side is absent or a
/// primitive, or an object is replaced by an array, the patch is a single
/// assignment. Arrays are matched by element identity so that moved elements
/// are encoded as moves rather than rewritten.
///
/// # Errors
///
/// Returns [`DiffError::TypeMismatch`] when an array is replaced by an object.
pub fn diff(lhs: Option<&Value>, rhs: Option<&Value>) -> Result<Patch, DiffError> {
    if identical(lhs, rhs) {
        return Ok(Patch::new());
    }
    match (lhs, rhs) {
        (Some(Value::Array(left)), Some(Value::Array(right))) => diff_arrays(left, right),
        (Some(Value::Array(_)), Some(found @ Value::Object(_))) => {
            Err(DiffError::type_mismatch(found.kind()))
        }
        (Some(Value::Object(left)), Some(Value::Object(right))) => diff_objects(left, right),
        _ => Ok(Patch::assign(rhs.cloned())),
    }
}

fn diff_arrays(lhs: &[Value], rhs: &[Value]) -> Result<Patch, DiffError> {
    let positions: HashMap<_, usize> = lhs
        .iter()
        .enumerate()
        .map(|(index, value)| (value.identity_key(), index))
        .collect();

    let mut exchanges = Vec::new();
    let mut augments = Vec::new();
    for (new_index, element) in rhs.iter().enumerate() {
        match positions.get(&element.identity_key()) {
            Some(&old_index) if old_index != new_index => exchanges.push((new_index, old_index)),
            Some(_) => {}
            None => augments.push((new_index, diff(lhs.get(new_index), Some(element))?)),
        }
    }

    let mut patch = Patch::new();
    if let Some(op) = merge_moves(&exchanges) {
        patch.push(op);
    }
    for op in merge_adds(augments) {
        patch.push(op);
    }
    if rhs.len() < lhs.len() {
        patch.push(PatchOp::Truncate(rhs.len()));
    }
    Ok(patch)
}

/// Folds `(to, from)` exchanges, ordered by `to`, into runs that share an
/// offset and have consecutive destinations.
fn merge_moves(exchanges: &[(usize, usize)]) -> Option<PatchOp> {
    let mut runs: Vec<MoveRun> = Vec::new();
    for &(to, from) in exchanges {
        match runs.last_mut() {
            Some(run) if run.to + run.len == to && run.from + run.len == from => run.len += 1,
            _ => runs.push(MoveRun::new(to, from, 1)),
        }
    }
    (!runs.is_empty()).then_some(PatchOp::Move(runs))
}

fn merge_adds(augments: Vec<(usize, Patch)>) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    let mut current: Option<(usize, Vec<Patch>)> = None;
    for (index, nested) in augments {
        match current.as_mut() {
            Some((start, patches)) if *start + patches.len() == index => patches.push(nested),
            _ => {
                if let Some((start, patches)) = current.take() {
                    ops.push(PatchOp::Add { start, patches });
                }
                current = Some((index, vec![nested]));
            }
        }
    }
    if let Some((start, patches)) = current {
        ops.push(PatchOp::Add { start, patches });
    }
    ops
}

/// A nested single assignment can be hoisted into the parent's assignment
/// only when it replaces the whole child. Object-to-object assignments merge,
/// so they are hoisted only when they cover every key of the new child.
fn lifts_into_assign(left: &Value, right: &Value, patch: &Patch) -> bool {
    match (left, patch.single_assign()) {
        (_, None) => false,
        (Value::Object(_), Some(Some(Value::Object(assigned)))) => right
            .as_object()
            .is_some_and(|child| child.len() == assigned.len()),
        (_, Some(_)) => true,
    }
}

fn diff_objects(lhs: &Map, rhs: &Map) -> Result<Patch, DiffError> {
    let dels: Vec<String> = lhs
        .keys()
        .filter(|key| !rhs.contains_key(*key))
        .cloned()
        .collect();

    let mut retains = Vec::new();
    let mut assigns = Map::new();
    let mut nested = BTreeMap::new();
    for (key, right) in rhs {
        let Some(left) = lhs.get(key) else {
            assigns.insert(key.clone(), right.clone());
            continue;
        };
        let patch = diff(Some(left), Some(right))?;
        if patch.is_empty() {
            retains.push(key.clone());
            continue;
        }
        if lifts_into_assign(left, right, &patch) {
            assigns.insert(key.clone(), right.clone());
        } else {
            nested.insert(key.clone(), patch);
        }
    }

    let mut patch = Patch::new();
    if !dels.is_empty() {
        if retains.len() < dels.len() {
            patch.push(PatchOp::Retain(retains));
        } else {
            patch.push(PatchOp::Delete(dels));
        }
    }
    if !assigns.is_empty() {
        patch.push(PatchOp::Assign(Some(Value::from(assigns))));
    }
    if !nested.is_empty() {
        patch.push(PatchOp::Keys(nested));
    }
    Ok(patch)
}
