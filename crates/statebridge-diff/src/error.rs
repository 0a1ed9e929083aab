//! Errors raised while computing or replaying patches.

use thiserror::Error;

/// Errors raised by [`crate::diff`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// An array cannot be diffed against a non-array composite.
    #[error("cannot diff an array against {found}")]
    TypeMismatch {
        /// Kind of the right-hand value.
        found: &'static str,
    },
}

impl DiffError {
    /// Creates a type mismatch error naming the right-hand kind.
    #[must_use]
    pub const fn type_mismatch(found: &'static str) -> Self {
        Self::TypeMismatch { found }
    }
}

/// Errors raised by [`crate::apply_patch`] and patch decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// A move run reads past the end of the source array.
    #[error("move source index {index} is out of range for length {len}")]
    MoveOutOfRange {
        /// Source index that was requested.
        index: usize,
        /// Length of the source array.
        len: usize,
    },

    /// An assignment applied to an object among other edits did not carry
    /// an object to merge.
    #[error("assignment merge expects an object, found {found}")]
    NotAnObject {
        /// Kind of the value that was found instead.
        found: &'static str,
    },

    /// An operation was applied to a value it cannot edit.
    #[error("{op} cannot be applied to {found}")]
    UnexpectedOp {
        /// Name of the operation.
        op: &'static str,
        /// Kind of the target value.
        found: &'static str,
    },

    /// The encoded operation tag is not recognised.
    #[error("unknown patch operation tag {tag}")]
    UnknownOp {
        /// The tag that was read.
        tag: u64,
    },

    /// The encoded patch does not have the expected shape.
    #[error("malformed patch: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl PatchError {
    /// Creates a move range error.
    #[must_use]
    pub const fn move_out_of_range(index: usize, len: usize) -> Self {
        Self::MoveOutOfRange { index, len }
    }

    /// Creates an error for an assignment merge onto a non-object.
    #[must_use]
    pub const fn not_an_object(found: &'static str) -> Self {
        Self::NotAnObject { found }
    }

    /// Creates an error for an operation applied to the wrong kind of value.
    #[must_use]
    pub const fn unexpected_op(op: &'static str, found: &'static str) -> Self {
        Self::UnexpectedOp { op, found }
    }

    /// Creates a malformed patch error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
