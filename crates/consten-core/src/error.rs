//! Error types for grouped tensor operations
//!
//! All fallible operations in this crate report one of the variants below.
//! Failures are synchronous and fail-fast: they are raised at the point of
//! the violating call and carry enough context (the offending shapes or
//! indices) to diagnose the contract violation without a debugger.

use crate::shape::Shape;
use thiserror::Error;

/// Error type for grouped tensor operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    /// A requested shape is internally inconsistent (e.g. a zero-length
    /// reshape target where data exists, or an invalid split specification).
    #[error("invalid shape {shape:?}: {reason}")]
    Shape { shape: Shape, reason: String },

    /// Two or more shapes that must agree, be broadcastable, or be reducible
    /// are not.
    #[error("shape mismatch in {operation}: {reason} (got {actual:?}, expected {expected:?})")]
    ShapeMismatch {
        operation: &'static str,
        expected: Shape,
        actual: Shape,
        reason: String,
    },

    /// An axis or block index is outside the declared range.
    #[error("index {index} out of bounds for {what} of extent {bound}")]
    OutOfBounds {
        what: &'static str,
        index: isize,
        bound: usize,
    },

    /// A tensor or derivative that was never assigned is being read.
    #[error("undefined value: {0}")]
    Undefined(String),
}

impl TensorError {
    /// Shorthand for a [`TensorError::ShapeMismatch`].
    pub fn mismatch(
        operation: &'static str,
        expected: impl Into<Shape>,
        actual: impl Into<Shape>,
        reason: impl Into<String>,
    ) -> Self {
        TensorError::ShapeMismatch {
            operation,
            expected: expected.into(),
            actual: actual.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`TensorError::OutOfBounds`].
    pub fn out_of_bounds(what: &'static str, index: isize, bound: usize) -> Self {
        TensorError::OutOfBounds { what, index, bound }
    }
}

/// Result type for grouped tensor operations
pub type Result<T> = std::result::Result<T, TensorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn mismatch_display_carries_shapes() {
        let err = TensorError::mismatch(
            "base_reshape",
            Shape::from_slice(&[2, 3]),
            Shape::from_slice(&[7]),
            "storage size must be preserved",
        );
        let msg = err.to_string();
        assert!(msg.contains("base_reshape"));
        assert!(msg.contains("[7]"));
        assert!(msg.contains("[2, 3]"));
    }

    #[test]
    fn out_of_bounds_display() {
        let err = TensorError::out_of_bounds("block index", 4, 3);
        assert_eq!(
            err.to_string(),
            "index 4 out of bounds for block index of extent 3"
        );
    }

    #[test]
    fn shape_error_display() {
        let shape: Shape = smallvec![2, 0, 3];
        let err = TensorError::Shape {
            shape,
            reason: "zero-size axis not allowed here".into(),
        };
        assert!(err.to_string().contains("[2, 0, 3]"));
    }
}
