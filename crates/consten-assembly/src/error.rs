//! Error types for block collections and assembly

use consten_core::TensorError;
use thiserror::Error;

/// Error type for heterogeneous block operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    /// A grouped-tensor operation failed underneath
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// A block index (or a whole selection) is outside the declared range
    #[error("block index {index} out of bounds for {what} with {bound} blocks")]
    BlockOutOfBounds {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    /// Two collections that must have the same block structure do not
    #[error("block count mismatch in {operation}: {left} vs {right}")]
    BlockCountMismatch {
        operation: &'static str,
        left: usize,
        right: usize,
    },

    /// A block value does not match its declared base shape
    #[error("block {index} has base shape {actual:?}, declared {declared:?}")]
    BlockShapeMismatch {
        index: usize,
        declared: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Result type for heterogeneous block operations
pub type Result<T> = std::result::Result<T, AssemblyError>;
