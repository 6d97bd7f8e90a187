//! Block lists and selection helpers
//!
//! A [`TensorList`] is an ordered list of optional grouped tensors; `None`
//! entries are implicit zeros. The selection helpers validate user-supplied
//! sub-block index lists against a declared block count.

use crate::error::{AssemblyError, Result};
use consten_core::shape::{storage_size, Shape};
use consten_core::Tensor;
use num_traits::Num;

/// An ordered list of optional tensors; `None` is an implicit zero block.
#[derive(Debug, Clone, Default)]
pub struct TensorList<T>(Vec<Option<Tensor<T>>>);

impl<T: Clone + Num> TensorList<T> {
    /// An empty list.
    pub fn new() -> Self {
        TensorList(Vec::new())
    }

    /// A list of `n` undefined blocks.
    pub fn undefined(n: usize) -> Self {
        TensorList((0..n).map(|_| None).collect())
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no blocks at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The block at `i`, or `None` when undefined.
    pub fn get(&self, i: usize) -> Result<Option<&Tensor<T>>> {
        self.0
            .get(i)
            .map(Option::as_ref)
            .ok_or(AssemblyError::BlockOutOfBounds {
                what: "TensorList",
                index: i,
                bound: self.0.len(),
            })
    }

    /// Set the block at `i`.
    pub fn set(&mut self, i: usize, value: Option<Tensor<T>>) -> Result<()> {
        let n = self.0.len();
        let slot = self.0.get_mut(i).ok_or(AssemblyError::BlockOutOfBounds {
            what: "TensorList",
            index: i,
            bound: n,
        })?;
        *slot = value;
        Ok(())
    }

    /// Append a block.
    pub fn push(&mut self, value: Option<Tensor<T>>) {
        self.0.push(value);
    }

    /// Iterate over the blocks.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Tensor<T>>> {
        self.0.iter().map(Option::as_ref)
    }

    /// The underlying storage.
    pub fn as_slice(&self) -> &[Option<Tensor<T>>] {
        &self.0
    }
}

impl<T: Clone + Num> From<Vec<Option<Tensor<T>>>> for TensorList<T> {
    fn from(v: Vec<Option<Tensor<T>>>) -> Self {
        TensorList(v)
    }
}

/// Resolve an optional sub-block selection against `n` declared blocks.
///
/// `None` selects every block in order. A selection longer than the block
/// count, or containing an index outside it, is a bounds error.
pub(crate) fn select_block_indices(
    blocks: Option<&[usize]>,
    n: usize,
    what: &'static str,
) -> Result<Vec<usize>> {
    match blocks {
        None => Ok((0..n).collect()),
        Some(sel) => {
            if sel.len() > n {
                return Err(AssemblyError::BlockOutOfBounds {
                    what,
                    index: sel.len(),
                    bound: n,
                });
            }
            for &i in sel {
                if i >= n {
                    return Err(AssemblyError::BlockOutOfBounds {
                        what,
                        index: i,
                        bound: n,
                    });
                }
            }
            Ok(sel.to_vec())
        }
    }
}

/// Gather the declared shapes of the selected blocks.
pub(crate) fn select_shapes(all: &[Shape], indices: &[usize]) -> Vec<Shape> {
    indices.iter().map(|&i| all[i].clone()).collect()
}

/// Per-block flattened lengths.
pub(crate) fn numels(shapes: &[Shape]) -> Vec<usize> {
    shapes.iter().map(|s| storage_size(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_defaults_to_all_blocks() {
        assert_eq!(select_block_indices(None, 3, "t").unwrap(), vec![0, 1, 2]);
        assert_eq!(
            select_block_indices(Some(&[2, 0]), 3, "t").unwrap(),
            vec![2, 0]
        );
    }

    #[test]
    fn selection_bounds_are_checked() {
        assert!(select_block_indices(Some(&[3]), 3, "t").is_err());
        assert!(select_block_indices(Some(&[0, 1, 2, 0]), 3, "t").is_err());
    }

    #[test]
    fn tensor_list_accessors() {
        let mut list = TensorList::<f64>::undefined(2);
        assert_eq!(list.len(), 2);
        assert!(list.get(0).unwrap().is_none());
        assert!(list.get(2).is_err());

        list.set(1, Some(Tensor::scalar(1.0))).unwrap();
        assert!(list.get(1).unwrap().is_some());
        assert!(list.set(5, None).is_err());
    }
}
