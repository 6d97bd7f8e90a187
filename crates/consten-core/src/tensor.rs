//! The grouped tensor value type
//!
//! A [`Tensor`] wraps a dense n-dimensional array from the runtime together
//! with two pieces of bookkeeping that partition its axes into three
//! groups:
//!
//! - the **dynamic** group — the leading runtime-batch axes, broadcastable
//!   and possibly symbolic (see [`DynShape`](crate::shape::DynShape));
//! - the **intermediate** group — structural vectorization axes introduced
//!   by model composition (one axis per slip system, per sub-model
//!   instance, …);
//! - the **base** group — the trailing axes carrying the intrinsic physical
//!   rank of the quantity (e.g. `3 × 3` for a stress tensor).
//!
//! The partition is `axes[0..dynamic_dim] | axes[dynamic_dim..dynamic_dim +
//! intmd_dim] | rest`. Every operation in this module is restricted to one
//! group and leaves the other groups' axes untouched; the invariant
//! `dynamic_dim + intmd_dim <= ndim` is re-established on every
//! construction.
//!
//! ```
//! use consten_core::tensor::Tensor;
//!
//! // dynamic (3, 4), intermediate (2), base (3, 3)
//! let t = Tensor::<f64>::zeros([3, 4].into(), &[2], &[3, 3]);
//! assert_eq!(t.dynamic_sizes().concrete().as_slice(), &[3, 4]);
//! assert_eq!(t.intmd_sizes(), &[2]);
//! assert_eq!(t.base_sizes(), &[3, 3]);
//! assert_eq!(t.dim(), 5);
//! ```

use crate::error::{Result, TensorError};
use crate::shape::{DynShape, Shape};
use ndarray::ArrayD;
use num_traits::Num;

mod arithmetic;
mod creation;
mod groups;
mod indexing;
mod shape_ops;

pub use arithmetic::{inner, norm, norm_sq};
pub use groups::{broadcast_dynamic_sizes, broadcast_intmd_sizes};
pub(crate) use shape_ops::permute_raw;
pub use shape_ops::{base_cat, base_stack};

/// A dense tensor whose axes are partitioned into dynamic, intermediate,
/// and base groups.
///
/// Ownership follows the runtime's value semantics: group operations return
/// owned tensors, and cloning clones the storage.
#[derive(Clone)]
pub struct Tensor<T> {
    /// Underlying runtime storage
    pub(crate) data: ArrayD<T>,
    /// Sizes of the leading (dynamic) axis group, possibly symbolic
    pub(crate) dynamic_sizes: DynShape,
    /// Number of intermediate axes immediately after the dynamic group
    pub(crate) intmd_dim: usize,
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Wrap a runtime array with an explicit dynamic shape and intermediate
    /// dimension count.
    ///
    /// Fails with [`TensorError::ShapeMismatch`] when the dynamic shape
    /// does not match the leading sizes of the array, or when the declared
    /// groups exceed the array's rank.
    pub fn from_parts(data: ArrayD<T>, dynamic_sizes: DynShape, intmd_dim: usize) -> Result<Self> {
        let dd = dynamic_sizes.len();
        if dd + intmd_dim > data.ndim() {
            return Err(TensorError::mismatch(
                "from_parts",
                Shape::from_slice(data.shape()),
                dynamic_sizes.concrete(),
                format!(
                    "dynamic dimension {} plus intermediate dimension {} exceeds tensor rank {}",
                    dd,
                    intmd_dim,
                    data.ndim()
                ),
            ));
        }
        if dynamic_sizes.concrete().as_slice() != &data.shape()[..dd] {
            return Err(TensorError::mismatch(
                "from_parts",
                dynamic_sizes.concrete(),
                Shape::from_slice(&data.shape()[..dd]),
                "dynamic shape does not match the leading sizes of the handle",
            ));
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Wrap a runtime array given an explicit dynamic/intermediate split.
    ///
    /// The dynamic shape is read off the handle; fails when the split
    /// exceeds the handle's rank.
    pub fn from_handle(data: ArrayD<T>, dynamic_dim: usize, intmd_dim: usize) -> Result<Self> {
        if dynamic_dim + intmd_dim > data.ndim() {
            return Err(TensorError::mismatch(
                "from_handle",
                Shape::from_slice(data.shape()),
                Shape::new(),
                format!(
                    "dynamic dimension {} plus intermediate dimension {} exceeds tensor rank {}",
                    dynamic_dim,
                    intmd_dim,
                    data.ndim()
                ),
            ));
        }
        let dynamic_sizes = DynShape::from_concrete(&data.shape()[..dynamic_dim]);
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Wrap a runtime array given the dynamic dimension count and the base
    /// shape the handle is expected to end with; the intermediate dimension
    /// is inferred from the remaining rank.
    ///
    /// Fails with [`TensorError::ShapeMismatch`] when the trailing sizes do
    /// not equal `expected_base` or the ranks are inconsistent.
    pub fn from_handle_with_base(
        data: ArrayD<T>,
        dynamic_dim: usize,
        expected_base: &[usize],
    ) -> Result<Self> {
        if dynamic_dim + expected_base.len() > data.ndim() {
            return Err(TensorError::mismatch(
                "from_handle_with_base",
                Shape::from_slice(expected_base),
                Shape::from_slice(data.shape()),
                "handle rank is too small for the requested split",
            ));
        }
        let base_start = data.ndim() - expected_base.len();
        if &data.shape()[base_start..] != expected_base {
            return Err(TensorError::mismatch(
                "from_handle_with_base",
                Shape::from_slice(expected_base),
                Shape::from_slice(&data.shape()[base_start..]),
                "trailing sizes do not match the expected base shape",
            ));
        }
        Self::from_handle(data, dynamic_dim, base_start - dynamic_dim)
    }

    /// The underlying runtime array.
    pub fn array(&self) -> &ArrayD<T> {
        &self.data
    }

    /// Mutable access to the underlying runtime array.
    ///
    /// Element writes are fine; shape mutations through this reference
    /// would break the group bookkeeping and are the caller's
    /// responsibility to avoid.
    pub fn array_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.data
    }

    /// Consume the tensor and return the underlying runtime array.
    pub fn into_array(self) -> ArrayD<T> {
        self.data
    }

    /// Rewrap an array that has the same dynamic and intermediate groups as
    /// `self` (the base group may differ).
    pub(crate) fn retag(&self, data: ArrayD<T>) -> Tensor<T> {
        debug_assert!(
            data.shape()[..self.dynamic_dim()] == self.data.shape()[..self.dynamic_dim()]
                && self.dynamic_dim() + self.intmd_dim <= data.ndim(),
            "retag: handle is inconsistent with the recorded groups"
        );
        Tensor {
            data,
            dynamic_sizes: self.dynamic_sizes.clone(),
            intmd_dim: self.intmd_dim,
        }
    }

    /// Debug-build consistency check of the group bookkeeping.
    #[inline]
    pub(crate) fn check_invariants(&self) {
        debug_assert!(
            self.dynamic_sizes.len() + self.intmd_dim <= self.data.ndim(),
            "group boundaries exceed tensor rank"
        );
        debug_assert!(
            self.dynamic_sizes.concrete().as_slice()
                == &self.data.shape()[..self.dynamic_sizes.len()],
            "dynamic shape out of sync with the handle"
        );
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.dynamic_sizes.len();
        f.debug_struct("Tensor")
            .field("dynamic", &&self.data.shape()[..d])
            .field("intmd", &&self.data.shape()[d..d + self.intmd_dim])
            .field("base", &&self.data.shape()[d + self.intmd_dim..])
            .field("data", &self.data)
            .finish()
    }
}

impl<T: Clone + Num + PartialEq> PartialEq for Tensor<T> {
    /// Elementwise equality of the storage plus equality of the group
    /// boundaries (symbolic tags are ignored).
    fn eq(&self, other: &Self) -> bool {
        self.dynamic_sizes == other.dynamic_sizes
            && self.intmd_dim == other.intmd_dim
            && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn from_parts_validates_dynamic_shape() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        assert!(Tensor::from_parts(data.clone(), DynShape::from_concrete(&[2]), 1).is_ok());
        assert!(Tensor::from_parts(data.clone(), DynShape::from_concrete(&[3]), 1).is_err());
        assert!(Tensor::from_parts(data, DynShape::from_concrete(&[2, 3]), 2).is_err());
    }

    #[test]
    fn from_handle_reads_dynamic_shape() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        let t = Tensor::from_handle(data, 1, 1).unwrap();
        assert_eq!(t.dynamic_sizes().concrete().as_slice(), &[2]);
        assert_eq!(t.intmd_sizes(), &[3]);
        assert_eq!(t.base_sizes(), &[4]);
    }

    #[test]
    fn from_handle_with_base_infers_intermediate() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4, 4]));
        let t = Tensor::from_handle_with_base(data.clone(), 1, &[4, 4]).unwrap();
        assert_eq!(t.intmd_sizes(), &[3]);

        assert!(Tensor::from_handle_with_base(data.clone(), 1, &[5, 4]).is_err());
        assert!(Tensor::from_handle_with_base(data, 3, &[4, 4]).is_err());
    }

    #[test]
    fn equality_ignores_symbols() {
        use crate::shape::{DynSize, DynShape};
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        let a = Tensor::from_parts(data.clone(), DynShape::from_concrete(&[2]), 0).unwrap();
        let b = Tensor::from_parts(
            data,
            DynShape::from_sizes([DynSize::traced(2, 42)]),
            0,
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
