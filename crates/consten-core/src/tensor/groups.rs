//! Per-group size and dimension accessors
//!
//! All accessors are O(1) apart from the ones that materialize a
//! [`Shape`], which are O(rank).

use super::Tensor;
use crate::error::Result;
use crate::shape::{self, DynShape, DynSize, Shape};
use num_traits::Num;

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Total number of axes.
    pub fn dim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of dynamic axes.
    pub fn dynamic_dim(&self) -> usize {
        self.dynamic_sizes.len()
    }

    /// Number of intermediate axes.
    pub fn intmd_dim(&self) -> usize {
        self.intmd_dim
    }

    /// Number of base axes.
    pub fn base_dim(&self) -> usize {
        self.data.ndim() - self.batch_dim()
    }

    /// Number of batch (dynamic + intermediate) axes.
    pub fn batch_dim(&self) -> usize {
        self.dynamic_dim() + self.intmd_dim
    }

    /// Number of static (intermediate + base) axes.
    pub fn static_dim(&self) -> usize {
        self.data.ndim() - self.dynamic_dim()
    }

    /// Whether the tensor has any batch axes.
    pub fn batched(&self) -> bool {
        self.batch_dim() > 0
    }

    /// All sizes.
    pub fn sizes(&self) -> &[usize] {
        self.data.shape()
    }

    /// The dynamic shape, with symbolic tags.
    pub fn dynamic_sizes(&self) -> &DynShape {
        &self.dynamic_sizes
    }

    /// The concrete sizes of the dynamic group.
    pub fn dynamic_sizes_concrete(&self) -> &[usize] {
        &self.data.shape()[..self.dynamic_dim()]
    }

    /// The sizes of the intermediate group.
    pub fn intmd_sizes(&self) -> &[usize] {
        let d = self.dynamic_dim();
        &self.data.shape()[d..d + self.intmd_dim]
    }

    /// The sizes of the base group.
    pub fn base_sizes(&self) -> &[usize] {
        &self.data.shape()[self.batch_dim()..]
    }

    /// The concrete sizes of the batch (dynamic + intermediate) group.
    pub fn batch_sizes(&self) -> &[usize] {
        &self.data.shape()[..self.batch_dim()]
    }

    /// The sizes of the static (intermediate + base) group.
    pub fn static_sizes(&self) -> &[usize] {
        &self.data.shape()[self.dynamic_dim()..]
    }

    /// The size of one dynamic axis; negative indices count back.
    pub fn dynamic_size(&self, index: isize) -> Result<DynSize> {
        let i = shape::normalize_axis(index, 0, self.dynamic_dim())?;
        Ok(self.dynamic_sizes.size(i))
    }

    /// The size of one intermediate axis; negative indices count back.
    pub fn intmd_size(&self, index: isize) -> Result<usize> {
        let i = shape::normalize_axis(index, 0, self.intmd_dim)?;
        Ok(self.intmd_sizes()[i])
    }

    /// The size of one base axis; negative indices count back.
    pub fn base_size(&self, index: isize) -> Result<usize> {
        let i = shape::normalize_axis(index, 0, self.base_dim())?;
        Ok(self.base_sizes()[i])
    }

    /// Storage needed for the base group alone.
    pub fn base_storage(&self) -> usize {
        shape::storage_size(self.base_sizes())
    }

    /// Storage needed for the intermediate group alone.
    pub fn intmd_storage(&self) -> usize {
        shape::storage_size(self.intmd_sizes())
    }

    /// Storage needed for the dynamic group alone.
    pub fn dynamic_storage(&self) -> usize {
        shape::storage_size(self.dynamic_sizes_concrete())
    }

    /// The base shape as an owned [`Shape`].
    pub fn base_shape(&self) -> Shape {
        Shape::from_slice(self.base_sizes())
    }

    /// The intermediate shape as an owned [`Shape`].
    pub fn intmd_shape(&self) -> Shape {
        Shape::from_slice(self.intmd_sizes())
    }
}

/// The broadcast dynamic shape across tensors, skipping `None` entries.
///
/// Used by block assembly, where undefined blocks do not constrain the
/// batch shape. Returns the empty shape when nothing is defined.
pub fn broadcast_dynamic_sizes<T: Clone + Num>(
    tensors: &[Option<Tensor<T>>],
) -> Result<DynShape> {
    let shapes: Vec<&DynShape> = tensors
        .iter()
        .flatten()
        .map(|t| t.dynamic_sizes())
        .collect();
    if shapes.is_empty() {
        return Ok(DynShape::empty());
    }
    shape::broadcast_dyn_shapes(&shapes)
}

/// The broadcast intermediate shape across tensors, skipping `None`
/// entries.
pub fn broadcast_intmd_sizes<T: Clone + Num>(tensors: &[Option<Tensor<T>>]) -> Result<Shape> {
    let shapes: Vec<&[usize]> = tensors.iter().flatten().map(|t| t.intmd_sizes()).collect();
    if shapes.is_empty() {
        return Ok(Shape::new());
    }
    shape::broadcast_shapes(&shapes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_accessors() {
        let t = Tensor::<f64>::zeros([3, 4].into(), &[2], &[3, 3]);
        assert_eq!(t.dim(), 5);
        assert_eq!(t.dynamic_dim(), 2);
        assert_eq!(t.intmd_dim(), 1);
        assert_eq!(t.base_dim(), 2);
        assert_eq!(t.batch_dim(), 3);
        assert_eq!(t.static_dim(), 3);
        assert_eq!(t.batch_sizes(), &[3, 4, 2]);
        assert_eq!(t.static_sizes(), &[2, 3, 3]);
        assert_eq!(t.base_storage(), 9);
        assert_eq!(t.intmd_storage(), 2);
        assert_eq!(t.dynamic_storage(), 12);
        assert!(t.batched());
    }

    #[test]
    fn per_axis_sizes_support_negative_indices() {
        let t = Tensor::<f64>::zeros([3, 4].into(), &[2, 5], &[3, 3]);
        assert_eq!(t.dynamic_size(-1).unwrap().value, 4);
        assert_eq!(t.intmd_size(-2).unwrap(), 2);
        assert_eq!(t.base_size(0).unwrap(), 3);
        assert!(t.base_size(2).is_err());
    }

    #[test]
    fn broadcast_sizes_skip_undefined() {
        let a = Tensor::<f64>::zeros([2, 1].into(), &[3], &[4]);
        let b = Tensor::<f64>::zeros([5].into(), &[1], &[4]);
        let blocks = vec![Some(a), None, Some(b)];
        let d = broadcast_dynamic_sizes(&blocks).unwrap();
        assert_eq!(d.concrete().as_slice(), &[2, 5]);
        let i = broadcast_intmd_sizes(&blocks).unwrap();
        assert_eq!(i.as_slice(), &[3]);
    }
}
