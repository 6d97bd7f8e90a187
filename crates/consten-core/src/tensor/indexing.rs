//! Heterogeneous group indexing
//!
//! Read-side indexing accepts a mixed list of [`Index`] elements applied to
//! a single group; the other two groups are always kept whole. Write-side
//! counterparts assign a (broadcastable) tensor or a scalar into the
//! selected region in place.

use super::Tensor;
use crate::error::{Result, TensorError};
use crate::index::{expand_indices, Index};
use crate::shape::{DynShape, DynSize, Shape};
use ndarray::SliceInfoElem;
use num_traits::Num;

fn full_slice() -> SliceInfoElem {
    SliceInfoElem::Slice {
        start: 0,
        end: None,
        step: 1,
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Build the whole-tensor slice element list for an index list applied
    /// to the group spanning `[g0, g1)`.
    fn slice_elems(
        &self,
        indices: &[Index],
        g0: usize,
        g1: usize,
    ) -> Result<(Vec<SliceInfoElem>, isize)> {
        let (group_elems, delta) = expand_indices(indices, &self.data.shape()[g0..g1])?;
        let mut elems = Vec::with_capacity(self.dim() + indices.len());
        elems.extend(std::iter::repeat_with(full_slice).take(g0));
        elems.extend(group_elems);
        elems.extend(std::iter::repeat_with(full_slice).take(self.dim() - g1));
        Ok((elems, delta))
    }

    /// Index the base group. Integer entries collapse an axis, ranges
    /// preserve it, `NewAxis` inserts one, and the ellipsis keeps the
    /// remaining base axes whole.
    ///
    /// ```
    /// use consten_core::tensor::Tensor;
    /// use consten_core::index::Index;
    ///
    /// let t = Tensor::<f64>::zeros([3, 4].into(), &[2], &[3, 3]);
    /// let row = t.base_index(&[Index::At(0)]).unwrap();
    /// assert_eq!(row.dynamic_sizes().concrete().as_slice(), &[3, 4]);
    /// assert_eq!(row.intmd_sizes(), &[2]);
    /// assert_eq!(row.base_sizes(), &[3]);
    /// ```
    pub fn base_index(&self, indices: &[Index]) -> Result<Self> {
        let (elems, _) = self.slice_elems(indices, self.batch_dim(), self.dim())?;
        let data = self.data.slice(&elems[..]).to_owned();
        Ok(self.retag(data))
    }

    /// Index the intermediate group.
    pub fn intmd_index(&self, indices: &[Index]) -> Result<Self> {
        let d = self.dynamic_dim();
        let (elems, delta) = self.slice_elems(indices, d, d + self.intmd_dim)?;
        let data = self.data.slice(&elems[..]).to_owned();
        Ok(Tensor {
            data,
            dynamic_sizes: self.dynamic_sizes.clone(),
            intmd_dim: (self.intmd_dim as isize + delta) as usize,
        })
    }

    /// Index the dynamic group.
    ///
    /// Symbolic size tags survive on axes kept whole; sliced or inserted
    /// axes come out untagged.
    pub fn dynamic_index(&self, indices: &[Index]) -> Result<Self> {
        let (elems, _) = self.slice_elems(indices, 0, self.dynamic_dim())?;
        let data = self.data.slice(&elems[..]).to_owned();

        // Rebuild the dynamic shape alongside the slice elements.
        let mut sizes: Vec<DynSize> = Vec::new();
        let mut src_axis = 0usize;
        for elem in &elems[..elems.len() - (self.dim() - self.dynamic_dim())] {
            match elem {
                SliceInfoElem::Index(_) => {
                    src_axis += 1;
                }
                SliceInfoElem::Slice { start, end, step } => {
                    let old = self.dynamic_sizes.size(src_axis);
                    let kept_whole =
                        *start == 0 && *step == 1 && end.map_or(true, |e| e == old.value as isize);
                    let new_len = data.shape()[sizes.len()];
                    sizes.push(if kept_whole {
                        old
                    } else {
                        DynSize::concrete(new_len)
                    });
                    src_axis += 1;
                }
                SliceInfoElem::NewAxis => {
                    sizes.push(DynSize::concrete(1));
                }
            }
        }
        Tensor::from_parts(data, DynShape::from_sizes(sizes), self.intmd_dim)
    }

    fn put_impl(&mut self, indices: &[Index], g0: usize, g1: usize, value: &Self) -> Result<()> {
        if indices.iter().any(|i| matches!(i, Index::NewAxis)) {
            return Err(TensorError::Shape {
                shape: Shape::new(),
                reason: "new-axis markers are not allowed in indexed writes".into(),
            });
        }
        let (elems, _) = self.slice_elems(indices, g0, g1)?;
        let mut region = self.data.slice_mut(&elems[..]);
        if !crate::shape::expandable_to(value.sizes(), region.shape()) {
            return Err(TensorError::mismatch(
                "index_put",
                Shape::from_slice(region.shape()),
                Shape::from_slice(value.sizes()),
                "value is not broadcastable to the indexed region",
            ));
        }
        region.assign(&value.data);
        Ok(())
    }

    fn fill_impl(&mut self, indices: &[Index], g0: usize, g1: usize, value: T) -> Result<()> {
        if indices.iter().any(|i| matches!(i, Index::NewAxis)) {
            return Err(TensorError::Shape {
                shape: Shape::new(),
                reason: "new-axis markers are not allowed in indexed writes".into(),
            });
        }
        let (elems, _) = self.slice_elems(indices, g0, g1)?;
        self.data
            .slice_mut(&elems[..])
            .mapv_inplace(|_| value.clone());
        Ok(())
    }

    /// Write `value` into the region selected on the base group.
    pub fn base_index_put(&mut self, indices: &[Index], value: &Self) -> Result<()> {
        self.put_impl(indices, self.batch_dim(), self.dim(), value)
    }

    /// Write `value` into the region selected on the intermediate group.
    pub fn intmd_index_put(&mut self, indices: &[Index], value: &Self) -> Result<()> {
        let d = self.dynamic_dim();
        self.put_impl(indices, d, d + self.intmd_dim, value)
    }

    /// Write `value` into the region selected on the dynamic group.
    pub fn dynamic_index_put(&mut self, indices: &[Index], value: &Self) -> Result<()> {
        self.put_impl(indices, 0, self.dynamic_dim(), value)
    }

    /// Fill the region selected on the base group with a scalar.
    pub fn base_index_fill(&mut self, indices: &[Index], value: T) -> Result<()> {
        self.fill_impl(indices, self.batch_dim(), self.dim(), value)
    }

    /// Fill the region selected on the intermediate group with a scalar.
    pub fn intmd_index_fill(&mut self, indices: &[Index], value: T) -> Result<()> {
        let d = self.dynamic_dim();
        self.fill_impl(indices, d, d + self.intmd_dim, value)
    }

    /// Fill the region selected on the dynamic group with a scalar.
    pub fn dynamic_index_fill(&mut self, indices: &[Index], value: T) -> Result<()> {
        self.fill_impl(indices, 0, self.dynamic_dim(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn seq(dynamic: &[usize], intmd: &[usize], base: &[usize]) -> Tensor<f64> {
        let n: usize = dynamic.iter().chain(intmd).chain(base).product();
        Tensor::from_vec(
            (0..n).map(|i| i as f64).collect(),
            DynShape::from_concrete(dynamic),
            intmd,
            base,
        )
        .unwrap()
    }

    #[test]
    fn base_integer_index_collapses_one_axis() {
        // (3,4 ; 2 ; 3,3) indexed with base[0] -> (3,4 ; 2 ; 3)
        let t = Tensor::<f64>::zeros([3, 4].into(), &[2], &[3, 3]);
        let s = t.base_index(&[Index::At(0)]).unwrap();
        assert_eq!(s.dynamic_sizes().concrete().as_slice(), &[3, 4]);
        assert_eq!(s.intmd_sizes(), &[2]);
        assert_eq!(s.base_sizes(), &[3]);
    }

    #[test]
    fn group_independence_of_indexing() {
        let t = seq(&[2], &[3], &[4]);
        let a = t.intmd_index(&[Index::range(1, 3)]).unwrap();
        assert_eq!(a.dynamic_sizes_concrete(), &[2]);
        assert_eq!(a.intmd_sizes(), &[2]);
        assert_eq!(a.base_sizes(), &[4]);
        // dynamic and base contents untouched
        assert_eq!(a.array()[IxDyn(&[0, 0, 0])], t.array()[IxDyn(&[0, 1, 0])]);
        assert_eq!(a.array()[IxDyn(&[1, 1, 3])], t.array()[IxDyn(&[1, 2, 3])]);
    }

    #[test]
    fn ellipsis_and_new_axis() {
        let t = seq(&[], &[], &[2, 3, 4]);
        let s = t
            .base_index(&[Index::Ellipsis, Index::At(0), Index::NewAxis])
            .unwrap();
        assert_eq!(s.base_sizes(), &[2, 3, 1]);
    }

    #[test]
    fn strided_and_negative_slices() {
        let t = seq(&[], &[], &[6]);
        let s = t.base_index(&[Index::range_step(0, 6, 2)]).unwrap();
        assert_eq!(s.base_sizes(), &[3]);
        assert_eq!(s.array()[IxDyn(&[1])], 2.0);

        let r = t
            .base_index(&[Index::Slice {
                start: None,
                end: None,
                step: -1,
            }])
            .unwrap();
        assert_eq!(r.array()[IxDyn(&[0])], 5.0);
        assert_eq!(r.array()[IxDyn(&[5])], 0.0);
    }

    #[test]
    fn dynamic_index_updates_symbols() {
        use crate::shape::DynSize;
        let data = Tensor::<f64>::zeros([4, 3].into(), &[], &[2]).into_array();
        let t = Tensor::from_parts(
            data,
            DynShape::from_sizes([DynSize::traced(4, 9), DynSize::concrete(3)]),
            0,
        )
        .unwrap();
        let s = t.dynamic_index(&[Index::all(), Index::At(1)]).unwrap();
        assert_eq!(s.dynamic_sizes().concrete().as_slice(), &[4]);
        assert_eq!(s.dynamic_sizes().size(0).symbol, Some(9));

        let s = t.dynamic_index(&[Index::range(0, 2)]).unwrap();
        assert_eq!(s.dynamic_sizes().size(0).symbol, None);
        assert_eq!(s.dynamic_sizes().size(1).symbol, None);
    }

    #[test]
    fn index_put_writes_in_place() {
        let mut t = Tensor::<f64>::zeros([2].into(), &[], &[3]);
        let v = Tensor::<f64>::ones([2].into(), &[], &[]);
        t.base_index_put(&[Index::At(1)], &v).unwrap();
        assert_eq!(t.array()[IxDyn(&[0, 1])], 1.0);
        assert_eq!(t.array()[IxDyn(&[0, 0])], 0.0);
        assert_eq!(t.array()[IxDyn(&[1, 1])], 1.0);
    }

    #[test]
    fn index_fill_with_scalar() {
        let mut t = Tensor::<f64>::zeros([].into(), &[], &[4]);
        t.base_index_fill(&[Index::range(1, 3)], 7.0).unwrap();
        assert_eq!(t.array()[IxDyn(&[0])], 0.0);
        assert_eq!(t.array()[IxDyn(&[1])], 7.0);
        assert_eq!(t.array()[IxDyn(&[2])], 7.0);
        assert_eq!(t.array()[IxDyn(&[3])], 0.0);
    }

    #[test]
    fn put_rejects_new_axis_and_bad_shapes() {
        let mut t = Tensor::<f64>::zeros([].into(), &[], &[4]);
        let v = Tensor::<f64>::ones([].into(), &[], &[3]);
        assert!(t.base_index_put(&[Index::NewAxis], &v).is_err());
        assert!(t.base_index_put(&[Index::range(0, 2)], &v).is_err());
    }
}
