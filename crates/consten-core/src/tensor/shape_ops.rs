//! Group-restricted shape surgery
//!
//! Reshape, flatten, broadcast-expand, squeeze/unsqueeze, transpose,
//! movedim, reductions, diagonal embedding, and concatenation/splitting.
//! Every operation targets exactly one axis group and re-derives the group
//! bookkeeping; the other groups' axis positions are never altered.
//!
//! Results are owned tensors: where the runtime can reshape a view in
//! place it does, otherwise the data is copied in logical order (the same
//! contiguity contract the runtime itself exposes).

use super::Tensor;
use crate::error::{Result, TensorError};
use crate::shape::{self, DynShape, DynSize, Shape};
use ndarray::{concatenate, stack, ArrayD, Axis, IxDyn, Slice};
use num_traits::Num;

/// Reshape the raw storage, copying when the layout is not contiguous.
pub(crate) fn reshape_raw<T: Clone>(data: &ArrayD<T>, target: &[usize]) -> ArrayD<T> {
    if let Ok(reshaped) = data.view().into_shape_with_order(IxDyn(target)) {
        reshaped.to_owned()
    } else {
        let flat: Vec<T> = data.iter().cloned().collect();
        ArrayD::from_shape_vec(IxDyn(target), flat)
            .expect("storage size was checked by the caller")
    }
}

/// Re-materialize in row-major order if the strides are permuted.
pub(crate) fn to_standard<T: Clone>(data: ArrayD<T>) -> ArrayD<T> {
    if data.is_standard_layout() {
        data
    } else {
        let shape = data.shape().to_vec();
        let flat: Vec<T> = data.iter().cloned().collect();
        ArrayD::from_shape_vec(IxDyn(&shape), flat).expect("shape is taken from the array")
    }
}

/// Apply an axis permutation to the raw storage, re-materializing in
/// row-major order.
pub(crate) fn permute_raw<T: Clone>(data: &ArrayD<T>, perm: &[usize]) -> ArrayD<T> {
    to_standard(data.clone().permuted_axes(IxDyn(perm)))
}

/// Move one axis of the raw storage to a new position.
pub(crate) fn movedim_raw<T: Clone>(data: ArrayD<T>, src: usize, dst: usize) -> ArrayD<T> {
    let mut perm: Vec<usize> = (0..data.ndim()).collect();
    let ax = perm.remove(src);
    perm.insert(dst, ax);
    to_standard(data.permuted_axes(IxDyn(&perm)))
}

/// Embed the last axis diagonally: `(…, p)` becomes `(…, p, p)` with the
/// input on the diagonal and zeros elsewhere.
pub(crate) fn diag_embed_last<T: Clone + Num>(data: &ArrayD<T>) -> ArrayD<T> {
    let n = data.ndim();
    debug_assert!(n > 0, "diag_embed_last requires at least one axis");
    let p = data.shape()[n - 1];
    let mut shape = data.shape().to_vec();
    shape.push(p);
    let mut out = ArrayD::zeros(IxDyn(&shape));
    for i in 0..p {
        let src = data.index_axis(Axis(n - 1), i);
        let mut plane = out.index_axis_mut(Axis(n), i);
        plane.index_axis_mut(Axis(n - 1), i).assign(&src);
    }
    out
}

/// Which axis group an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Dynamic,
    Intmd,
    Base,
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    fn group_bounds(&self, group: Group) -> (usize, usize) {
        match group {
            Group::Dynamic => (0, self.dynamic_dim()),
            Group::Intmd => (self.dynamic_dim(), self.batch_dim()),
            Group::Base => (self.batch_dim(), self.dim()),
        }
    }

    // ---------------------------------------------------------------------
    // Reshape / flatten
    // ---------------------------------------------------------------------

    /// Replace the dynamic shape with a new shape of equal storage size.
    pub fn dynamic_reshape(&self, target: &DynShape) -> Result<Self> {
        let cur = self.dynamic_sizes_concrete();
        let tgt = target.concrete();
        if shape::storage_size(cur) != shape::storage_size(&tgt) {
            return Err(TensorError::mismatch(
                "dynamic_reshape",
                tgt,
                Shape::from_slice(cur),
                "storage size must be preserved",
            ));
        }
        let full = shape::concat_shapes(&[tgt.as_slice(), self.static_sizes()]);
        Ok(Tensor {
            data: reshape_raw(&self.data, &full),
            dynamic_sizes: target.clone(),
            intmd_dim: self.intmd_dim,
        })
    }

    /// Replace the intermediate shape with a new shape of equal storage
    /// size.
    pub fn intmd_reshape(&self, target: &[usize]) -> Result<Self> {
        if shape::storage_size(self.intmd_sizes()) != shape::storage_size(target) {
            return Err(TensorError::mismatch(
                "intmd_reshape",
                Shape::from_slice(target),
                Shape::from_slice(self.intmd_sizes()),
                "storage size must be preserved",
            ));
        }
        let full = shape::concat_shapes(&[
            self.dynamic_sizes_concrete(),
            target,
            self.base_sizes(),
        ]);
        Ok(Tensor {
            data: reshape_raw(&self.data, &full),
            dynamic_sizes: self.dynamic_sizes.clone(),
            intmd_dim: target.len(),
        })
    }

    /// Replace the base shape with a new shape of equal storage size.
    pub fn base_reshape(&self, target: &[usize]) -> Result<Self> {
        if shape::storage_size(self.base_sizes()) != shape::storage_size(target) {
            return Err(TensorError::mismatch(
                "base_reshape",
                Shape::from_slice(target),
                Shape::from_slice(self.base_sizes()),
                "storage size must be preserved",
            ));
        }
        let full = shape::concat_shapes(&[self.batch_sizes(), target]);
        Ok(self.retag(reshape_raw(&self.data, &full)))
    }

    /// Collapse the base group to a single axis, or to zero axes if the
    /// group was already empty (the storage-size-1 convention).
    pub fn base_flatten(&self) -> Self {
        if self.base_dim() == 0 {
            return self.clone();
        }
        self.base_reshape(&[self.base_storage()])
            .expect("flatten preserves storage size")
    }

    /// Collapse the intermediate group to a single axis, or to zero axes if
    /// the group was already empty.
    pub fn intmd_flatten(&self) -> Self {
        if self.intmd_dim == 0 {
            return self.clone();
        }
        self.intmd_reshape(&[self.intmd_storage()])
            .expect("flatten preserves storage size")
    }

    /// Collapse the intermediate axes `[start, intmd_dim)` into exactly one
    /// axis.
    ///
    /// Unlike [`intmd_flatten`](Self::intmd_flatten), the collapsed suffix
    /// always becomes one axis — of size 1 when the suffix is empty — so
    /// callers that go on to diagonalize it have an axis to work with.
    pub fn intmd_flatten_from(&self, start: usize) -> Result<Self> {
        if start > self.intmd_dim {
            return Err(TensorError::out_of_bounds(
                "intermediate axis",
                start as isize,
                self.intmd_dim,
            ));
        }
        let cur = self.intmd_sizes();
        let mut target = Shape::from_slice(&cur[..start]);
        target.push(shape::storage_size(&cur[start..]));
        self.intmd_reshape(&target)
    }

    // ---------------------------------------------------------------------
    // Broadcast-expand
    // ---------------------------------------------------------------------

    fn expand_group(&self, group: Group, target: &[usize]) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let cur = &self.data.shape()[g0..g1];
        if !shape::expandable_to(cur, target) {
            return Err(TensorError::mismatch(
                "expand",
                Shape::from_slice(target),
                Shape::from_slice(cur),
                "group shape is not expandable to the target",
            ));
        }

        // Align the group rank by inserting singleton axes at the front of
        // the group, then let the runtime broadcast.
        let mut data = self.data.clone();
        for _ in 0..target.len() - cur.len() {
            data = data.insert_axis(Axis(g0));
        }
        let mut full = Shape::from_slice(data.shape());
        full[g0..g0 + target.len()].copy_from_slice(target);
        let expanded = data
            .broadcast(IxDyn(&full))
            .expect("expandability was checked above")
            .to_owned();

        let (dynamic_sizes, intmd_dim) = match group {
            Group::Dynamic => {
                let padded = self.dynamic_sizes.pad_prepend(target.len());
                let ds = DynShape::from_sizes(padded.iter().zip(target.iter()).map(|(d, &t)| {
                    if d.value == t {
                        *d
                    } else {
                        DynSize::concrete(t)
                    }
                }));
                (ds, self.intmd_dim)
            }
            Group::Intmd => (self.dynamic_sizes.clone(), target.len()),
            Group::Base => (self.dynamic_sizes.clone(), self.intmd_dim),
        };
        Ok(Tensor {
            data: expanded,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Broadcast the dynamic group to `target`, carrying symbolic tags
    /// through for axes whose size is unchanged.
    pub fn dynamic_expand(&self, target: &DynShape) -> Result<Self> {
        let tgt = target.concrete();
        let mut out = self.expand_group(Group::Dynamic, &tgt)?;
        // Prefer the caller's symbolic tags where present.
        let merged = shape::broadcast_dyn_shapes(&[&out.dynamic_sizes, target])?;
        out.dynamic_sizes = merged;
        out.check_invariants();
        Ok(out)
    }

    /// Broadcast the intermediate group to `target`.
    pub fn intmd_expand(&self, target: &[usize]) -> Result<Self> {
        self.expand_group(Group::Intmd, target)
    }

    /// Broadcast the base group to `target`.
    pub fn base_expand(&self, target: &[usize]) -> Result<Self> {
        self.expand_group(Group::Base, target)
    }

    /// Broadcast the dynamic and intermediate groups together.
    pub fn batch_expand(&self, dynamic: &DynShape, intmd: &[usize]) -> Result<Self> {
        self.dynamic_expand(dynamic)?.intmd_expand(intmd)
    }

    /// Broadcast the dynamic group to another tensor's dynamic shape.
    pub fn dynamic_expand_as(&self, other: &Self) -> Result<Self> {
        self.dynamic_expand(other.dynamic_sizes())
    }

    /// Broadcast the intermediate group to another tensor's intermediate
    /// shape.
    pub fn intmd_expand_as(&self, other: &Self) -> Result<Self> {
        self.intmd_expand(other.intmd_sizes())
    }

    /// Broadcast the base group to another tensor's base shape.
    pub fn base_expand_as(&self, other: &Self) -> Result<Self> {
        self.base_expand(other.base_sizes())
    }

    // ---------------------------------------------------------------------
    // Squeeze / unsqueeze / transpose / movedim
    // ---------------------------------------------------------------------

    fn unsqueeze_group(&self, group: Group, d: isize, count: usize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let pos = shape::normalize_insert_axis(d, 0, g1 - g0)?;
        let mut data = self.data.clone();
        for _ in 0..count {
            data = data.insert_axis(Axis(g0 + pos));
        }
        let mut dynamic_sizes = self.dynamic_sizes.clone();
        let mut intmd_dim = self.intmd_dim;
        match group {
            Group::Dynamic => {
                for _ in 0..count {
                    dynamic_sizes.insert(pos, DynSize::concrete(1));
                }
            }
            Group::Intmd => intmd_dim += count,
            Group::Base => {}
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Insert a size-1 dynamic axis at `d`.
    pub fn dynamic_unsqueeze(&self, d: isize) -> Result<Self> {
        self.unsqueeze_group(Group::Dynamic, d, 1)
    }

    /// Insert a size-1 intermediate axis at `d`.
    pub fn intmd_unsqueeze(&self, d: isize) -> Result<Self> {
        self.unsqueeze_group(Group::Intmd, d, 1)
    }

    /// Insert `count` size-1 intermediate axes at `d`.
    pub fn intmd_unsqueeze_n(&self, d: isize, count: usize) -> Result<Self> {
        self.unsqueeze_group(Group::Intmd, d, count)
    }

    /// Insert a size-1 base axis at `d`.
    pub fn base_unsqueeze(&self, d: isize) -> Result<Self> {
        self.unsqueeze_group(Group::Base, d, 1)
    }

    fn squeeze_group(&self, group: Group, d: isize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let pos = shape::normalize_axis(d, 0, g1 - g0)?;
        let abs = g0 + pos;
        if self.data.shape()[abs] != 1 {
            return Err(TensorError::mismatch(
                "squeeze",
                Shape::from_slice(&[1]),
                Shape::from_slice(&[self.data.shape()[abs]]),
                "only size-1 axes can be squeezed",
            ));
        }
        let data = self.data.clone().index_axis_move(Axis(abs), 0);
        let mut dynamic_sizes = self.dynamic_sizes.clone();
        let mut intmd_dim = self.intmd_dim;
        match group {
            Group::Dynamic => {
                dynamic_sizes.remove(pos);
            }
            Group::Intmd => intmd_dim -= 1,
            Group::Base => {}
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Remove a size-1 dynamic axis.
    pub fn dynamic_squeeze(&self, d: isize) -> Result<Self> {
        self.squeeze_group(Group::Dynamic, d)
    }

    /// Remove a size-1 intermediate axis.
    pub fn intmd_squeeze(&self, d: isize) -> Result<Self> {
        self.squeeze_group(Group::Intmd, d)
    }

    /// Remove a size-1 base axis.
    pub fn base_squeeze(&self, d: isize) -> Result<Self> {
        self.squeeze_group(Group::Base, d)
    }

    fn transpose_group(&self, group: Group, d1: isize, d2: isize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let p1 = shape::normalize_axis(d1, 0, g1 - g0)?;
        let p2 = shape::normalize_axis(d2, 0, g1 - g0)?;
        let mut perm: Vec<usize> = (0..self.dim()).collect();
        perm.swap(g0 + p1, g0 + p2);
        let data = to_standard(self.data.clone().permuted_axes(IxDyn(&perm)));
        let mut dynamic_sizes = self.dynamic_sizes.clone();
        if group == Group::Dynamic {
            let a = dynamic_sizes.size(p1);
            let b = dynamic_sizes.size(p2);
            dynamic_sizes.remove(p1);
            dynamic_sizes.insert(p1, b);
            dynamic_sizes.remove(p2);
            dynamic_sizes.insert(p2, a);
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim: self.intmd_dim,
        })
    }

    /// Swap two dynamic axes.
    pub fn dynamic_transpose(&self, d1: isize, d2: isize) -> Result<Self> {
        self.transpose_group(Group::Dynamic, d1, d2)
    }

    /// Swap two intermediate axes.
    pub fn intmd_transpose(&self, d1: isize, d2: isize) -> Result<Self> {
        self.transpose_group(Group::Intmd, d1, d2)
    }

    /// Swap two base axes.
    pub fn base_transpose(&self, d1: isize, d2: isize) -> Result<Self> {
        self.transpose_group(Group::Base, d1, d2)
    }

    fn movedim_group(&self, group: Group, src: isize, dst: isize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let s = shape::normalize_axis(src, 0, g1 - g0)?;
        let t = shape::normalize_axis(dst, 0, g1 - g0)?;
        let data = movedim_raw(self.data.clone(), g0 + s, g0 + t);
        let mut dynamic_sizes = self.dynamic_sizes.clone();
        if group == Group::Dynamic {
            let moved = dynamic_sizes.remove(s);
            dynamic_sizes.insert(t, moved);
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim: self.intmd_dim,
        })
    }

    /// Move a dynamic axis to a new position within the group.
    pub fn dynamic_movedim(&self, src: isize, dst: isize) -> Result<Self> {
        self.movedim_group(Group::Dynamic, src, dst)
    }

    /// Move an intermediate axis to a new position within the group.
    pub fn intmd_movedim(&self, src: isize, dst: isize) -> Result<Self> {
        self.movedim_group(Group::Intmd, src, dst)
    }

    /// Move a base axis to a new position within the group.
    pub fn base_movedim(&self, src: isize, dst: isize) -> Result<Self> {
        self.movedim_group(Group::Base, src, dst)
    }

    // ---------------------------------------------------------------------
    // Reductions
    // ---------------------------------------------------------------------

    fn sum_group_axis(&self, group: Group, d: isize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let pos = shape::normalize_axis(d, 0, g1 - g0)?;
        let data = self.data.sum_axis(Axis(g0 + pos));
        let mut dynamic_sizes = self.dynamic_sizes.clone();
        let mut intmd_dim = self.intmd_dim;
        match group {
            Group::Dynamic => {
                dynamic_sizes.remove(pos);
            }
            Group::Intmd => intmd_dim -= 1,
            Group::Base => {}
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Sum over one dynamic axis, collapsing it.
    pub fn dynamic_sum(&self, d: isize) -> Result<Self> {
        self.sum_group_axis(Group::Dynamic, d)
    }

    /// Sum over one intermediate axis, collapsing it.
    pub fn intmd_sum(&self, d: isize) -> Result<Self> {
        self.sum_group_axis(Group::Intmd, d)
    }

    /// Sum over one base axis, collapsing it.
    pub fn base_sum(&self, d: isize) -> Result<Self> {
        self.sum_group_axis(Group::Base, d)
    }

    fn sum_to_group(&self, group: Group, target: &[usize]) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let cur: Shape = Shape::from_slice(&self.data.shape()[g0..g1]);
        if !shape::expandable_to(target, &cur) {
            return Err(TensorError::mismatch(
                "sum_to_shape",
                Shape::from_slice(target),
                cur,
                "target is not reachable by summing broadcast axes",
            ));
        }
        let padded = shape::pad_prepend(target, cur.len(), 1);
        let mut data = self.data.clone();
        for (i, (&p, &c)) in padded.iter().zip(cur.iter()).enumerate() {
            if p == 1 && c != 1 {
                data = data.sum_axis(Axis(g0 + i)).insert_axis(Axis(g0 + i));
            }
        }
        let kept = Tensor {
            data,
            dynamic_sizes: self.dynamic_sizes.clone(),
            intmd_dim: self.intmd_dim,
        };
        // Drop the leading padded 1s down to the target rank.
        match group {
            Group::Dynamic => kept.dynamic_reshape(&DynShape::from_concrete(target)),
            Group::Intmd => kept.intmd_reshape(target),
            Group::Base => kept.base_reshape(target),
        }
    }

    /// Sum the dynamic group down to a broadcast-compatible smaller shape
    /// (the adjoint of broadcast-expansion).
    pub fn dynamic_sum_to_shape(&self, target: &DynShape) -> Result<Self> {
        let mut out = self.sum_to_group(Group::Dynamic, &target.concrete())?;
        out.dynamic_sizes = target.clone();
        out.check_invariants();
        Ok(out)
    }

    /// Sum the intermediate group down to a broadcast-compatible smaller
    /// shape.
    pub fn intmd_sum_to_shape(&self, target: &[usize]) -> Result<Self> {
        self.sum_to_group(Group::Intmd, target)
    }

    /// Sum the base group down to a broadcast-compatible smaller shape.
    pub fn base_sum_to_shape(&self, target: &[usize]) -> Result<Self> {
        self.sum_to_group(Group::Base, target)
    }

    // ---------------------------------------------------------------------
    // Diagonal embedding
    // ---------------------------------------------------------------------

    fn diagonalize_group(&self, group: Group, d: isize) -> Result<Self> {
        let (g0, g1) = self.group_bounds(group);
        let pos = shape::normalize_axis(d, 0, g1 - g0)?;
        let abs = g0 + pos;
        let n = self.dim();

        let moved = movedim_raw(self.data.clone(), abs, n - 1);
        let diag = diag_embed_last(&moved);
        // Bring the (axis, axis') pair from the end back to (abs, abs + 1).
        let mut perm: Vec<usize> = (0..abs).collect();
        perm.extend([n - 1, n]);
        perm.extend(abs..n - 1);
        let data = to_standard(diag.permuted_axes(IxDyn(&perm)));

        let mut dynamic_sizes = self.dynamic_sizes.clone();
        let mut intmd_dim = self.intmd_dim;
        match group {
            Group::Dynamic => {
                let p = dynamic_sizes.size(pos);
                dynamic_sizes.insert(pos + 1, DynSize::concrete(p.value));
            }
            Group::Intmd => intmd_dim += 1,
            Group::Base => {}
        }
        Ok(Tensor {
            data,
            dynamic_sizes,
            intmd_dim,
        })
    }

    /// Diagonally embed one dynamic axis `p` into `(p, p)`.
    pub fn dynamic_diagonalize(&self, d: isize) -> Result<Self> {
        self.diagonalize_group(Group::Dynamic, d)
    }

    /// Diagonally embed one intermediate axis `p` into `(p, p)`.
    pub fn intmd_diagonalize(&self, d: isize) -> Result<Self> {
        self.diagonalize_group(Group::Intmd, d)
    }

    /// Diagonally embed one base axis `p` into `(p, p)`.
    pub fn base_diagonalize(&self, d: isize) -> Result<Self> {
        self.diagonalize_group(Group::Base, d)
    }

    // ---------------------------------------------------------------------
    // Split
    // ---------------------------------------------------------------------

    /// Split the tensor along a base axis into pieces of the given sizes.
    pub fn base_split(&self, sizes: &[usize], d: isize) -> Result<Vec<Self>> {
        let pos = shape::normalize_axis(d, 0, self.base_dim())?;
        let abs = self.batch_dim() + pos;
        let extent = self.data.shape()[abs];
        let total: usize = sizes.iter().sum();
        if total != extent {
            return Err(TensorError::mismatch(
                "base_split",
                Shape::from_slice(sizes),
                Shape::from_slice(&[extent]),
                "split sizes must sum to the axis extent",
            ));
        }
        let mut out = Vec::with_capacity(sizes.len());
        let mut off = 0usize;
        for &s in sizes {
            let piece = self
                .data
                .slice_axis(Axis(abs), Slice::new(off as isize, Some((off + s) as isize), 1))
                .to_owned();
            out.push(self.retag(piece));
            off += s;
        }
        Ok(out)
    }
}

/// Concatenate tensors along a base axis.
///
/// All operands must share identical dynamic and intermediate shapes
/// (callers broadcast first; see `HVector::assemble` in
/// `consten-assembly`).
pub fn base_cat<T: Clone + Num>(tensors: &[Tensor<T>], d: isize) -> Result<Tensor<T>> {
    let first = tensors.first().ok_or_else(|| TensorError::Shape {
        shape: Shape::new(),
        reason: "cannot concatenate an empty tensor list".into(),
    })?;
    for t in &tensors[1..] {
        if t.batch_sizes() != first.batch_sizes() || t.intmd_dim() != first.intmd_dim() {
            return Err(TensorError::mismatch(
                "base_cat",
                Shape::from_slice(first.batch_sizes()),
                Shape::from_slice(t.batch_sizes()),
                "operands must share dynamic and intermediate shapes",
            ));
        }
    }
    let pos = shape::normalize_axis(d, 0, first.base_dim())?;
    let abs = first.batch_dim() + pos;
    let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
    let data = concatenate(Axis(abs), &views).map_err(|e| {
        TensorError::mismatch(
            "base_cat",
            Shape::from_slice(first.base_sizes()),
            Shape::new(),
            e.to_string(),
        )
    })?;
    Ok(first.retag(data))
}

/// Stack tensors along a new base axis.
pub fn base_stack<T: Clone + Num>(tensors: &[Tensor<T>], d: isize) -> Result<Tensor<T>> {
    let first = tensors.first().ok_or_else(|| TensorError::Shape {
        shape: Shape::new(),
        reason: "cannot stack an empty tensor list".into(),
    })?;
    let pos = shape::normalize_insert_axis(d, 0, first.base_dim())?;
    let abs = first.batch_dim() + pos;
    let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
    let data = stack(Axis(abs), &views).map_err(|e| {
        TensorError::mismatch(
            "base_stack",
            Shape::from_slice(first.sizes()),
            Shape::new(),
            e.to_string(),
        )
    })?;
    Ok(first.retag(data))
}
