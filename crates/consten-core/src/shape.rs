//! Shape descriptors and pure shape algebra
//!
//! Shapes are ordered sequences of non-negative sizes. A size of 0 means the
//! tensor is empty along that axis; the empty shape denotes a scalar with
//! storage size 1. The functions in this module are pure and stateless: they
//! implement the trailing-aligned broadcasting rule, storage-size
//! computation, padding, and axis normalization used by every other module.
//!
//! Dynamic (runtime batch) shapes may additionally be *traceable*: each
//! entry can carry an opaque symbolic identifier attached by an outer
//! tracing harness. See [`DynSize`] and [`DynShape`]. Intermediate and base
//! shapes are always concrete.

use crate::error::{Result, TensorError};
use smallvec::SmallVec;

/// Concrete shape type.
///
/// Uses `SmallVec` to avoid heap allocation for tensors of up to 6 axes,
/// which covers the common case of a few dynamic axes plus a rank-2 base.
pub type Shape = SmallVec<[usize; 6]>;

/// Opaque identifier for a symbolic (traced) dynamic size.
pub type SymbolId = u64;

/// Number of elements implied by a shape.
///
/// The empty shape has storage size 1 (a scalar); any zero-size axis yields
/// a storage size of 0.
///
/// ```
/// use consten_core::shape::storage_size;
///
/// assert_eq!(storage_size(&[]), 1);
/// assert_eq!(storage_size(&[0]), 0);
/// assert_eq!(storage_size(&[1, 2, 3]), 6);
/// assert_eq!(storage_size(&[5, 1, 1]), 5);
/// ```
pub fn storage_size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Left-pad `shape` to `target_rank` axes by prepending `fill`.
///
/// Returns the shape unchanged when it already has at least `target_rank`
/// axes.
pub fn pad_prepend(shape: &[usize], target_rank: usize, fill: usize) -> Shape {
    let mut out = Shape::new();
    if shape.len() < target_rank {
        out.extend(std::iter::repeat(fill).take(target_rank - shape.len()));
    }
    out.extend_from_slice(shape);
    out
}

/// Concatenate shapes into one.
pub fn concat_shapes(shapes: &[&[usize]]) -> Shape {
    let mut out = Shape::new();
    for s in shapes {
        out.extend_from_slice(s);
    }
    out
}

/// Test whether shapes are broadcastable.
///
/// Shapes are broadcastable if, starting from the trailing axis and
/// iterating backward, the sizes at every position either are equal, one of
/// them is 1, or one of them does not exist.
///
/// A size of 0 outside the explicit size-1 broadcast marker is a contract
/// violation; it is checked in debug builds and otherwise treated as an
/// ordinary (non-matching) size.
pub fn broadcastable(shapes: &[&[usize]]) -> bool {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    for i in 0..rank {
        let mut max_sz = 1usize;
        for s in shapes {
            if s.len() + i < rank {
                continue;
            }
            let sz = s[s.len() + i - rank];
            if max_sz == 1 {
                debug_assert!(sz > 0, "found a zero size during broadcast check");
                if sz > 1 {
                    max_sz = sz;
                }
            } else if sz != 1 && sz != max_sz {
                return false;
            }
        }
    }
    true
}

/// The broadcast shape of all the given shapes.
///
/// Computes the elementwise maximum after right-padding every shape with 1s
/// to the common rank. Fails with [`TensorError::ShapeMismatch`] when the
/// shapes are not broadcastable, and with [`TensorError::Shape`] when a
/// zero size participates in the broadcast.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Shape> {
    for s in shapes {
        if s.contains(&0) {
            return Err(TensorError::Shape {
                shape: Shape::from_slice(s),
                reason: "zero-size axes cannot participate in broadcasting".into(),
            });
        }
    }
    if !broadcastable(shapes) {
        let longest = shapes
            .iter()
            .max_by_key(|s| s.len())
            .copied()
            .unwrap_or(&[]);
        let shortest = shapes
            .iter()
            .min_by_key(|s| s.len())
            .copied()
            .unwrap_or(&[]);
        return Err(TensorError::mismatch(
            "broadcast_shapes",
            Shape::from_slice(longest),
            Shape::from_slice(shortest),
            "shapes are not broadcastable",
        ));
    }

    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out: Shape = SmallVec::from_elem(1, rank);
    for s in shapes {
        let padded = pad_prepend(s, rank, 1);
        for (o, &p) in out.iter_mut().zip(padded.iter()) {
            if p > *o {
                *o = p;
            }
        }
    }
    Ok(out)
}

/// Test whether `src` can be broadcast-expanded to exactly `dst`.
///
/// This is the one-sided variant of [`broadcastable`]: `src` must have rank
/// at most `dst`'s, and every trailing-aligned size must equal the target
/// or be 1.
pub fn expandable_to(src: &[usize], dst: &[usize]) -> bool {
    if src.len() > dst.len() {
        return false;
    }
    let off = dst.len() - src.len();
    src.iter()
        .zip(dst[off..].iter())
        .all(|(&s, &d)| s == d || s == 1)
}

/// Normalize a possibly-negative axis index into `[lo, hi)`.
///
/// Negative indices count back from `hi`, so `-1` maps to `hi - 1`. Fails
/// with [`TensorError::OutOfBounds`] when the normalized index falls
/// outside the range.
pub fn normalize_axis(axis: isize, lo: usize, hi: usize) -> Result<usize> {
    let n = if axis < 0 { axis + hi as isize } else { axis + lo as isize };
    if n < lo as isize || n >= hi as isize {
        return Err(TensorError::out_of_bounds("axis", axis, hi - lo));
    }
    Ok(n as usize)
}

/// Normalize a possibly-negative insertion position into `[lo, hi]`.
///
/// Like [`normalize_axis`] but with an inclusive upper bound, used for
/// operations (unsqueeze, insertion) that may target the one-past-the-end
/// position; `-1` maps to `hi`.
pub fn normalize_insert_axis(axis: isize, lo: usize, hi: usize) -> Result<usize> {
    let n = if axis < 0 {
        axis + hi as isize + 1
    } else {
        axis + lo as isize
    };
    if n < lo as isize || n > hi as isize {
        return Err(TensorError::out_of_bounds("axis", axis, hi - lo + 1));
    }
    Ok(n as usize)
}

/// A dynamic-group size: a concrete value, optionally tagged with the
/// symbolic identifier an outer tracing harness assigned to it.
///
/// Equality and ordering consider only the concrete value; the symbol is
/// metadata that survives shape arithmetic where possible (when two equal
/// sizes merge, the symbolic one wins) and is dropped otherwise. This layer
/// never invents symbols.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynSize {
    /// Concrete extent of the axis
    pub value: usize,
    /// Symbolic identifier, if this size is traced
    pub symbol: Option<SymbolId>,
}

impl DynSize {
    /// A concrete, untraced size.
    pub fn concrete(value: usize) -> Self {
        DynSize {
            value,
            symbol: None,
        }
    }

    /// A size carrying a symbolic identifier.
    pub fn traced(value: usize, symbol: SymbolId) -> Self {
        DynSize {
            value,
            symbol: Some(symbol),
        }
    }

    /// Whether this size carries a symbolic identifier.
    pub fn is_traced(&self) -> bool {
        self.symbol.is_some()
    }

    /// Merge two sizes of equal value, preferring the traced one.
    fn merge(self, other: DynSize) -> DynSize {
        if self.symbol.is_some() {
            self
        } else {
            other
        }
    }
}

impl PartialEq for DynSize {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for DynSize {}

impl From<usize> for DynSize {
    fn from(value: usize) -> Self {
        DynSize::concrete(value)
    }
}

/// Shape of the dynamic (runtime batch) group.
///
/// Behaves like a concrete shape for all size arithmetic, while carrying the
/// per-entry symbols of [`DynSize`] through padding and broadcasting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynShape(SmallVec<[DynSize; 6]>);

impl DynShape {
    /// The empty (unbatched) dynamic shape.
    pub fn empty() -> Self {
        DynShape(SmallVec::new())
    }

    /// Build from concrete sizes.
    pub fn from_concrete(sizes: &[usize]) -> Self {
        DynShape(sizes.iter().map(|&s| DynSize::concrete(s)).collect())
    }

    /// Build from dynamic sizes.
    pub fn from_sizes(sizes: impl IntoIterator<Item = DynSize>) -> Self {
        DynShape(sizes.into_iter().collect())
    }

    /// Number of dynamic axes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no dynamic axes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The concrete sizes.
    pub fn concrete(&self) -> Shape {
        self.0.iter().map(|s| s.value).collect()
    }

    /// The size of one dynamic axis.
    pub fn size(&self, i: usize) -> DynSize {
        self.0[i]
    }

    /// Iterate over the sizes.
    pub fn iter(&self) -> impl Iterator<Item = &DynSize> {
        self.0.iter()
    }

    /// Append a size.
    pub fn push(&mut self, size: DynSize) {
        self.0.push(size);
    }

    /// Insert a size at `index`.
    pub fn insert(&mut self, index: usize, size: DynSize) {
        self.0.insert(index, size);
    }

    /// Remove and return the size at `index`.
    pub fn remove(&mut self, index: usize) -> DynSize {
        self.0.remove(index)
    }

    /// Left-pad to `target_rank` axes with untraced 1s.
    pub fn pad_prepend(&self, target_rank: usize) -> DynShape {
        let mut out = SmallVec::new();
        if self.len() < target_rank {
            out.extend(std::iter::repeat(DynSize::concrete(1)).take(target_rank - self.len()));
        }
        out.extend_from_slice(&self.0);
        DynShape(out)
    }
}

impl From<&[usize]> for DynShape {
    fn from(sizes: &[usize]) -> Self {
        DynShape::from_concrete(sizes)
    }
}

impl<const N: usize> From<[usize; N]> for DynShape {
    fn from(sizes: [usize; N]) -> Self {
        DynShape::from_concrete(&sizes)
    }
}

impl std::ops::Index<usize> for DynShape {
    type Output = DynSize;

    fn index(&self, i: usize) -> &DynSize {
        &self.0[i]
    }
}

/// The broadcast shape of dynamic shapes, carrying symbols through.
///
/// For each trailing-aligned position the non-1 sizes must agree; the
/// resulting entry keeps a symbol if any contributing size of the winning
/// value carried one.
pub fn broadcast_dyn_shapes(shapes: &[&DynShape]) -> Result<DynShape> {
    let concrete: Vec<Shape> = shapes.iter().map(|s| s.concrete()).collect();
    let refs: Vec<&[usize]> = concrete.iter().map(|s| s.as_slice()).collect();
    let target = broadcast_shapes(&refs)?;

    let rank = target.len();
    let mut out: SmallVec<[DynSize; 6]> = target.iter().map(|&v| DynSize::concrete(v)).collect();
    for s in shapes {
        let padded = s.pad_prepend(rank);
        for (o, p) in out.iter_mut().zip(padded.iter()) {
            if p.value == o.value {
                *o = o.merge(*p);
            }
        }
    }
    Ok(DynShape(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_size_conventions() {
        assert_eq!(storage_size(&[]), 1);
        assert_eq!(storage_size(&[0]), 0);
        assert_eq!(storage_size(&[1]), 1);
        assert_eq!(storage_size(&[1, 2, 3]), 6);
        assert_eq!(storage_size(&[5, 1, 1]), 5);
    }

    #[test]
    fn pad_prepend_fills_on_the_left() {
        assert_eq!(pad_prepend(&[2, 3], 4, 1).as_slice(), &[1, 1, 2, 3]);
        assert_eq!(pad_prepend(&[2, 3], 2, 1).as_slice(), &[2, 3]);
        assert_eq!(pad_prepend(&[2, 3], 1, 1).as_slice(), &[2, 3]);
    }

    #[test]
    fn broadcastable_trailing_alignment() {
        assert!(broadcastable(&[&[], &[1, 2, 3], &[4, 1, 3]]));
        assert!(broadcastable(&[&[5, 1, 1], &[1, 2, 1], &[1, 1, 3]]));
        assert!(broadcastable(&[&[1, 2, 3], &[2, 3]]));
        assert!(!broadcastable(&[&[2, 3], &[3, 2]]));
        assert!(!broadcastable(&[&[1, 2], &[1, 2, 3]]));
    }

    #[test]
    fn broadcast_shapes_elementwise_max() {
        let b = broadcast_shapes(&[&[5, 1, 1], &[1, 2, 1], &[1, 1, 3]]).unwrap();
        assert_eq!(b.as_slice(), &[5, 2, 3]);
        let b = broadcast_shapes(&[&[], &[2, 3]]).unwrap();
        assert_eq!(b.as_slice(), &[2, 3]);
        assert!(broadcast_shapes(&[&[2, 3], &[3, 2]]).is_err());
    }

    #[test]
    fn broadcast_shapes_rejects_zero_sizes() {
        let err = broadcast_shapes(&[&[2, 0], &[2, 1]]).unwrap_err();
        assert!(matches!(err, TensorError::Shape { .. }));
    }

    #[test]
    fn broadcast_associativity() {
        let bc = broadcast_shapes(&[&[4, 1], &[1, 3]]).unwrap();
        let a_bc = broadcast_shapes(&[&[2, 1, 1], bc.as_slice()]).unwrap();
        let abc = broadcast_shapes(&[&[2, 1, 1], &[4, 1], &[1, 3]]).unwrap();
        assert_eq!(a_bc, abc);
    }

    #[test]
    fn broadcast_to_self_is_identity() {
        let s = [3, 4, 5];
        let b = broadcast_shapes(&[&s, &s]).unwrap();
        assert_eq!(b.as_slice(), &s);
    }

    #[test]
    fn expandable_to_is_one_sided() {
        assert!(expandable_to(&[1, 3], &[2, 3]));
        assert!(expandable_to(&[3], &[2, 3]));
        assert!(expandable_to(&[], &[2, 3]));
        assert!(!expandable_to(&[2, 3], &[3]));
        assert!(!expandable_to(&[2], &[2, 3]));
    }

    #[test]
    fn normalize_axis_ranges() {
        assert_eq!(normalize_axis(0, 0, 3).unwrap(), 0);
        assert_eq!(normalize_axis(1, 2, 5).unwrap(), 3);
        assert_eq!(normalize_axis(-1, 1, 4).unwrap(), 3);
        assert_eq!(normalize_axis(-3, 1, 4).unwrap(), 1);
        assert!(normalize_axis(-4, 1, 4).is_err());
        assert!(normalize_axis(5, 1, 4).is_err());
    }

    #[test]
    fn normalize_insert_axis_inclusive_bound() {
        assert_eq!(normalize_insert_axis(0, 0, 3).unwrap(), 0);
        assert_eq!(normalize_insert_axis(3, 2, 5).unwrap(), 5);
        assert_eq!(normalize_insert_axis(-1, 1, 4).unwrap(), 4);
        assert_eq!(normalize_insert_axis(-4, 1, 4).unwrap(), 1);
        assert!(normalize_insert_axis(-5, 1, 4).is_err());
        assert!(normalize_insert_axis(4, 1, 4).is_err());
    }

    #[test]
    fn dyn_shape_broadcast_keeps_symbols() {
        let a = DynShape::from_sizes([DynSize::traced(4, 7), DynSize::concrete(1)]);
        let b = DynShape::from_concrete(&[4, 3]);
        let out = broadcast_dyn_shapes(&[&a, &b]).unwrap();
        assert_eq!(out.concrete().as_slice(), &[4, 3]);
        assert_eq!(out.size(0).symbol, Some(7));
        assert_eq!(out.size(1).symbol, None);
    }

    #[test]
    fn dyn_shape_equality_ignores_symbols() {
        let a = DynShape::from_sizes([DynSize::traced(4, 1)]);
        let b = DynShape::from_concrete(&[4]);
        assert_eq!(a, b);
    }
}
