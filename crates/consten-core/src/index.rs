//! Heterogeneous index lists for group indexing
//!
//! An index list mixes integer indices, strided ranges, an ellipsis, and
//! new-axis markers, and is applied to exactly one of a tensor's three axis
//! groups (see [`Tensor`](crate::tensor::Tensor)). The ellipsis expands to
//! "all remaining axes of this group"; axes of the other groups are never
//! touched.

use crate::error::{Result, TensorError};
use ndarray::SliceInfoElem;

/// One element of a heterogeneous index list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Index {
    /// Select a single position along an axis, collapsing it. Negative
    /// values count back from the end.
    At(isize),
    /// Select a strided range along an axis, preserving it. `start`/`end`
    /// follow Python slice semantics (negative values count back from the
    /// end, out-of-range bounds are clamped); `step` must be non-zero and
    /// may be negative.
    Slice {
        start: Option<isize>,
        end: Option<isize>,
        step: isize,
    },
    /// Expand to full slices over all axes of the group not otherwise
    /// consumed. At most one ellipsis may appear in a list.
    Ellipsis,
    /// Insert a new axis of size 1, growing the group by one axis.
    NewAxis,
}

impl Index {
    /// The full slice `..`.
    pub fn all() -> Self {
        Index::Slice {
            start: None,
            end: None,
            step: 1,
        }
    }

    /// The slice `start..end` with unit step.
    pub fn range(start: isize, end: isize) -> Self {
        Index::Slice {
            start: Some(start),
            end: Some(end),
            step: 1,
        }
    }

    /// The slice `start..end` with the given step.
    pub fn range_step(start: isize, end: isize, step: isize) -> Self {
        Index::Slice {
            start: Some(start),
            end: Some(end),
            step,
        }
    }

    /// The slice `start..` with unit step.
    pub fn starting_at(start: isize) -> Self {
        Index::Slice {
            start: Some(start),
            end: None,
            step: 1,
        }
    }

    /// The slice `..end` with unit step.
    pub fn up_to(end: isize) -> Self {
        Index::Slice {
            start: None,
            end: Some(end),
            step: 1,
        }
    }

    /// How many existing axes this element consumes.
    fn consumes(&self) -> usize {
        match self {
            Index::At(_) | Index::Slice { .. } => 1,
            Index::Ellipsis | Index::NewAxis => 0,
        }
    }
}

impl From<isize> for Index {
    fn from(i: isize) -> Self {
        Index::At(i)
    }
}

impl From<std::ops::Range<isize>> for Index {
    fn from(r: std::ops::Range<isize>) -> Self {
        Index::range(r.start, r.end)
    }
}

impl From<std::ops::RangeFull> for Index {
    fn from(_: std::ops::RangeFull) -> Self {
        Index::all()
    }
}

/// Normalize a Python-style bound into `[0, len]`.
fn clamp_bound(bound: isize, len: usize) -> usize {
    let n = if bound < 0 { bound + len as isize } else { bound };
    n.clamp(0, len as isize) as usize
}

/// Expand an index list over a group of `group_rank` axes into per-axis
/// slice elements understood by the runtime.
///
/// Checks bounds for integer indices and step validity for ranges; the
/// ellipsis (at most one) expands to full slices over the unconsumed axes.
/// Without an ellipsis, trailing unconsumed axes are implicitly kept whole.
///
/// Returns the runtime slice elements together with the net change in the
/// group's axis count (new axes minus collapsed axes).
pub(crate) fn expand_indices(
    indices: &[Index],
    group_sizes: &[usize],
) -> Result<(Vec<SliceInfoElem>, isize)> {
    let group_rank = group_sizes.len();
    let consumed: usize = indices.iter().map(Index::consumes).sum();
    let n_ellipsis = indices.iter().filter(|i| matches!(i, Index::Ellipsis)).count();
    if n_ellipsis > 1 {
        return Err(TensorError::Shape {
            shape: crate::shape::Shape::new(),
            reason: "an index list may contain at most one ellipsis".into(),
        });
    }
    if consumed > group_rank {
        return Err(TensorError::out_of_bounds(
            "index list",
            consumed as isize,
            group_rank,
        ));
    }
    let implicit = group_rank - consumed;

    let mut out = Vec::with_capacity(group_rank + indices.len());
    let mut delta: isize = 0;
    let mut axis = 0usize;

    let mut push_full = |out: &mut Vec<SliceInfoElem>, axis: &mut usize| {
        out.push(SliceInfoElem::Slice {
            start: 0,
            end: None,
            step: 1,
        });
        *axis += 1;
    };

    for idx in indices {
        match *idx {
            Index::At(i) => {
                let len = group_sizes[axis];
                let norm = if i < 0 { i + len as isize } else { i };
                if norm < 0 || norm >= len as isize {
                    return Err(TensorError::out_of_bounds("axis index", i, len));
                }
                out.push(SliceInfoElem::Index(norm));
                axis += 1;
                delta -= 1;
            }
            Index::Slice { start, end, step } => {
                if step == 0 {
                    return Err(TensorError::Shape {
                        shape: crate::shape::Shape::new(),
                        reason: "slice step must be non-zero".into(),
                    });
                }
                let len = group_sizes[axis];
                // Clamp to the runtime's valid range up front so misuse is
                // reported here instead of panicking inside the runtime.
                let elem = if step > 0 {
                    let s = start.map_or(0, |b| clamp_bound(b, len));
                    let e = end.map_or(len, |b| clamp_bound(b, len)).max(s);
                    SliceInfoElem::Slice {
                        start: s as isize,
                        end: Some(e as isize),
                        step,
                    }
                } else {
                    // Negative step: normalize to the concrete index range and
                    // keep the runtime's negative-step slice form. The range
                    // anchor (its upper end) is the requested start position.
                    let s = start.map_or(len as isize - 1, |b| {
                        (clamp_bound(b, len) as isize).min(len as isize - 1)
                    });
                    let lo = end.map_or(0, |b| clamp_bound(b + 1, len) as isize);
                    let hi = (s + 1).max(lo);
                    SliceInfoElem::Slice {
                        start: lo,
                        end: Some(hi),
                        step,
                    }
                };
                out.push(elem);
                axis += 1;
            }
            Index::Ellipsis => {
                for _ in 0..implicit {
                    push_full(&mut out, &mut axis);
                }
            }
            Index::NewAxis => {
                out.push(SliceInfoElem::NewAxis);
                delta += 1;
            }
        }
    }
    if n_ellipsis == 0 {
        for _ in 0..implicit {
            push_full(&mut out, &mut axis);
        }
    }
    debug_assert_eq!(axis, group_rank);
    Ok((out, delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_delta(indices: &[Index], sizes: &[usize]) -> isize {
        expand_indices(indices, sizes).unwrap().1
    }

    #[test]
    fn integer_collapses_range_preserves() {
        assert_eq!(shape_delta(&[Index::At(0)], &[3, 4]), -1);
        assert_eq!(shape_delta(&[Index::range(0, 2)], &[3, 4]), 0);
        assert_eq!(shape_delta(&[Index::NewAxis], &[3, 4]), 1);
    }

    #[test]
    fn ellipsis_expands_to_remaining_axes() {
        let (elems, delta) =
            expand_indices(&[Index::At(1), Index::Ellipsis, Index::At(0)], &[2, 3, 4]).unwrap();
        assert_eq!(elems.len(), 3);
        assert_eq!(delta, -2);
        assert!(matches!(elems[1], SliceInfoElem::Slice { .. }));
    }

    #[test]
    fn trailing_axes_kept_without_ellipsis() {
        let (elems, _) = expand_indices(&[Index::At(0)], &[2, 3, 4]).unwrap();
        assert_eq!(elems.len(), 3);
        assert!(matches!(elems[1], SliceInfoElem::Slice { .. }));
        assert!(matches!(elems[2], SliceInfoElem::Slice { .. }));
    }

    #[test]
    fn negative_index_counts_back() {
        let (elems, _) = expand_indices(&[Index::At(-1)], &[3]).unwrap();
        assert!(matches!(elems[0], SliceInfoElem::Index(2)));
    }

    #[test]
    fn out_of_bounds_integer_is_reported() {
        assert!(expand_indices(&[Index::At(3)], &[3]).is_err());
        assert!(expand_indices(&[Index::At(-4)], &[3]).is_err());
    }

    #[test]
    fn too_many_indices_is_reported() {
        assert!(expand_indices(&[Index::At(0), Index::At(0)], &[3]).is_err());
    }

    #[test]
    fn zero_step_is_reported() {
        assert!(expand_indices(&[Index::range_step(0, 3, 0)], &[3]).is_err());
    }

    #[test]
    fn double_ellipsis_is_reported() {
        assert!(expand_indices(&[Index::Ellipsis, Index::Ellipsis], &[3]).is_err());
    }

    #[test]
    fn end_bound_is_clamped() {
        let (elems, _) = expand_indices(&[Index::range(1, 100)], &[3]).unwrap();
        match elems[0] {
            SliceInfoElem::Slice { start, end, step } => {
                assert_eq!((start, end, step), (1, Some(3), 1));
            }
            _ => panic!("expected slice"),
        }
    }
}
