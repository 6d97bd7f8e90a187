//! Reduced (symmetry-exploiting) notation
//!
//! Conversions between the full representation of a rank-2 base pair and
//! its compressed forms: Mandel notation for symmetric pairs (two size-3
//! axes collapse into one size-6 axis, scaled so the Frobenius inner
//! product is preserved) and the axial-vector form for antisymmetric pairs
//! (two size-3 axes collapse into one size-3 axis via the Levi-Civita sign
//! pattern).
//!
//! Both directions run through one generic primitive parameterized by a
//! reverse-index map, a per-slot scale table, and the starting base-axis
//! offset, so the conversions compose for higher-order tensors — a
//! 4th-order tensor reduces twice, once per axis pair.
//!
//! The small constant tables are built once per element type and cached
//! process-wide. First use populates the cache; callers needing concurrent
//! first use from several threads should pre-warm it from one thread (see
//! the crate-level concurrency notes).

use crate::error::{Result, TensorError};
use crate::shape::{self, Shape};
use crate::tensor::Tensor;
use ndarray::Axis;
use num_traits::Float;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Index/scale tables defining one reduced notation.
///
/// `fwd_map[i]` gives, for each slot of the reduced axis, the index into
/// the flattened `(3, 3)` pair it is read from; `inv_map[j]` gives, for
/// each of the 9 full slots, the reduced slot it is rebuilt from. The
/// factor tables carry the per-slot scales.
#[derive(Debug, Clone)]
pub struct ReducedTable<T> {
    /// Length of the reduced axis (6 for Mandel, 3 for the axial vector)
    pub reduced_len: usize,
    pub fwd_map: Vec<usize>,
    pub fwd_factors: Vec<T>,
    pub inv_map: Vec<usize>,
    pub inv_factors: Vec<T>,
}

/// The per-element-type table set.
#[derive(Debug)]
struct NotationTables<T> {
    mandel: ReducedTable<T>,
    skew: ReducedTable<T>,
}

impl<T: Float> NotationTables<T> {
    fn build() -> Self {
        let one = T::one();
        let zero = T::zero();
        let sqrt2 = T::from(2.0).expect("2 is representable").sqrt();
        let invsqrt2 = one / sqrt2;
        NotationTables {
            mandel: ReducedTable {
                reduced_len: 6,
                fwd_map: vec![0, 4, 8, 5, 2, 1],
                fwd_factors: vec![one, one, one, sqrt2, sqrt2, sqrt2],
                inv_map: vec![0, 5, 4, 5, 1, 3, 4, 3, 2],
                inv_factors: vec![
                    one, invsqrt2, invsqrt2, invsqrt2, one, invsqrt2, invsqrt2, invsqrt2, one,
                ],
            },
            skew: ReducedTable {
                reduced_len: 3,
                fwd_map: vec![7, 2, 3],
                fwd_factors: vec![one, one, one],
                inv_map: vec![0, 2, 1, 2, 0, 0, 1, 0, 0],
                inv_factors: vec![zero, -one, one, one, zero, -one, -one, one, zero],
            },
        }
    }
}

static TABLES: Lazy<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    Lazy::new(Default::default);

fn tables<T: Float + Send + Sync + 'static>() -> Arc<NotationTables<T>> {
    let key = TypeId::of::<T>();
    if let Some(entry) = TABLES.read().get(&key) {
        if let Ok(t) = entry.clone().downcast::<NotationTables<T>>() {
            return t;
        }
    }
    let mut write = TABLES.write();
    let entry = write.entry(key).or_insert_with(|| {
        tracing::debug!("building reduced-notation tables");
        Arc::new(NotationTables::<T>::build())
    });
    match entry.clone().downcast::<NotationTables<T>>() {
        Ok(t) => t,
        // entries are keyed by element type, so the downcast cannot fail
        Err(_) => unreachable!("reduced-notation cache entry has the wrong element type"),
    }
}

/// Collapse the base axis pair starting at `dim` through a reverse-index
/// map and scale table.
///
/// The two axes at base offsets `dim` and `dim + 1` must both have size 3;
/// they are replaced by one axis of length `map.len()`, where slot `i`
/// holds `factors[i]` times the element the map points at in the
/// flattened pair.
pub fn full_to_reduced<T: Float>(
    t: &Tensor<T>,
    map: &[usize],
    factors: &[T],
    dim: isize,
) -> Result<Tensor<T>> {
    if t.base_dim() < 2 {
        return Err(TensorError::mismatch(
            "full_to_reduced",
            Shape::from_slice(&[3, 3]),
            Shape::from_slice(t.base_sizes()),
            "need at least two base axes to reduce",
        ));
    }
    let pos = shape::normalize_axis(dim, 0, t.base_dim() - 1)?;
    let base = t.base_sizes();
    if base[pos] != 3 || base[pos + 1] != 3 {
        return Err(TensorError::mismatch(
            "full_to_reduced",
            Shape::from_slice(&[3, 3]),
            Shape::from_slice(&base[pos..pos + 2]),
            "the reduced axis pair must have sizes (3, 3)",
        ));
    }

    let mut flat_base = Shape::from_slice(&base[..pos]);
    flat_base.push(9);
    flat_base.extend_from_slice(&base[pos + 2..]);
    let flat = t.base_reshape(&flat_base)?;

    let abs = flat.batch_dim() + pos;
    let mut data = flat.array().select(Axis(abs), map);
    for (i, f) in factors.iter().enumerate() {
        data.index_axis_mut(Axis(abs), i).mapv_inplace(|x| x * *f);
    }
    Tensor::from_parts(data, t.dynamic_sizes().clone(), t.intmd_dim())
}

/// Expand the reduced base axis at `dim` back into a `(3, 3)` pair.
///
/// The axis at base offset `dim` must have length `reduced_len`; the
/// 9-entry map and factors rebuild the flattened pair, which is then
/// reshaped into `(3, 3)`.
pub fn reduced_to_full<T: Float>(
    t: &Tensor<T>,
    map: &[usize],
    factors: &[T],
    reduced_len: usize,
    dim: isize,
) -> Result<Tensor<T>> {
    let pos = shape::normalize_axis(dim, 0, t.base_dim().max(1))?;
    if t.base_dim() == 0 || t.base_sizes()[pos] != reduced_len {
        return Err(TensorError::mismatch(
            "reduced_to_full",
            Shape::from_slice(&[reduced_len]),
            Shape::from_slice(t.base_sizes()),
            "the reduced axis has the wrong length",
        ));
    }

    let abs = t.batch_dim() + pos;
    let mut data = t.array().select(Axis(abs), map);
    for (i, f) in factors.iter().enumerate() {
        data.index_axis_mut(Axis(abs), i).mapv_inplace(|x| x * *f);
    }
    let expanded = Tensor::from_parts(data, t.dynamic_sizes().clone(), t.intmd_dim())?;

    let base = t.base_sizes();
    let mut full_base = Shape::from_slice(&base[..pos]);
    full_base.extend_from_slice(&[3, 3]);
    full_base.extend_from_slice(&base[pos + 1..]);
    expanded.base_reshape(&full_base)
}

/// Collapse a symmetric `(3, 3)` base pair at `dim` into Mandel notation.
///
/// Frobenius inner products are preserved: the off-diagonal slots carry a
/// factor of √2.
pub fn full_to_mandel<T: Float + Send + Sync + 'static>(
    t: &Tensor<T>,
    dim: isize,
) -> Result<Tensor<T>> {
    let tb = tables::<T>();
    full_to_reduced(t, &tb.mandel.fwd_map, &tb.mandel.fwd_factors, dim)
}

/// Expand a Mandel axis (length 6) at `dim` back into the symmetric
/// `(3, 3)` pair.
pub fn mandel_to_full<T: Float + Send + Sync + 'static>(
    t: &Tensor<T>,
    dim: isize,
) -> Result<Tensor<T>> {
    let tb = tables::<T>();
    reduced_to_full(
        t,
        &tb.mandel.inv_map,
        &tb.mandel.inv_factors,
        tb.mandel.reduced_len,
        dim,
    )
}

/// Collapse an antisymmetric `(3, 3)` base pair at `dim` into its axial
/// vector.
pub fn full_to_skew<T: Float + Send + Sync + 'static>(
    t: &Tensor<T>,
    dim: isize,
) -> Result<Tensor<T>> {
    let tb = tables::<T>();
    full_to_reduced(t, &tb.skew.fwd_map, &tb.skew.fwd_factors, dim)
}

/// Expand an axial vector (length 3) at `dim` back into the antisymmetric
/// `(3, 3)` pair.
pub fn skew_to_full<T: Float + Send + Sync + 'static>(
    t: &Tensor<T>,
    dim: isize,
) -> Result<Tensor<T>> {
    let tb = tables::<T>();
    reduced_to_full(
        t,
        &tb.skew.inv_map,
        &tb.skew.inv_factors,
        tb.skew.reduced_len,
        dim,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::DynShape;
    use ndarray::IxDyn;

    fn sym_matrix() -> Tensor<f64> {
        Tensor::from_base_vec(
            vec![1.0, 6.0, 5.0, 6.0, 2.0, 4.0, 5.0, 4.0, 3.0],
            &[3, 3],
        )
        .unwrap()
    }

    #[test]
    fn mandel_reduction_values() {
        let m = full_to_mandel(&sym_matrix(), 0).unwrap();
        assert_eq!(m.base_sizes(), &[6]);
        let s2 = 2.0f64.sqrt();
        let expected = [1.0, 2.0, 3.0, 4.0 * s2, 5.0 * s2, 6.0 * s2];
        for (i, e) in expected.iter().enumerate() {
            assert!((m.array()[IxDyn(&[i])] - e).abs() < 1e-12);
        }
    }

    #[test]
    fn mandel_roundtrip_is_exact() {
        let full = sym_matrix();
        let back = mandel_to_full(&full_to_mandel(&full, 0).unwrap(), 0).unwrap();
        assert!(back.allclose(&full, 1e-12));
    }

    #[test]
    fn mandel_preserves_frobenius_norm() {
        let full = sym_matrix();
        let m = full_to_mandel(&full, 0).unwrap();
        let nf = crate::tensor::norm_sq(&full).array()[IxDyn(&[])];
        let nm = crate::tensor::norm_sq(&m).array()[IxDyn(&[])];
        assert!((nf - nm).abs() < 1e-10);
    }

    #[test]
    fn skew_roundtrip_and_values() {
        let w = Tensor::from_base_vec(
            vec![0.0, -3.0, 2.0, 3.0, 0.0, -1.0, -2.0, 1.0, 0.0],
            &[3, 3],
        )
        .unwrap();
        let a = full_to_skew(&w, 0).unwrap();
        assert_eq!(a.base_sizes(), &[3]);
        assert_eq!(a.array()[IxDyn(&[0])], 1.0);
        assert_eq!(a.array()[IxDyn(&[1])], 2.0);
        assert_eq!(a.array()[IxDyn(&[2])], 3.0);

        let back = skew_to_full(&a, 0).unwrap();
        assert!(back.allclose(&w, 1e-12));
    }

    #[test]
    fn reduction_composes_at_offsets() {
        // A 4th-order tensor reduces twice, once per axis pair.
        let t = Tensor::<f64>::rand(DynShape::empty(), &[], &[3, 3, 3, 3]);
        let sym = symmetrize4(&t);
        let once = full_to_mandel(&sym, 0).unwrap();
        assert_eq!(once.base_sizes(), &[6, 3, 3]);
        let twice = full_to_mandel(&once, 1).unwrap();
        assert_eq!(twice.base_sizes(), &[6, 6]);

        let back = mandel_to_full(&mandel_to_full(&twice, 1).unwrap(), 0).unwrap();
        assert!(back.allclose(&sym, 1e-12));
    }

    #[test]
    fn batched_reduction_leaves_batch_groups_alone() {
        let base: Vec<f64> = vec![1.0, 6.0, 5.0, 6.0, 2.0, 4.0, 5.0, 4.0, 3.0];
        let data: Vec<f64> = base.iter().chain(base.iter()).copied().collect();
        let t = Tensor::from_vec(data, DynShape::from_concrete(&[2]), &[], &[3, 3]).unwrap();
        let m = full_to_mandel(&t, 0).unwrap();
        assert_eq!(m.dynamic_sizes_concrete(), &[2]);
        assert_eq!(m.base_sizes(), &[6]);
        assert_eq!(m.array()[IxDyn(&[1, 0])], 1.0);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let t = Tensor::<f64>::zeros_base(&[2, 2]);
        assert!(full_to_mandel(&t, 0).is_err());
        let t = Tensor::<f64>::zeros_base(&[5]);
        assert!(mandel_to_full(&t, 0).is_err());
    }

    #[test]
    fn tables_are_cached_per_type() {
        let a = tables::<f64>();
        let b = tables::<f64>();
        assert!(Arc::ptr_eq(&a, &b));
        let c = tables::<f32>();
        assert_eq!(c.mandel.reduced_len, 6);
    }

    /// Symmetrize both axis pairs of a (3,3,3,3) base tensor.
    fn symmetrize4(t: &Tensor<f64>) -> Tensor<f64> {
        let t1 = t.base_transpose(0, 1).unwrap();
        let s = t.try_add(&t1).unwrap().scale(0.5);
        let s1 = s.base_transpose(2, 3).unwrap();
        s.try_add(&s1).unwrap().scale(0.5)
    }
}
