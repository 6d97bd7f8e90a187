//! Property-based tests for the grouped shape algebra
//!
//! Verifies the algebraic laws the rest of the stack leans on: broadcast
//! associativity and idempotence, reshape/flatten round trips, group
//! independence of group-restricted operations, and exactness of the
//! reduced-notation conversions.

use crate::notation::{full_to_mandel, full_to_skew, mandel_to_full, skew_to_full};
use crate::shape::{broadcast_shapes, storage_size, DynShape};
use crate::tensor::Tensor;
use proptest::prelude::*;

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 0..=3)
}

fn small_shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 1..=2)
}

fn tensor_strategy() -> impl Strategy<Value = Tensor<f64>> {
    (shape_strategy(), small_shape_strategy(), small_shape_strategy()).prop_map(
        |(dynamic, intmd, base)| {
            let n = storage_size(&dynamic) * storage_size(&intmd) * storage_size(&base);
            let data: Vec<f64> = (0..n).map(|i| i as f64 * 0.5 - 3.0).collect();
            Tensor::from_vec(data, DynShape::from_concrete(&dynamic), &intmd, &base).unwrap()
        },
    )
}

proptest! {
    #[test]
    fn broadcast_is_associative(
        a in shape_strategy(),
        b in shape_strategy(),
        c in shape_strategy(),
    ) {
        let bc = broadcast_shapes(&[&b, &c]);
        let abc = broadcast_shapes(&[&a, &b, &c]);
        match (bc, abc) {
            (Ok(bc), Ok(abc)) => {
                let nested = broadcast_shapes(&[&a, bc.as_slice()]).unwrap();
                prop_assert_eq!(nested, abc);
            }
            (Ok(bc), Err(_)) => {
                prop_assert!(broadcast_shapes(&[&a, bc.as_slice()]).is_err());
            }
            // if the pairwise broadcast fails, the joint one must too
            (Err(_), abc) => prop_assert!(abc.is_err()),
        }
    }

    #[test]
    fn broadcast_to_self_is_identity(s in shape_strategy()) {
        let b = broadcast_shapes(&[&s, &s]).unwrap();
        prop_assert_eq!(b.as_slice(), s.as_slice());
    }

    #[test]
    fn base_flatten_reshape_roundtrip(t in tensor_strategy()) {
        let base = t.base_shape();
        let flat = t.base_flatten();
        prop_assert_eq!(flat.base_storage(), t.base_storage());
        let back = flat.base_reshape(&base).unwrap();
        prop_assert_eq!(back, t);
    }

    #[test]
    fn intmd_ops_leave_other_groups_alone(t in tensor_strategy()) {
        let expanded = t.intmd_unsqueeze(0).unwrap();
        prop_assert_eq!(expanded.dynamic_sizes(), t.dynamic_sizes());
        prop_assert_eq!(expanded.base_sizes(), t.base_sizes());

        let transposed = t.base_transpose(0, -1).unwrap();
        prop_assert_eq!(transposed.dynamic_sizes(), t.dynamic_sizes());
        prop_assert_eq!(transposed.intmd_sizes(), t.intmd_sizes());
    }

    #[test]
    fn expand_then_sum_to_shape_scales(t in tensor_strategy()) {
        // summing an expanded axis back down multiplies by the expansion
        let factor = 3usize;
        let mut target = vec![factor];
        target.extend_from_slice(t.intmd_sizes());
        let expanded = t.intmd_expand(&target).unwrap();
        let reduced = expanded.intmd_sum_to_shape(t.intmd_sizes()).unwrap();
        let scaled = t.scale(factor as f64);
        prop_assert!(reduced.allclose(&scaled, 1e-9));
    }

    #[test]
    fn mandel_roundtrip_exact(seed in prop::collection::vec(-10.0f64..10.0, 6)) {
        // build a symmetric matrix from 6 free components
        let m = Tensor::from_base_vec(
            vec![
                seed[0], seed[5], seed[4],
                seed[5], seed[1], seed[3],
                seed[4], seed[3], seed[2],
            ],
            &[3, 3],
        )
        .unwrap();
        let back = mandel_to_full(&full_to_mandel(&m, 0).unwrap(), 0).unwrap();
        prop_assert!(back.allclose(&m, 1e-12));
    }

    #[test]
    fn skew_roundtrip_exact(seed in prop::collection::vec(-10.0f64..10.0, 3)) {
        let w = Tensor::from_base_vec(
            vec![
                0.0, -seed[2], seed[1],
                seed[2], 0.0, -seed[0],
                -seed[1], seed[0], 0.0,
            ],
            &[3, 3],
        )
        .unwrap();
        let back = skew_to_full(&full_to_skew(&w, 0).unwrap(), 0).unwrap();
        prop_assert!(back.allclose(&w, 1e-12));
    }

    #[test]
    fn addition_commutes(t in tensor_strategy()) {
        let u = t.scale(2.0).add_scalar(1.0);
        let a = t.try_add(&u).unwrap();
        let b = u.try_add(&t).unwrap();
        prop_assert!(a.allclose(&b, 1e-9));
    }
}
