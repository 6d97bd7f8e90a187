//! Property-based tests for block assembly
//!
//! The load-bearing law here is the round trip: for any block layout and
//! any subset of defined blocks, `disassemble(assemble(v))` restores every
//! defined block exactly and materializes every undefined block as zero.

use crate::hvector::HVector;
use crate::{from_assembly, to_assembly};
use consten_core::shape::{storage_size, DynShape, Shape};
use consten_core::Tensor;
use proptest::prelude::*;
use smallvec::SmallVec;

fn block_shapes() -> impl Strategy<Value = Vec<Shape>> {
    prop::collection::vec(
        prop::collection::vec(1usize..4, 0..=2).prop_map(SmallVec::from_vec),
        1..=4,
    )
}

fn filled_vector(shapes: &[Shape], mask: &[bool]) -> HVector<f64> {
    let mut v = HVector::new(shapes.to_vec());
    for (i, (shape, &defined)) in shapes.iter().zip(mask.iter()).enumerate() {
        if defined {
            let n = storage_size(shape);
            let data: Vec<f64> = (0..n).map(|k| (i * 100 + k) as f64 + 0.5).collect();
            v.set(i, Some(Tensor::from_base_vec(data, shape).unwrap()))
                .unwrap();
        }
    }
    v
}

proptest! {
    #[test]
    fn assemble_disassemble_roundtrip(
        shapes in block_shapes(),
        seed in any::<u64>(),
    ) {
        let mask: Vec<bool> = (0..shapes.len()).map(|i| (seed >> i) & 1 == 1).collect();
        let v = filled_vector(&shapes, &mask);
        let (dense, split) = v.assemble(None).unwrap();
        prop_assert_eq!(
            dense.base_storage(),
            split.iter().sum::<usize>()
        );

        let mut out = HVector::new(shapes.clone());
        out.disassemble(&dense, None).unwrap();
        for (i, &defined) in mask.iter().enumerate() {
            let block = out.get(i).unwrap().unwrap();
            prop_assert_eq!(block.base_sizes(), shapes[i].as_slice());
            if defined {
                let original = v.get(i).unwrap().unwrap();
                prop_assert!(block.allclose(original, 0.0));
            } else {
                prop_assert!(block.array().iter().all(|&x| x == 0.0));
            }
        }
    }

    #[test]
    fn dense_layout_is_concatenation(shapes in block_shapes()) {
        let mask = vec![true; shapes.len()];
        let v = filled_vector(&shapes, &mask);
        let (dense, split) = v.assemble(None).unwrap();

        let mut offset = 0;
        for (i, len) in split.iter().enumerate() {
            let flat = v.get(i).unwrap().unwrap().base_reshape(&[*len]).unwrap();
            for k in 0..*len {
                prop_assert_eq!(
                    dense.array()[ndarray::IxDyn(&[offset + k])],
                    flat.array()[ndarray::IxDyn(&[k])]
                );
            }
            offset += len;
        }
    }

    #[test]
    fn assembly_format_roundtrip(
        intmd in prop::collection::vec(1usize..4, 0..=2),
        base in prop::collection::vec(1usize..4, 0..=2),
    ) {
        let n = storage_size(&intmd) * storage_size(&base);
        let data: Vec<f64> = (0..n).map(|k| k as f64 * 0.25).collect();
        let t = Tensor::from_vec(data, DynShape::empty(), &intmd, &base).unwrap();

        let a = to_assembly::<f64, 1>(&t, [&intmd], [&base]).unwrap();
        prop_assert_eq!(a.intmd_dim(), 0);
        prop_assert_eq!(a.base_storage(), n);

        let back = from_assembly::<f64, 1>(&a, [&intmd], [&base]).unwrap();
        prop_assert_eq!(back, t);
    }
}

#[cfg(test)]
mod scalar_checks {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::IxDyn;
    use smallvec::smallvec;

    #[test]
    fn norm_matches_dense_norm() {
        let shapes: Vec<Shape> = vec![smallvec![2], smallvec![3]];
        let v = filled_vector(&shapes, &[true, true]);
        let (dense, _) = v.assemble(None).unwrap();
        let dense_norm = consten_core::tensor::norm(&dense);
        assert_relative_eq!(
            v.norm().array()[IxDyn(&[])],
            dense_norm.array()[IxDyn(&[])],
            max_relative = 1e-12
        );
    }
}
