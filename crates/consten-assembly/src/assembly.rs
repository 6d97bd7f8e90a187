//! Assembly-format conversion
//!
//! The *assembly format* is the dense, linear-algebra-ready layout: one
//! flattened axis per block, concatenated. Ordinary state variables reach
//! it by flattening their base group; tensors coming out of vectorized
//! derivative computations additionally carry per-operand intrinsic
//! intermediate axes that must sit next to their paired base axes before
//! flattening. [`to_assembly`] performs that interleaving (rotating each
//! intrinsic block in front of its base block, diagonalizing broadcast
//! intermediate axes first when needed) and [`from_assembly`] inverts it.
//!
//! The free [`assemble`]/[`disassemble`] functions apply these conversions
//! across a [`TensorList`], producing the same dense layout as
//! `HVector`/`HMatrix` assembly.

use crate::blocks::TensorList;
use crate::error::{AssemblyError, Result};
use consten_core::derivative::{
    fullify_tensor, pop_intrinsic_intmd_blocks, push_intrinsic_intmd_blocks,
};
use consten_core::shape::{concat_shapes, storage_size, Shape};
use consten_core::tensor::{base_cat, broadcast_dynamic_sizes, broadcast_intmd_sizes};
use consten_core::{Tensor, TensorError};
use num_traits::Num;

/// Convert a tensor carrying `N` (intrinsic intermediate, base) axis pairs
/// into assembly format.
///
/// The input has layout `(dynamic ; intmd₁ … intmdₙ ; base₁ … baseₙ)`,
/// where the intermediate group is either the full concatenation of the
/// per-pair shapes or broadcastable to the first pair's shape (in which
/// case it is diagonally expanded first). The output has no intermediate
/// axes and one base axis per pair of length
/// `numel(intmdᵢ) · numel(baseᵢ)`.
pub fn to_assembly<T: Clone + Num, const N: usize>(
    t: &Tensor<T>,
    intmd_shapes: [&[usize]; N],
    base_shapes: [&[usize]; N],
) -> Result<Tensor<T>> {
    let expected_base = concat_shapes(&base_shapes);
    if t.base_sizes() != expected_base.as_slice() {
        return Err(AssemblyError::Tensor(TensorError::mismatch(
            "to_assembly",
            expected_base,
            Shape::from_slice(t.base_sizes()),
            "base shape must be the concatenation of the per-pair base shapes",
        )));
    }

    // Materialize broadcast intermediate axes into the full block-diagonal
    // layout, then rotate each intrinsic block in front of its base block.
    let full = fullify_tensor(t, t.intmd_dim(), &intmd_shapes)?;
    let intrinsic_dims: Vec<usize> = intmd_shapes.iter().map(|s| s.len()).collect();
    let base_dims: Vec<usize> = base_shapes.iter().map(|s| s.len()).collect();
    let interleaved = pop_intrinsic_intmd_blocks(&full, &intrinsic_dims, &base_dims)?;

    // Flatten each (intrinsic, base) pair to one assembly axis.
    let mut assembly_sizes = Shape::new();
    for (im, bs) in intmd_shapes.iter().zip(base_shapes.iter()) {
        assembly_sizes.push(storage_size(im) * storage_size(bs));
    }
    Ok(interleaved.base_reshape(&assembly_sizes)?)
}

/// Convert a tensor from assembly format back to the normal layout.
///
/// Exact inverse of [`to_assembly`] for a full-form input: unflattens each
/// assembly axis into its (intrinsic intermediate, base) pair and gathers
/// the intermediate blocks back into the intermediate group.
pub fn from_assembly<T: Clone + Num, const N: usize>(
    t: &Tensor<T>,
    intmd_shapes: [&[usize]; N],
    base_shapes: [&[usize]; N],
) -> Result<Tensor<T>> {
    if t.intmd_dim() != 0 {
        return Err(AssemblyError::Tensor(TensorError::mismatch(
            "from_assembly",
            Shape::new(),
            Shape::from_slice(t.intmd_sizes()),
            "a tensor in assembly format has no intermediate axes",
        )));
    }
    let mut assembly_sizes = Shape::new();
    for (im, bs) in intmd_shapes.iter().zip(base_shapes.iter()) {
        assembly_sizes.push(storage_size(im) * storage_size(bs));
    }
    if t.base_sizes() != assembly_sizes.as_slice() {
        return Err(AssemblyError::Tensor(TensorError::mismatch(
            "from_assembly",
            assembly_sizes,
            Shape::from_slice(t.base_sizes()),
            "base shape does not match the per-pair assembly sizes",
        )));
    }

    // Unflatten into the interleaved layout, then gather the intrinsic
    // blocks back into the intermediate group.
    let mut interleaved_sizes = Shape::new();
    for (im, bs) in intmd_shapes.iter().zip(base_shapes.iter()) {
        interleaved_sizes.extend_from_slice(im);
        interleaved_sizes.extend_from_slice(bs);
    }
    let unfl = t.base_reshape(&interleaved_sizes)?;
    let intrinsic_dims: Vec<usize> = intmd_shapes.iter().map(|s| s.len()).collect();
    let base_dims: Vec<usize> = base_shapes.iter().map(|s| s.len()).collect();
    Ok(push_intrinsic_intmd_blocks(
        &unfl,
        &intrinsic_dims,
        &base_dims,
    )?)
}

fn split_sizes(intmd_shapes: Option<&[Shape]>, base_shapes: &[Shape]) -> Vec<usize> {
    base_shapes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let mut s = storage_size(b);
            if let Some(im) = intmd_shapes {
                s *= storage_size(&im[i]);
            }
            s
        })
        .collect()
}

fn check_block_count(
    intmd_shapes: Option<&[Shape]>,
    base_shapes: &[Shape],
    n: usize,
    operation: &'static str,
) -> Result<()> {
    if let Some(im) = intmd_shapes {
        if im.len() != base_shapes.len() {
            return Err(AssemblyError::BlockCountMismatch {
                operation,
                left: im.len(),
                right: base_shapes.len(),
            });
        }
    }
    if base_shapes.len() != n {
        return Err(AssemblyError::BlockCountMismatch {
            operation,
            left: base_shapes.len(),
            right: n,
        });
    }
    Ok(())
}

/// Assemble a list of blocks into one dense vector-layout tensor.
///
/// Without `intmd_shapes`, each defined block's base is flattened; with
/// them, each block routes through [`to_assembly`] so its intrinsic
/// intermediate axes land inside the flattened axis. Undefined blocks
/// are zero-filled at the broadcast batch shape.
pub fn assemble<T: Clone + Num>(
    list: &TensorList<T>,
    intmd_shapes: Option<&[Shape]>,
    base_shapes: &[Shape],
) -> Result<Tensor<T>> {
    check_block_count(intmd_shapes, base_shapes, list.len(), "assemble")?;
    let ss = split_sizes(intmd_shapes, base_shapes);

    let mut flat: Vec<Option<Tensor<T>>> = Vec::with_capacity(list.len());
    for (i, block) in list.iter().enumerate() {
        flat.push(match block {
            None => None,
            Some(v) => Some(match intmd_shapes {
                Some(im) => to_assembly::<T, 1>(v, [&im[i]], [&base_shapes[i]])?,
                None => v.base_reshape(&[ss[i]])?,
            }),
        });
    }

    let dyn_b = broadcast_dynamic_sizes(&flat)?;
    let intmd_b = broadcast_intmd_sizes(&flat)?;
    let mut pieces = Vec::with_capacity(flat.len());
    for (f, len) in flat.into_iter().zip(ss.iter()) {
        pieces.push(match f {
            Some(v) => v.batch_expand(&dyn_b, &intmd_b)?,
            None => Tensor::zeros(dyn_b.clone(), &intmd_b, &[*len]),
        });
    }
    Ok(base_cat(&pieces, -1)?)
}

/// Disassemble a dense vector-layout tensor into blocks.
///
/// Inverse of [`assemble`]; with `intmd_shapes` each piece routes through
/// [`from_assembly`] to recover its intrinsic intermediate axes.
pub fn disassemble<T: Clone + Num>(
    dense: &Tensor<T>,
    intmd_shapes: Option<&[Shape]>,
    base_shapes: &[Shape],
) -> Result<TensorList<T>> {
    if let Some(im) = intmd_shapes {
        if im.len() != base_shapes.len() {
            return Err(AssemblyError::BlockCountMismatch {
                operation: "disassemble",
                left: im.len(),
                right: base_shapes.len(),
            });
        }
        if dense.intmd_dim() != 0 {
            return Err(AssemblyError::Tensor(TensorError::mismatch(
                "disassemble",
                Shape::new(),
                Shape::from_slice(dense.intmd_sizes()),
                "a tensor in assembly format has no intermediate axes",
            )));
        }
    }
    let ss = split_sizes(intmd_shapes, base_shapes);
    let pieces = dense.base_split(&ss, -1)?;

    let mut out = TensorList::new();
    for (i, piece) in pieces.into_iter().enumerate() {
        out.push(Some(match intmd_shapes {
            Some(im) => from_assembly::<T, 1>(&piece, [&im[i]], [&base_shapes[i]])?,
            None => piece.base_reshape(&base_shapes[i])?,
        }));
    }
    Ok(out)
}

/// Assemble a row-major list of `m × n` blocks into one dense
/// matrix-layout tensor.
pub fn assemble_matrix<T: Clone + Num>(
    list: &TensorList<T>,
    row_intmd_shapes: Option<&[Shape]>,
    col_intmd_shapes: Option<&[Shape]>,
    row_base_shapes: &[Shape],
    col_base_shapes: &[Shape],
) -> Result<Tensor<T>> {
    if row_intmd_shapes.is_some() != col_intmd_shapes.is_some() {
        return Err(AssemblyError::BlockCountMismatch {
            operation: "assemble_matrix",
            left: row_intmd_shapes.map_or(0, <[Shape]>::len),
            right: col_intmd_shapes.map_or(0, <[Shape]>::len),
        });
    }
    let row_ss = split_sizes(row_intmd_shapes, row_base_shapes);
    let col_ss = split_sizes(col_intmd_shapes, col_base_shapes);
    let m = row_ss.len();
    let n = col_ss.len();
    if list.len() != m * n {
        return Err(AssemblyError::BlockCountMismatch {
            operation: "assemble_matrix",
            left: list.len(),
            right: m * n,
        });
    }

    let mut rows: Vec<Option<Tensor<T>>> = Vec::with_capacity(m);
    for i in 0..m {
        let mut cols: Vec<Option<Tensor<T>>> = Vec::with_capacity(n);
        for j in 0..n {
            cols.push(match list.get(i * n + j)? {
                None => None,
                Some(v) => Some(match (row_intmd_shapes, col_intmd_shapes) {
                    (Some(rim), Some(cim)) => to_assembly::<T, 2>(
                        v,
                        [&rim[i], &cim[j]],
                        [&row_base_shapes[i], &col_base_shapes[j]],
                    )?,
                    _ => v.base_reshape(&[row_ss[i], col_ss[j]])?,
                }),
            });
        }

        let dyn_b = broadcast_dynamic_sizes(&cols)?;
        let intmd_b = broadcast_intmd_sizes(&cols)?;
        let mut pieces = Vec::with_capacity(n);
        for (c, len) in cols.into_iter().zip(col_ss.iter()) {
            pieces.push(match c {
                Some(v) => v.batch_expand(&dyn_b, &intmd_b)?,
                None => Tensor::zeros(dyn_b.clone(), &intmd_b, &[row_ss[i], *len]),
            });
        }
        rows.push(Some(base_cat(&pieces, -1)?));
    }

    let dyn_b = broadcast_dynamic_sizes(&rows)?;
    let intmd_b = broadcast_intmd_sizes(&rows)?;
    let mut pieces = Vec::with_capacity(m);
    for r in rows.into_iter().flatten() {
        pieces.push(r.batch_expand(&dyn_b, &intmd_b)?);
    }
    Ok(base_cat(&pieces, -2)?)
}

/// Disassemble a dense matrix-layout tensor into a row-major block list.
pub fn disassemble_matrix<T: Clone + Num>(
    dense: &Tensor<T>,
    row_intmd_shapes: Option<&[Shape]>,
    col_intmd_shapes: Option<&[Shape]>,
    row_base_shapes: &[Shape],
    col_base_shapes: &[Shape],
) -> Result<TensorList<T>> {
    if row_intmd_shapes.is_some() != col_intmd_shapes.is_some() {
        return Err(AssemblyError::BlockCountMismatch {
            operation: "disassemble_matrix",
            left: row_intmd_shapes.map_or(0, <[Shape]>::len),
            right: col_intmd_shapes.map_or(0, <[Shape]>::len),
        });
    }
    let row_ss = split_sizes(row_intmd_shapes, row_base_shapes);
    let col_ss = split_sizes(col_intmd_shapes, col_base_shapes);

    let mut out = TensorList::new();
    let dense_rows = dense.base_split(&row_ss, -2)?;
    for (i, row) in dense_rows.into_iter().enumerate() {
        let dense_cols = row.base_split(&col_ss, -1)?;
        for (j, piece) in dense_cols.into_iter().enumerate() {
            out.push(Some(match (row_intmd_shapes, col_intmd_shapes) {
                (Some(rim), Some(cim)) => from_assembly::<T, 2>(
                    &piece,
                    [&rim[i], &cim[j]],
                    [&row_base_shapes[i], &col_base_shapes[j]],
                )?,
                _ => piece
                    .base_reshape(&concat_shapes(&[&row_base_shapes[i], &col_base_shapes[j]]))?,
            }));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consten_core::shape::DynShape;
    use ndarray::IxDyn;
    use smallvec::smallvec;

    fn with_intmd(data: Vec<f64>, intmd: &[usize], base: &[usize]) -> Tensor<f64> {
        Tensor::from_vec(data, DynShape::empty(), intmd, base).unwrap()
    }

    #[test]
    fn to_assembly_roundtrip_single_pair() {
        let t = with_intmd(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2], &[3]);
        let a = to_assembly::<f64, 1>(&t, [&[2]], [&[3]]).unwrap();
        assert_eq!(a.intmd_dim(), 0);
        assert_eq!(a.base_sizes(), &[6]);

        let back = from_assembly::<f64, 1>(&a, [&[2]], [&[3]]).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn to_assembly_broadcast_intermediate() {
        // a single shared value broadcast over 2 instances
        let t = with_intmd(vec![1.0, 2.0, 3.0], &[1], &[3]);
        let a = to_assembly::<f64, 1>(&t, [&[2]], [&[3]]).unwrap();
        assert_eq!(a.base_sizes(), &[6]);
        let back = from_assembly::<f64, 1>(&a, [&[2]], [&[3]]).unwrap();
        assert_eq!(back.intmd_sizes(), &[2]);
        for j in 0..2 {
            for k in 0..3 {
                assert_eq!(
                    back.array()[IxDyn(&[j, k])],
                    t.array()[IxDyn(&[0, k])]
                );
            }
        }
    }

    #[test]
    fn to_assembly_interleaves_two_pairs() {
        // full-form input: intmd (2, 3), bases (2) and (1)
        let n = 2 * 3 * 2;
        let t = with_intmd((0..n).map(|i| i as f64).collect(), &[2, 3], &[2, 1]);
        let a = to_assembly::<f64, 2>(&t, [&[2], &[3]], [&[2], &[1]]).unwrap();
        assert_eq!(a.intmd_dim(), 0);
        assert_eq!(a.base_sizes(), &[4, 3]);

        let back = from_assembly::<f64, 2>(&a, [&[2], &[3]], [&[2], &[1]]).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn assembly_axis_ordering_is_intmd_major() {
        // (intmd 2 ; base 2): the assembly axis runs intmd-major, so the
        // element at intmd j, base k lands at slot j * 2 + k
        let t = with_intmd(vec![1.0, 2.0, 3.0, 4.0], &[2], &[2]);
        let a = to_assembly::<f64, 1>(&t, [&[2]], [&[2]]).unwrap();
        for j in 0..2 {
            for k in 0..2 {
                assert_eq!(
                    a.array()[IxDyn(&[j * 2 + k])],
                    t.array()[IxDyn(&[j, k])]
                );
            }
        }
    }

    #[test]
    fn free_assemble_matches_scenario() {
        // blocks (3) defined and (2,2) undefined: [1,2,3,0,0,0,0]
        let mut list = TensorList::<f64>::undefined(2);
        list.set(
            0,
            Some(Tensor::from_base_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap()),
        )
        .unwrap();
        let base_shapes: Vec<Shape> = vec![smallvec![3], smallvec![2, 2]];
        let dense = assemble(&list, None, &base_shapes).unwrap();
        assert_eq!(dense.base_sizes(), &[7]);
        let expected = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0];
        for (i, e) in expected.iter().enumerate() {
            assert_eq!(dense.array()[IxDyn(&[i])], *e);
        }

        let blocks = disassemble(&dense, None, &base_shapes).unwrap();
        let b0 = blocks.get(0).unwrap().unwrap();
        assert_eq!(b0.array()[IxDyn(&[1])], 2.0);
        let b1 = blocks.get(1).unwrap().unwrap();
        assert_eq!(b1.base_sizes(), &[2, 2]);
        assert!(b1.array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn free_assemble_with_intermediate_shapes() {
        let mut list = TensorList::<f64>::undefined(2);
        list.set(0, Some(with_intmd(vec![1.0, 2.0, 3.0, 4.0], &[2], &[2])))
            .unwrap();
        let intmd: Vec<Shape> = vec![smallvec![2], smallvec![1]];
        let base: Vec<Shape> = vec![smallvec![2], smallvec![3]];
        let dense = assemble(&list, Some(&intmd), &base).unwrap();
        assert_eq!(dense.base_sizes(), &[7]);
        assert_eq!(dense.intmd_dim(), 0);

        let blocks = disassemble(&dense, Some(&intmd), &base).unwrap();
        let b0 = blocks.get(0).unwrap().unwrap();
        assert_eq!(b0.intmd_sizes(), &[2]);
        assert_eq!(b0.base_sizes(), &[2]);
        assert_eq!(b0.array()[IxDyn(&[1, 0])], 3.0);
    }

    #[test]
    fn matrix_assembly_roundtrip_with_intermediate() {
        // one diagonal block vectorized over 2 instances
        let mut list = TensorList::<f64>::undefined(4);
        list.set(0, Some(with_intmd(vec![1.0, 2.0], &[2], &[1, 1])))
            .unwrap();
        list.set(3, Some(with_intmd(vec![5.0], &[], &[1, 1])))
            .unwrap();
        let row_intmd: Vec<Shape> = vec![smallvec![2], smallvec![]];
        let col_intmd: Vec<Shape> = vec![smallvec![2], smallvec![]];
        let row_base: Vec<Shape> = vec![smallvec![1], smallvec![1]];
        let col_base: Vec<Shape> = vec![smallvec![1], smallvec![1]];

        let dense = assemble_matrix(
            &list,
            Some(&row_intmd),
            Some(&col_intmd),
            &row_base,
            &col_base,
        )
        .unwrap();
        assert_eq!(dense.base_sizes(), &[3, 3]);
        // block (0,0) is diagonal over the 2 instances
        assert_eq!(dense.array()[IxDyn(&[0, 0])], 1.0);
        assert_eq!(dense.array()[IxDyn(&[1, 1])], 2.0);
        assert_eq!(dense.array()[IxDyn(&[0, 1])], 0.0);
        assert_eq!(dense.array()[IxDyn(&[2, 2])], 5.0);

        let blocks = disassemble_matrix(
            &dense,
            Some(&row_intmd),
            Some(&col_intmd),
            &row_base,
            &col_base,
        )
        .unwrap();
        let b00 = blocks.get(0).unwrap().unwrap();
        assert_eq!(b00.intmd_sizes(), &[2, 2]);
        assert_eq!(b00.base_sizes(), &[1, 1]);
        // diagonal entries recovered, off-diagonal zero
        assert_eq!(b00.array()[IxDyn(&[0, 0, 0, 0])], 1.0);
        assert_eq!(b00.array()[IxDyn(&[1, 1, 0, 0])], 2.0);
        assert_eq!(b00.array()[IxDyn(&[0, 1, 0, 0])], 0.0);
    }

    #[test]
    fn matrix_assembly_without_intermediate() {
        let mut list = TensorList::<f64>::undefined(1);
        list.set(0, Some(Tensor::identity(2))).unwrap();
        let rb: Vec<Shape> = vec![smallvec![2]];
        let cb: Vec<Shape> = vec![smallvec![2]];
        let dense = assemble_matrix(&list, None, None, &rb, &cb).unwrap();
        assert_eq!(dense.base_sizes(), &[2, 2]);
        let blocks = disassemble_matrix(&dense, None, None, &rb, &cb).unwrap();
        assert_eq!(
            blocks.get(0).unwrap().unwrap().array()[IxDyn(&[0, 0])],
            1.0
        );
    }

    #[test]
    fn format_errors_are_reported() {
        let t = with_intmd(vec![1.0, 2.0], &[2], &[]);
        // wrong base shape
        assert!(to_assembly::<f64, 1>(&t, [&[2]], [&[3]]).is_err());
        // from_assembly rejects leftover intermediate axes
        assert!(from_assembly::<f64, 1>(&t, [&[2]], [&[]]).is_err());
    }
}
