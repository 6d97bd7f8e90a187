//! Heterogeneous block matrices
//!
//! An [`HMatrix`] is the two-dimensional generalization of
//! [`HVector`](crate::hvector::HVector): a fixed list of row base shapes, a
//! fixed list of column base shapes, and `rows × cols` optional sub-blocks
//! stored in row-major order. Block `(i, j)` holds a quantity with base
//! shape `row_shapes[i] + col_shapes[j]` — typically the derivative of
//! residual block `i` with respect to unknown block `j`.

use crate::blocks::{numels, select_block_indices, select_shapes};
use crate::error::{AssemblyError, Result};
use consten_core::shape::{concat_shapes, Shape};
use consten_core::tensor::{base_cat, broadcast_dynamic_sizes, broadcast_intmd_sizes};
use consten_core::Tensor;
use num_traits::Num;

/// A row-block × column-block collection of optional sub-blocks.
#[derive(Debug, Clone)]
pub struct HMatrix<T> {
    row_shapes: Vec<Shape>,
    col_shapes: Vec<Shape>,
    /// `m() * n()` blocks, row-major
    data: Vec<Option<Tensor<T>>>,
}

impl<T> HMatrix<T>
where
    T: Clone + Num,
{
    /// An all-undefined matrix with the given row and column base shapes.
    pub fn new(row_shapes: Vec<Shape>, col_shapes: Vec<Shape>) -> Self {
        let n = row_shapes.len() * col_shapes.len();
        HMatrix {
            row_shapes,
            col_shapes,
            data: (0..n).map(|_| None).collect(),
        }
    }

    /// Build from row-major block values.
    ///
    /// Every defined block `(i, j)` must have base shape
    /// `row_shapes[i] + col_shapes[j]`.
    pub fn from_blocks(
        data: Vec<Option<Tensor<T>>>,
        row_shapes: Vec<Shape>,
        col_shapes: Vec<Shape>,
    ) -> Result<Self> {
        if data.len() != row_shapes.len() * col_shapes.len() {
            return Err(AssemblyError::BlockCountMismatch {
                operation: "HMatrix::from_blocks",
                left: data.len(),
                right: row_shapes.len() * col_shapes.len(),
            });
        }
        let out = HMatrix {
            row_shapes,
            col_shapes,
            data,
        };
        for i in 0..out.m() {
            for j in 0..out.n() {
                if let Some(v) = &out.data[i * out.n() + j] {
                    let expected =
                        concat_shapes(&[&out.row_shapes[i], &out.col_shapes[j]]);
                    if v.base_sizes() != expected.as_slice() {
                        return Err(AssemblyError::BlockShapeMismatch {
                            index: i * out.n() + j,
                            declared: expected.to_vec(),
                            actual: v.base_sizes().to_vec(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Number of row blocks.
    pub fn m(&self) -> usize {
        self.row_shapes.len()
    }

    /// Number of column blocks.
    pub fn n(&self) -> usize {
        self.col_shapes.len()
    }

    /// The declared row base shapes.
    pub fn block_row_sizes(&self) -> &[Shape] {
        &self.row_shapes
    }

    /// The declared column base shapes.
    pub fn block_col_sizes(&self) -> &[Shape] {
        &self.col_shapes
    }

    fn check_block(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.m() {
            return Err(AssemblyError::BlockOutOfBounds {
                what: "HMatrix row",
                index: i,
                bound: self.m(),
            });
        }
        if j >= self.n() {
            return Err(AssemblyError::BlockOutOfBounds {
                what: "HMatrix column",
                index: j,
                bound: self.n(),
            });
        }
        Ok(())
    }

    /// The value of block `(i, j)` (`None` when undefined).
    pub fn get(&self, i: usize, j: usize) -> Result<Option<&Tensor<T>>> {
        self.check_block(i, j)?;
        Ok(self.data[i * self.n() + j].as_ref())
    }

    /// Set block `(i, j)`, validating the base shape.
    pub fn set(&mut self, i: usize, j: usize, value: Option<Tensor<T>>) -> Result<()> {
        self.check_block(i, j)?;
        if let Some(v) = &value {
            let expected = concat_shapes(&[&self.row_shapes[i], &self.col_shapes[j]]);
            if v.base_sizes() != expected.as_slice() {
                return Err(AssemblyError::BlockShapeMismatch {
                    index: i * self.n() + j,
                    declared: expected.to_vec(),
                    actual: v.base_sizes().to_vec(),
                });
            }
        }
        let n = self.n();
        self.data[i * n + j] = value;
        Ok(())
    }

    /// Block-wise sum; an undefined block acts as zero.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        if self.m() != other.m() || self.n() != other.n() {
            return Err(AssemblyError::BlockCountMismatch {
                operation: "HMatrix::try_add",
                left: self.data.len(),
                right: other.data.len(),
            });
        }
        let mut data = Vec::with_capacity(self.data.len());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            data.push(match (a, b) {
                (Some(a), Some(b)) => Some(a.try_add(b)?),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            });
        }
        Ok(HMatrix {
            row_shapes: self.row_shapes.clone(),
            col_shapes: self.col_shapes.clone(),
            data,
        })
    }

    /// Multiply every defined block by a scalar.
    pub fn scale(&self, s: T) -> Self {
        HMatrix {
            row_shapes: self.row_shapes.clone(),
            col_shapes: self.col_shapes.clone(),
            data: self
                .data
                .iter()
                .map(|b| b.as_ref().map(|v| v.scale(s.clone())))
                .collect(),
        }
    }

    /// Assemble the selected blocks into one dense matrix-layout tensor.
    ///
    /// Each block `(i, j)` is reshaped to `(rowsᵢ, colsⱼ)`; rows are
    /// concatenated along the flattened column axis, then stacked along
    /// the flattened row axis, with dynamic/intermediate broadcasting and
    /// zero-filling at both levels. Returns the dense tensor plus the row
    /// and column split sizes.
    pub fn assemble(
        &self,
        row_blocks: Option<&[usize]>,
        col_blocks: Option<&[usize]>,
    ) -> Result<(Tensor<T>, Vec<usize>, Vec<usize>)> {
        let row_indices = select_block_indices(row_blocks, self.m(), "HMatrix row")?;
        let col_indices = select_block_indices(col_blocks, self.n(), "HMatrix column")?;
        let row_shapes = select_shapes(&self.row_shapes, &row_indices);
        let col_shapes = select_shapes(&self.col_shapes, &col_indices);
        let row_split = numels(&row_shapes);
        let col_split = numels(&col_shapes);
        tracing::trace!(
            rows = row_indices.len(),
            cols = col_indices.len(),
            "assembling block matrix"
        );

        let mut rows: Vec<Option<Tensor<T>>> = Vec::with_capacity(row_indices.len());
        for (ri, &i) in row_indices.iter().enumerate() {
            // Reshape each defined block to its flattened (rows, cols) pair.
            let mut cols: Vec<Option<Tensor<T>>> = Vec::with_capacity(col_indices.len());
            for (ci, &j) in col_indices.iter().enumerate() {
                cols.push(match &self.data[i * self.n() + j] {
                    Some(v) => Some(v.base_reshape(&[row_split[ri], col_split[ci]])?),
                    None => None,
                });
            }

            // Broadcast within the row, zero-fill, and concatenate columns.
            let dyn_b = broadcast_dynamic_sizes(&cols)?;
            let intmd_b = broadcast_intmd_sizes(&cols)?;
            let mut pieces = Vec::with_capacity(cols.len());
            for (c, len) in cols.into_iter().zip(col_split.iter()) {
                pieces.push(match c {
                    Some(v) => v.batch_expand(&dyn_b, &intmd_b)?,
                    None => Tensor::zeros(dyn_b.clone(), &intmd_b, &[row_split[ri], *len]),
                });
            }
            rows.push(Some(base_cat(&pieces, -1)?));
        }

        // Broadcast across rows and concatenate along the row axis.
        let dyn_b = broadcast_dynamic_sizes(&rows)?;
        let intmd_b = broadcast_intmd_sizes(&rows)?;
        let mut pieces = Vec::with_capacity(rows.len());
        for r in rows.into_iter().flatten() {
            pieces.push(r.batch_expand(&dyn_b, &intmd_b)?);
        }
        Ok((base_cat(&pieces, -2)?, row_split, col_split))
    }

    /// Split an assembled matrix back into the selected blocks.
    ///
    /// Only the selected blocks are written; unselected blocks keep their
    /// current values.
    pub fn disassemble(
        &mut self,
        dense: &Tensor<T>,
        row_blocks: Option<&[usize]>,
        col_blocks: Option<&[usize]>,
    ) -> Result<()> {
        let row_indices = select_block_indices(row_blocks, self.m(), "HMatrix row")?;
        let col_indices = select_block_indices(col_blocks, self.n(), "HMatrix column")?;
        let row_shapes = select_shapes(&self.row_shapes, &row_indices);
        let col_shapes = select_shapes(&self.col_shapes, &col_indices);
        let row_split = numels(&row_shapes);
        let col_split = numels(&col_shapes);
        tracing::trace!(
            rows = row_indices.len(),
            cols = col_indices.len(),
            "disassembling block matrix"
        );

        let dense_rows = dense.base_split(&row_split, -2)?;
        for ((row, &i), row_shape) in dense_rows
            .into_iter()
            .zip(row_indices.iter())
            .zip(row_shapes.iter())
        {
            let dense_cols = row.base_split(&col_split, -1)?;
            for ((piece, &j), col_shape) in dense_cols
                .into_iter()
                .zip(col_indices.iter())
                .zip(col_shapes.iter())
            {
                let target = concat_shapes(&[row_shape, col_shape]);
                let n = self.n();
                self.data[i * n + j] = Some(piece.base_reshape(&target)?);
            }
        }
        Ok(())
    }
}

impl<T: Clone + Num + std::ops::Neg<Output = T>> std::ops::Neg for &HMatrix<T> {
    type Output = HMatrix<T>;

    fn neg(self) -> HMatrix<T> {
        HMatrix {
            row_shapes: self.row_shapes.clone(),
            col_shapes: self.col_shapes.clone(),
            data: self
                .data
                .iter()
                .map(|b| b.as_ref().map(|v| v.neg()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use smallvec::smallvec;

    /// 2x2 block matrix over unknowns of base shapes (2) and (3): only the
    /// diagonal blocks are defined.
    fn jacobian_like() -> HMatrix<f64> {
        let mut m = HMatrix::new(
            vec![smallvec![2], smallvec![3]],
            vec![smallvec![2], smallvec![3]],
        );
        m.set(0, 0, Some(Tensor::identity(2))).unwrap();
        m.set(1, 1, Some(Tensor::identity(3).scale(2.0))).unwrap();
        m
    }

    #[test]
    fn assemble_produces_block_diagonal() {
        let m = jacobian_like();
        let (dense, row_split, col_split) = m.assemble(None, None).unwrap();
        assert_eq!(row_split, vec![2, 3]);
        assert_eq!(col_split, vec![2, 3]);
        assert_eq!(dense.base_sizes(), &[5, 5]);

        for i in 0..5 {
            for j in 0..5 {
                let expected = match (i, j) {
                    (0, 0) | (1, 1) => 1.0,
                    (2, 2) | (3, 3) | (4, 4) => 2.0,
                    _ => 0.0,
                };
                assert_eq!(dense.array()[IxDyn(&[i, j])], expected);
            }
        }
    }

    #[test]
    fn disassemble_restores_blocks_and_zero_fill() {
        let m = jacobian_like();
        let (dense, _, _) = m.assemble(None, None).unwrap();

        let mut out = HMatrix::new(
            vec![smallvec![2], smallvec![3]],
            vec![smallvec![2], smallvec![3]],
        );
        out.disassemble(&dense, None, None).unwrap();

        let b00 = out.get(0, 0).unwrap().unwrap();
        assert_eq!(b00.base_sizes(), &[2, 2]);
        assert_eq!(b00.array()[IxDyn(&[0, 0])], 1.0);

        // the undefined off-diagonal came back as an explicit zero block
        let b01 = out.get(0, 1).unwrap().unwrap();
        assert_eq!(b01.base_sizes(), &[2, 3]);
        assert!(b01.array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn higher_rank_blocks_flatten_pairwise() {
        let mut m = HMatrix::<f64>::new(vec![smallvec![2, 2]], vec![smallvec![2, 2]]);
        m.set(0, 0, Some(Tensor::ones([].into(), &[], &[2, 2, 2, 2])))
            .unwrap();
        let (dense, row_split, col_split) = m.assemble(None, None).unwrap();
        assert_eq!((row_split[0], col_split[0]), (4, 4));
        assert_eq!(dense.base_sizes(), &[4, 4]);
    }

    #[test]
    fn batch_broadcast_across_blocks() {
        let mut m = HMatrix::<f64>::new(vec![smallvec![2]], vec![smallvec![2], smallvec![1]]);
        m.set(0, 0, Some(Tensor::ones([4].into(), &[], &[2, 2])))
            .unwrap();
        m.set(0, 1, Some(Tensor::ones([].into(), &[], &[2, 1])))
            .unwrap();
        let (dense, _, _) = m.assemble(None, None).unwrap();
        assert_eq!(dense.dynamic_sizes_concrete(), &[4]);
        assert_eq!(dense.base_sizes(), &[2, 3]);
    }

    #[test]
    fn selection_and_bounds() {
        let m = jacobian_like();
        let (dense, row_split, col_split) = m.assemble(Some(&[1]), Some(&[0, 1])).unwrap();
        assert_eq!(row_split, vec![3]);
        assert_eq!(col_split, vec![2, 3]);
        assert_eq!(dense.base_sizes(), &[3, 5]);

        assert!(m.assemble(Some(&[2]), None).is_err());
        assert!(m.get(2, 0).is_err());
        assert!(m.get(0, 2).is_err());
    }

    #[test]
    fn set_validates_block_shape() {
        let mut m = HMatrix::<f64>::new(vec![smallvec![2]], vec![smallvec![3]]);
        assert!(m.set(0, 0, Some(Tensor::zeros_base(&[2, 2]))).is_err());
        assert!(m.set(0, 0, Some(Tensor::zeros_base(&[2, 3]))).is_ok());
    }

    #[test]
    fn add_and_neg_treat_none_as_zero() {
        let m = jacobian_like();
        let sum = m.try_add(&m).unwrap();
        let b = sum.get(0, 0).unwrap().unwrap();
        assert_eq!(b.array()[IxDyn(&[0, 0])], 2.0);
        assert!(sum.get(0, 1).unwrap().is_none());

        let neg = -&m;
        assert_eq!(
            neg.get(1, 1).unwrap().unwrap().array()[IxDyn(&[0, 0])],
            -2.0
        );
    }
}
