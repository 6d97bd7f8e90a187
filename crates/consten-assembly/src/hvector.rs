//! Heterogeneous block vectors
//!
//! An [`HVector`] is an ordered, fixed-length sequence of sub-blocks.
//! Every block has a declared base shape (blocks may differ) and an
//! optional value; an undefined block is an implicit zero. Assembling
//! flattens each block, broadcasts the batch shapes across the selection,
//! zero-fills the undefined blocks, and concatenates into one dense tensor
//! ready for a generic linear solve.

use crate::blocks::{numels, select_block_indices, select_shapes};
use crate::error::{AssemblyError, Result};
use consten_core::shape::Shape;
use consten_core::tensor::{
    base_cat, broadcast_dynamic_sizes, broadcast_intmd_sizes, inner, norm_sq,
};
use consten_core::Tensor;
use num_traits::{Float, Num};

/// An ordered collection of optional sub-blocks with per-block base shapes.
#[derive(Debug, Clone)]
pub struct HVector<T> {
    shapes: Vec<Shape>,
    data: Vec<Option<Tensor<T>>>,
}

impl<T> HVector<T>
where
    T: Clone + Num,
{
    /// A vector of undefined (implicit zero) blocks with the given base
    /// shapes.
    pub fn new(shapes: Vec<Shape>) -> Self {
        let n = shapes.len();
        HVector {
            shapes,
            data: (0..n).map(|_| None).collect(),
        }
    }

    /// Build from block values and their declared base shapes.
    ///
    /// Every defined block must match its declared base shape.
    pub fn from_blocks(data: Vec<Option<Tensor<T>>>, shapes: Vec<Shape>) -> Result<Self> {
        if data.len() != shapes.len() {
            return Err(AssemblyError::BlockCountMismatch {
                operation: "HVector::from_blocks",
                left: data.len(),
                right: shapes.len(),
            });
        }
        let out = HVector { shapes, data };
        out.validate()?;
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        for (i, block) in self.data.iter().enumerate() {
            if let Some(v) = block {
                if v.base_sizes() != self.shapes[i].as_slice() {
                    return Err(AssemblyError::BlockShapeMismatch {
                        index: i,
                        declared: self.shapes[i].to_vec(),
                        actual: v.base_sizes().to_vec(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of sub-blocks.
    pub fn n(&self) -> usize {
        self.shapes.len()
    }

    /// The declared base shapes.
    pub fn block_sizes(&self) -> &[Shape] {
        &self.shapes
    }

    /// The declared base shape of block `i`.
    pub fn block_size(&self, i: usize) -> Result<&Shape> {
        self.shapes.get(i).ok_or(AssemblyError::BlockOutOfBounds {
            what: "HVector",
            index: i,
            bound: self.n(),
        })
    }

    /// The value of block `i` (`None` when undefined).
    pub fn get(&self, i: usize) -> Result<Option<&Tensor<T>>> {
        self.data
            .get(i)
            .map(Option::as_ref)
            .ok_or(AssemblyError::BlockOutOfBounds {
                what: "HVector",
                index: i,
                bound: self.shapes.len(),
            })
    }

    /// Set block `i`, validating the base shape.
    pub fn set(&mut self, i: usize, value: Option<Tensor<T>>) -> Result<()> {
        let n = self.n();
        if i >= n {
            return Err(AssemblyError::BlockOutOfBounds {
                what: "HVector",
                index: i,
                bound: n,
            });
        }
        if let Some(v) = &value {
            if v.base_sizes() != self.shapes[i].as_slice() {
                return Err(AssemblyError::BlockShapeMismatch {
                    index: i,
                    declared: self.shapes[i].to_vec(),
                    actual: v.base_sizes().to_vec(),
                });
            }
        }
        self.data[i] = value;
        Ok(())
    }

    /// Iterate over the block values.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Tensor<T>>> {
        self.data.iter().map(Option::as_ref)
    }

    // -------------------------------------------------------------------
    // Block-wise algebra (undefined = additive zero)
    // -------------------------------------------------------------------

    fn check_same_layout(&self, other: &Self, operation: &'static str) -> Result<()> {
        if self.n() != other.n() {
            return Err(AssemblyError::BlockCountMismatch {
                operation,
                left: self.n(),
                right: other.n(),
            });
        }
        Ok(())
    }

    /// Block-wise sum; an undefined block acts as zero.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.check_same_layout(other, "HVector::try_add")?;
        let mut data = Vec::with_capacity(self.n());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            data.push(match (a, b) {
                (Some(a), Some(b)) => Some(a.try_add(b)?),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            });
        }
        Ok(HVector {
            shapes: self.shapes.clone(),
            data,
        })
    }

    /// Block-wise difference; an undefined block acts as zero.
    pub fn try_sub(&self, other: &Self) -> Result<Self>
    where
        T: std::ops::Neg<Output = T>,
    {
        self.check_same_layout(other, "HVector::try_sub")?;
        let mut data = Vec::with_capacity(self.n());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            data.push(match (a, b) {
                (Some(a), Some(b)) => Some(a.try_sub(b)?),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.neg()),
                (None, None) => None,
            });
        }
        Ok(HVector {
            shapes: self.shapes.clone(),
            data,
        })
    }

    /// Multiply every defined block by a scalar.
    pub fn scale(&self, s: T) -> Self {
        HVector {
            shapes: self.shapes.clone(),
            data: self
                .data
                .iter()
                .map(|b| b.as_ref().map(|v| v.scale(s.clone())))
                .collect(),
        }
    }

    /// Divide every defined block by a scalar.
    pub fn div_scalar(&self, s: T) -> Self {
        HVector {
            shapes: self.shapes.clone(),
            data: self
                .data
                .iter()
                .map(|b| b.as_ref().map(|v| v.div_scalar(s.clone())))
                .collect(),
        }
    }

    /// Add another vector into this one in place.
    pub fn update(&mut self, other: &Self) -> Result<()> {
        *self = self.try_add(other)?;
        Ok(())
    }

    /// Block-wise inner product: the sum of per-block base contractions.
    /// Block pairs with an undefined side contribute zero.
    pub fn dot(&self, other: &Self) -> Result<Tensor<T>> {
        self.check_same_layout(other, "HVector::dot")?;
        let mut acc = Tensor::scalar(T::zero());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            if let (Some(a), Some(b)) = (a, b) {
                acc = acc.try_add(&inner(a, b)?)?;
            }
        }
        Ok(acc)
    }

    /// Sum of squared block norms; undefined blocks contribute zero.
    pub fn norm_sq(&self) -> Tensor<T> {
        let mut acc = Tensor::scalar(T::zero());
        for block in self.data.iter().flatten() {
            acc = acc
                .try_add(&norm_sq(block))
                .expect("scalar accumulation cannot mismatch");
        }
        acc
    }

    // -------------------------------------------------------------------
    // Assembly
    // -------------------------------------------------------------------

    /// Assemble the selected blocks into one dense tensor.
    ///
    /// Each selected block's base is flattened to one axis; the dynamic
    /// and intermediate shapes are broadcast across the selection (an
    /// undefined block constrains nothing and is zero-filled at the
    /// broadcast shape). Returns the dense tensor and the per-block split
    /// sizes needed to invert the operation.
    ///
    /// Selecting no blocks at all yields an error; an all-undefined
    /// selection assembles to an unbatched zero vector.
    pub fn assemble(&self, blocks: Option<&[usize]>) -> Result<(Tensor<T>, Vec<usize>)> {
        let indices = select_block_indices(blocks, self.n(), "HVector")?;
        let shapes = select_shapes(&self.shapes, &indices);
        let split_sizes = numels(&shapes);
        tracing::trace!(blocks = indices.len(), "assembling block vector");

        // Flatten each defined block's base to one linear axis.
        let mut flat: Vec<Option<Tensor<T>>> = Vec::with_capacity(indices.len());
        for (&i, len) in indices.iter().zip(split_sizes.iter()) {
            flat.push(match &self.data[i] {
                Some(v) => Some(v.base_reshape(&[*len])?),
                None => None,
            });
        }

        // Broadcast the batch shapes across the selection, expand the
        // defined blocks, and zero-fill the undefined ones.
        let dyn_b = broadcast_dynamic_sizes(&flat)?;
        let intmd_b = broadcast_intmd_sizes(&flat)?;
        let mut pieces = Vec::with_capacity(flat.len());
        for (f, len) in flat.into_iter().zip(split_sizes.iter()) {
            pieces.push(match f {
                Some(v) => v.batch_expand(&dyn_b, &intmd_b)?,
                None => Tensor::zeros(dyn_b.clone(), &intmd_b, &[*len]),
            });
        }

        Ok((base_cat(&pieces, -1)?, split_sizes))
    }

    /// Split an assembled tensor back into the selected blocks.
    ///
    /// Only the selected blocks are written; unselected blocks keep their
    /// current values.
    pub fn disassemble(&mut self, dense: &Tensor<T>, blocks: Option<&[usize]>) -> Result<()> {
        let indices = select_block_indices(blocks, self.n(), "HVector")?;
        let shapes = select_shapes(&self.shapes, &indices);
        let split_sizes = numels(&shapes);
        tracing::trace!(blocks = indices.len(), "disassembling block vector");

        let pieces = dense.base_split(&split_sizes, -1)?;
        for ((piece, &i), shape) in pieces.into_iter().zip(indices.iter()).zip(shapes.iter()) {
            self.data[i] = Some(piece.base_reshape(shape)?);
        }
        Ok(())
    }
}

impl<T> HVector<T>
where
    T: Float,
{
    /// Norm of the whole vector.
    pub fn norm(&self) -> Tensor<T> {
        self.norm_sq().map(|x| x.sqrt())
    }
}

impl<T: Clone + Num + std::ops::Neg<Output = T>> std::ops::Neg for &HVector<T> {
    type Output = HVector<T>;

    fn neg(self) -> HVector<T> {
        HVector {
            shapes: self.shapes.clone(),
            data: self
                .data
                .iter()
                .map(|b| b.as_ref().map(|v| v.neg()))
                .collect(),
        }
    }
}
