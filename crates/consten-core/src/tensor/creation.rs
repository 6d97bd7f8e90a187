//! Tensor factories
//!
//! Factories take the three group shapes separately; the `*_base` variants
//! build unbatched tensors (empty dynamic and intermediate groups).

use super::Tensor;
use crate::error::{Result, TensorError};
use crate::shape::{self, DynShape, Shape};
use ndarray::{ArrayD, IxDyn};
use num_traits::{Float, Num, NumCast};
use rand::Rng;

fn full_shape(dynamic: &DynShape, intmd: &[usize], base: &[usize]) -> Shape {
    let d = dynamic.concrete();
    shape::concat_shapes(&[d.as_slice(), intmd, base])
}

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Zero-filled tensor with the given group shapes.
    pub fn zeros(dynamic: DynShape, intmd: &[usize], base: &[usize]) -> Self {
        let shape = full_shape(&dynamic, intmd, base);
        Tensor {
            data: ArrayD::zeros(IxDyn(&shape)),
            dynamic_sizes: dynamic,
            intmd_dim: intmd.len(),
        }
    }

    /// Unbatched zero tensor with the given base shape.
    pub fn zeros_base(base: &[usize]) -> Self {
        Self::zeros(DynShape::empty(), &[], base)
    }

    /// Uninitialized-value tensor with the given group shapes.
    ///
    /// The runtime has no uninitialized allocation, so the contents are
    /// zeros; only the intent ("will be overwritten") differs.
    pub fn empty(dynamic: DynShape, intmd: &[usize], base: &[usize]) -> Self {
        Self::zeros(dynamic, intmd, base)
    }

    /// Tensor with the same group shapes as `other`, intended to be
    /// overwritten.
    pub fn empty_like(other: &Self) -> Self {
        Self::zeros_like(other)
    }

    /// One-filled tensor with the given group shapes.
    pub fn ones(dynamic: DynShape, intmd: &[usize], base: &[usize]) -> Self {
        Self::full(dynamic, intmd, base, T::one())
    }

    /// Unbatched one-filled tensor with the given base shape.
    pub fn ones_base(base: &[usize]) -> Self {
        Self::ones(DynShape::empty(), &[], base)
    }

    /// Tensor filled with `value`.
    pub fn full(dynamic: DynShape, intmd: &[usize], base: &[usize], value: T) -> Self {
        let shape = full_shape(&dynamic, intmd, base);
        Tensor {
            data: ArrayD::from_elem(IxDyn(&shape), value),
            dynamic_sizes: dynamic,
            intmd_dim: intmd.len(),
        }
    }

    /// Unbatched tensor filled with `value`.
    pub fn full_base(base: &[usize], value: T) -> Self {
        Self::full(DynShape::empty(), &[], base, value)
    }

    /// A scalar: empty in all three groups.
    pub fn scalar(value: T) -> Self {
        Self::full_base(&[], value)
    }

    /// Unbatched identity matrix with base shape `(n, n)`.
    pub fn identity(n: usize) -> Self {
        let mut t = Self::zeros_base(&[n, n]);
        for i in 0..n {
            t.data[IxDyn(&[i, i])] = T::one();
        }
        t
    }

    /// Identity matrix broadcast over the given dynamic and intermediate
    /// shapes.
    pub fn identity_batched(dynamic: DynShape, intmd: &[usize], n: usize) -> Result<Self> {
        Self::identity(n).batch_expand(&dynamic, intmd)
    }

    /// Build a tensor from flat row-major data and the three group shapes.
    ///
    /// Fails with [`TensorError::Shape`] when the data length does not
    /// match the storage size implied by the shapes.
    pub fn from_vec(
        data: Vec<T>,
        dynamic: DynShape,
        intmd: &[usize],
        base: &[usize],
    ) -> Result<Self> {
        let shape = full_shape(&dynamic, intmd, base);
        let expected = shape::storage_size(&shape);
        if data.len() != expected {
            return Err(TensorError::Shape {
                shape,
                reason: format!("shape requires {} elements, got {}", expected, data.len()),
            });
        }
        let array = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| TensorError::Shape {
            shape: Shape::new(),
            reason: e.to_string(),
        })?;
        Ok(Tensor {
            data: array,
            dynamic_sizes: dynamic,
            intmd_dim: intmd.len(),
        })
    }

    /// Build an unbatched tensor from flat row-major data and a base shape.
    pub fn from_base_vec(data: Vec<T>, base: &[usize]) -> Result<Self> {
        Self::from_vec(data, DynShape::empty(), &[], base)
    }

    /// Zero tensor with the same group shapes as `other`.
    pub fn zeros_like(other: &Self) -> Self {
        Self::zeros(
            other.dynamic_sizes.clone(),
            other.intmd_sizes(),
            other.base_sizes(),
        )
    }

    /// One-filled tensor with the same group shapes as `other`.
    pub fn ones_like(other: &Self) -> Self {
        Self::full_like(other, T::one())
    }

    /// Tensor filled with `value`, with the same group shapes as `other`.
    pub fn full_like(other: &Self, value: T) -> Self {
        Self::full(
            other.dynamic_sizes.clone(),
            other.intmd_sizes(),
            other.base_sizes(),
            value,
        )
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num + NumCast,
{
    /// Tensor with uniform random values in `[0, 1)`.
    pub fn rand(dynamic: DynShape, intmd: &[usize], base: &[usize]) -> Self {
        let shape = full_shape(&dynamic, intmd, base);
        let mut rng = rand::thread_rng();
        let total = shape::storage_size(&shape);
        let data: Vec<T> = (0..total)
            .map(|_| T::from(rng.gen::<f64>()).expect("float sample must convert"))
            .collect();
        Tensor {
            data: ArrayD::from_shape_vec(IxDyn(&shape), data)
                .expect("storage size was computed from the shape"),
            dynamic_sizes: dynamic,
            intmd_dim: intmd.len(),
        }
    }
}

impl<T> Tensor<T>
where
    T: Float,
{
    /// Insert a new dynamic axis at `dim` interpolating linearly between
    /// `start` and `end` over `nstep` steps.
    ///
    /// `start` and `end` must be broadcastable; the new axis is inserted
    /// into the broadcast dynamic shape at `dim`.
    pub fn linspace(start: &Self, end: &Self, nstep: usize, dim: isize) -> Result<Self> {
        if nstep == 0 {
            return Err(TensorError::Shape {
                shape: Shape::new(),
                reason: "linspace requires at least one step".into(),
            });
        }
        let a = start.dynamic_unsqueeze(dim)?;
        if nstep == 1 {
            return Ok(a);
        }
        let b = end.dynamic_unsqueeze(dim)?;
        let d = shape::normalize_insert_axis(dim, 0, start.dynamic_dim().max(end.dynamic_dim()))?;
        let bd = a.dynamic_dim().max(b.dynamic_dim());

        // Step fractions, aligned with the new dynamic axis.
        let denom = T::from(nstep - 1).expect("step count must convert");
        let fractions: Vec<T> = (0..nstep)
            .map(|i| T::from(i).expect("step index must convert") / denom)
            .collect();
        let mut steps = Tensor::from_vec(
            fractions,
            DynShape::from_concrete(&[nstep]),
            &[],
            &[],
        )?;
        for _ in 0..bd - d - 1 {
            steps = steps.dynamic_unsqueeze(-1)?;
        }

        let diff = b.try_sub(&a)?;
        a.try_add(&steps.try_mul(&diff)?)
    }
}
