//! Elementwise arithmetic with three-group broadcasting
//!
//! Binary operations broadcast each of the three groups independently
//! (dynamic against dynamic, intermediate against intermediate, base
//! against base), so a per-slip-system quantity combines with a shared
//! scalar without the caller lining ranks up by hand.
//!
//! The checked `try_*` methods report mismatches as
//! [`TensorError::ShapeMismatch`]; the `std::ops` operators delegate to
//! them and panic on failure, mirroring the runtime's own operator
//! behavior.

use super::Tensor;
use crate::error::{Result, TensorError};
use crate::shape;
use num_traits::{Float, Num};

impl<T> Tensor<T>
where
    T: Clone + Num,
{
    /// Broadcast two tensors to their common group shapes.
    pub(crate) fn broadcast_with(&self, other: &Self) -> Result<(Self, Self)> {
        let dyn_b = shape::broadcast_dyn_shapes(&[&self.dynamic_sizes, &other.dynamic_sizes])?;
        let intmd_b = shape::broadcast_shapes(&[self.intmd_sizes(), other.intmd_sizes()])?;
        let base_b = shape::broadcast_shapes(&[self.base_sizes(), other.base_sizes()])?;
        let a = self
            .dynamic_expand(&dyn_b)?
            .intmd_expand(&intmd_b)?
            .base_expand(&base_b)?;
        let b = other
            .dynamic_expand(&dyn_b)?
            .intmd_expand(&intmd_b)?
            .base_expand(&base_b)?;
        Ok((a, b))
    }

    fn binary(&self, other: &Self, op: &'static str, f: impl Fn(T, T) -> T) -> Result<Self> {
        let (a, b) = self.broadcast_with(other).map_err(|e| match e {
            TensorError::ShapeMismatch { reason, expected, actual, .. } => {
                TensorError::ShapeMismatch {
                    operation: op,
                    expected,
                    actual,
                    reason,
                }
            }
            other => other,
        })?;
        let mut data = a.data;
        ndarray::Zip::from(&mut data).and(&b.data).for_each(|x, y| {
            *x = f(x.clone(), y.clone());
        });
        Ok(Tensor {
            data,
            dynamic_sizes: a.dynamic_sizes,
            intmd_dim: a.intmd_dim,
        })
    }

    /// Elementwise sum with three-group broadcasting.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.binary(other, "add", |x, y| x + y)
    }

    /// Elementwise difference with three-group broadcasting.
    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.binary(other, "sub", |x, y| x - y)
    }

    /// Elementwise product with three-group broadcasting.
    pub fn try_mul(&self, other: &Self) -> Result<Self> {
        self.binary(other, "mul", |x, y| x * y)
    }

    /// Elementwise quotient with three-group broadcasting.
    pub fn try_div(&self, other: &Self) -> Result<Self> {
        self.binary(other, "div", |x, y| x / y)
    }

    /// Map every element through `f`.
    pub fn map(&self, f: impl Fn(T) -> T) -> Self {
        let data = self.data.mapv(f);
        self.retag(data)
    }

    /// Multiply every element by `s`.
    pub fn scale(&self, s: T) -> Self {
        self.map(|x| x * s.clone())
    }

    /// Add `s` to every element.
    pub fn add_scalar(&self, s: T) -> Self {
        self.map(|x| x + s.clone())
    }

    /// Subtract `s` from every element.
    pub fn sub_scalar(&self, s: T) -> Self {
        self.map(|x| x - s.clone())
    }

    /// Divide every element by `s`.
    pub fn div_scalar(&self, s: T) -> Self {
        self.map(|x| x / s.clone())
    }
}

impl<T> Tensor<T>
where
    T: Clone + Num + std::ops::Neg<Output = T>,
{
    /// Elementwise negation.
    pub fn neg(&self) -> Self {
        self.map(|x| -x)
    }
}

/// Inner product over the base axes.
///
/// The operands are broadcast across all three groups, multiplied, and
/// summed over every base axis; the result has an empty base group and the
/// broadcast dynamic/intermediate shapes.
pub fn inner<T: Clone + Num>(a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    let prod = a.try_mul(b)?;
    let mut out = prod;
    for _ in 0..out.base_dim() {
        out = out.base_sum(-1)?;
    }
    Ok(out)
}

/// Squared norm over the base axes.
pub fn norm_sq<T: Clone + Num>(a: &Tensor<T>) -> Tensor<T> {
    let sq = a.map(|x| x.clone() * x);
    let mut out = sq;
    while out.base_dim() > 0 {
        out = out
            .base_sum(-1)
            .expect("base axes exist while base_dim > 0");
    }
    out
}

/// Norm over the base axes.
pub fn norm<T: Float>(a: &Tensor<T>) -> Tensor<T> {
    norm_sq(a).map(|x| x.sqrt())
}

impl<T> Tensor<T>
where
    T: Float,
{
    /// Elementwise approximate equality after broadcasting.
    pub fn allclose(&self, other: &Self, tol: T) -> bool {
        match self.broadcast_with(other) {
            Ok((a, b)) => a
                .data
                .iter()
                .zip(b.data.iter())
                .all(|(&x, &y)| (x - y).abs() <= tol),
            Err(_) => false,
        }
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $checked:ident) => {
        impl<T: Clone + Num> std::ops::$trait<&Tensor<T>> for &Tensor<T> {
            type Output = Tensor<T>;

            /// Panics when the operands are not broadcastable; use the
            /// checked method to handle the error instead.
            fn $method(self, rhs: &Tensor<T>) -> Tensor<T> {
                match self.$checked(rhs) {
                    Ok(out) => out,
                    Err(e) => panic!("{e}"),
                }
            }
        }
    };
}

impl_binop!(Add, add, try_add);
impl_binop!(Sub, sub, try_sub);
impl_binop!(Mul, mul, try_mul);
impl_binop!(Div, div, try_div);

impl<T: Clone + Num + std::ops::Neg<Output = T>> std::ops::Neg for &Tensor<T> {
    type Output = Tensor<T>;

    fn neg(self) -> Tensor<T> {
        Tensor::neg(self)
    }
}

macro_rules! impl_assign {
    ($trait:ident, $method:ident, $checked:ident) => {
        impl<T: Clone + Num> std::ops::$trait<&Tensor<T>> for Tensor<T> {
            /// Panics when the operands are not broadcastable.
            fn $method(&mut self, rhs: &Tensor<T>) {
                match self.$checked(rhs) {
                    Ok(out) => *self = out,
                    Err(e) => panic!("{e}"),
                }
            }
        }
    };
}

impl_assign!(AddAssign, add_assign, try_add);
impl_assign!(SubAssign, sub_assign, try_sub);
impl_assign!(MulAssign, mul_assign, try_mul);
impl_assign!(DivAssign, div_assign, try_div);
