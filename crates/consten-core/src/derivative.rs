//! Multi-argument derivative bookkeeping
//!
//! A [`Derivative`] records ∂(variable)/∂(arg₁ … argₙ) together with the
//! shape metadata needed to interpret its intermediate axes. The trailing
//! part of the intermediate group — the *intrinsic* intermediate axes — is
//! structurally tied to the operands' own definitions (one axis per slip
//! system, per sub-model instance, …); the leading part is batching shared
//! with everything else.
//!
//! Two storage forms exist. In **broadcast** form only the variable's
//! intrinsic axes are materialized and the arguments share them implicitly;
//! in **full** form every operand's intrinsic axes are explicitly present,
//! block-diagonal where operands differ. [`Derivative::fullify`]
//! materializes the former into the latter lazily; nothing is expanded
//! until a consumer (typically equation assembly) actually needs the full
//! layout.

use crate::error::{Result, TensorError};
use crate::shape::{self, Shape};
use crate::tensor::Tensor;
use num_traits::Num;

/// Pretty-print a derivative name: `d(y)/d(x)`, `d2(y)/d(x)d(z)`.
pub fn derivative_name(var_name: &str, arg_names: &[&str]) -> String {
    let mut name = String::from("d");
    if arg_names.len() > 1 {
        name.push_str(&arg_names.len().to_string());
    }
    name.push_str(&format!("({})/", var_name));
    for arg in arg_names {
        name.push_str(&format!("d({})", arg));
    }
    name
}

/// Storage form of an assigned derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeRepr {
    /// No tensor assigned
    Empty,
    /// Only the variable's intrinsic intermediate axes are materialized
    Broadcast,
    /// All operands' intrinsic intermediate axes are materialized
    Full,
}

/// Derivative of one variable with respect to `N` ordered arguments.
#[derive(Debug, Clone)]
pub struct Derivative<T, const N: usize> {
    /// Declared number of trailing intermediate axes of an assigned value
    /// that are intrinsic (as opposed to shared batching)
    intrinsic_dim: usize,
    /// Number of trailing intermediate axes intrinsic to the variable
    var_intrinsic_dim: usize,
    /// Number of trailing intermediate axes intrinsic to each argument
    arg_intrinsic_dims: [usize; N],
    var_intmd: Shape,
    arg_intmd: [Shape; N],
    var_base: Shape,
    arg_base: [Shape; N],
    var_name: String,
    arg_names: [String; N],
    /// The derivative value, normalized to broadcast or full form
    value: Option<Tensor<T>>,
    /// Intrinsic dimension count of the stored (normalized) tensor
    stored_intrinsic_dim: usize,
    /// Intermediate dimension observed at the last assignment. `clear()`
    /// does not invalidate this cache.
    cached_intmd_dim: usize,
}

impl<T, const N: usize> Derivative<T, N>
where
    T: Clone + Num,
{
    /// Declare a derivative.
    ///
    /// `intrinsic_dim` is the number of trailing intermediate axes an
    /// assigned value carries as intrinsic; it must not exceed the
    /// variable's intrinsic dimension unless it equals the total across
    /// all operands (checked in debug builds, like the per-operand
    /// consistency of the intrinsic counts against the intermediate
    /// ranks).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intrinsic_dim: usize,
        var_intrinsic_dim: usize,
        arg_intrinsic_dims: [usize; N],
        var_intmd: &[usize],
        arg_intmd: [&[usize]; N],
        var_base: &[usize],
        arg_base: [&[usize]; N],
    ) -> Self {
        debug_assert!(
            var_intrinsic_dim <= var_intmd.len(),
            "the variable's intrinsic intermediate dimension exceeds its intermediate rank"
        );
        for i in 0..N {
            debug_assert!(
                arg_intrinsic_dims[i] <= arg_intmd[i].len(),
                "argument {i}'s intrinsic intermediate dimension exceeds its intermediate rank"
            );
        }
        let total = var_intrinsic_dim + arg_intrinsic_dims.iter().sum::<usize>();
        debug_assert!(
            intrinsic_dim <= var_intrinsic_dim || intrinsic_dim == total,
            "the derivative's intrinsic intermediate dimension must not exceed the variable's, \
             or must equal the total across all operands"
        );

        Derivative {
            intrinsic_dim,
            var_intrinsic_dim,
            arg_intrinsic_dims,
            var_intmd: Shape::from_slice(var_intmd),
            arg_intmd: arg_intmd.map(Shape::from_slice),
            var_base: Shape::from_slice(var_base),
            arg_base: arg_base.map(Shape::from_slice),
            var_name: String::new(),
            arg_names: std::array::from_fn(|_| String::new()),
            value: None,
            stored_intrinsic_dim: 0,
            cached_intmd_dim: 0,
        }
    }

    /// Attach debug names used in error messages.
    pub fn with_names(mut self, var_name: &str, arg_names: [&str; N]) -> Self {
        self.var_name = var_name.to_string();
        self.arg_names = arg_names.map(|s| s.to_string());
        self
    }

    /// The derivative's display name.
    pub fn name(&self) -> String {
        let refs: Vec<&str> = self.arg_names.iter().map(String::as_str).collect();
        derivative_name(&self.var_name, &refs)
    }

    /// The variable's name.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    /// The `i`-th argument's name.
    pub fn arg_name(&self, i: usize) -> &str {
        &self.arg_names[i]
    }

    // -------------------------------------------------------------------
    // Shape metadata
    // -------------------------------------------------------------------

    /// Declared intrinsic intermediate dimension of assigned values.
    pub fn intrinsic_dim(&self) -> usize {
        self.intrinsic_dim
    }

    /// The variable's intrinsic intermediate dimension.
    pub fn var_intrinsic_dim(&self) -> usize {
        self.var_intrinsic_dim
    }

    /// Argument `i`'s intrinsic intermediate dimension.
    pub fn arg_intrinsic_dim(&self, i: usize) -> usize {
        self.arg_intrinsic_dims[i]
    }

    /// Total intrinsic intermediate dimension across all operands.
    pub fn total_intrinsic_dim(&self) -> usize {
        self.var_intrinsic_dim + self.arg_intrinsic_dims.iter().sum::<usize>()
    }

    /// The variable's intermediate shape.
    pub fn var_intmd_sizes(&self) -> &[usize] {
        &self.var_intmd
    }

    /// Argument `i`'s intermediate shape.
    pub fn arg_intmd_sizes(&self, i: usize) -> &[usize] {
        &self.arg_intmd[i]
    }

    /// The variable's intrinsic intermediate shape (the trailing
    /// `var_intrinsic_dim` axes of its intermediate shape).
    pub fn var_intrinsic_sizes(&self) -> &[usize] {
        &self.var_intmd[self.var_intmd.len() - self.var_intrinsic_dim..]
    }

    /// Argument `i`'s intrinsic intermediate shape.
    pub fn arg_intrinsic_sizes(&self, i: usize) -> &[usize] {
        let s = &self.arg_intmd[i];
        &s[s.len() - self.arg_intrinsic_dims[i]..]
    }

    /// The variable's base shape.
    pub fn var_base_sizes(&self) -> &[usize] {
        &self.var_base
    }

    /// Argument `i`'s base shape.
    pub fn arg_base_sizes(&self, i: usize) -> &[usize] {
        &self.arg_base[i]
    }

    /// The derivative's base shape: the concatenation of the variable's
    /// and every argument's base shapes.
    pub fn base_sizes(&self) -> Shape {
        let mut out = self.var_base.clone();
        for b in &self.arg_base {
            out.extend_from_slice(b);
        }
        out
    }

    /// Total base dimension.
    pub fn base_dim(&self) -> usize {
        self.var_base.len() + self.arg_base.iter().map(|b| b.len()).sum::<usize>()
    }

    /// The intermediate dimension cached at the last assignment.
    pub fn intmd_dim(&self) -> usize {
        self.cached_intmd_dim
    }

    /// The concatenation of every operand's intrinsic intermediate shape.
    fn total_intrinsic_sizes(&self) -> Shape {
        let mut out = Shape::from_slice(self.var_intrinsic_sizes());
        for i in 0..N {
            out.extend_from_slice(self.arg_intrinsic_sizes(i));
        }
        out
    }

    // -------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------

    /// Whether a value is assigned.
    pub fn defined(&self) -> bool {
        self.value.is_some()
    }

    /// Remove the value. The shape metadata and the cached intermediate
    /// dimension are kept.
    pub fn clear(&mut self) {
        self.value = None;
    }

    /// The storage form of the current value.
    pub fn repr(&self) -> DerivativeRepr {
        match &self.value {
            None => DerivativeRepr::Empty,
            Some(_) if self.stored_intrinsic_dim == self.total_intrinsic_dim() => {
                DerivativeRepr::Full
            }
            Some(_) => DerivativeRepr::Broadcast,
        }
    }

    /// Whether the stored value is in broadcast form over the intrinsic
    /// intermediate axes.
    pub fn is_intrinsic_broadcast(&self) -> bool {
        self.repr() == DerivativeRepr::Broadcast
    }

    /// The stored derivative tensor.
    ///
    /// Fails with [`TensorError::Undefined`] when nothing was assigned. In
    /// debug builds the cached intermediate dimension is validated against
    /// the stored tensor.
    pub fn tensor(&self) -> Result<&Tensor<T>> {
        let t = self
            .value
            .as_ref()
            .ok_or_else(|| TensorError::Undefined(format!("derivative '{}'", self.name())))?;
        debug_assert_eq!(
            t.intmd_dim(),
            self.cached_intmd_dim,
            "derivative '{}' was read in a different intermediate-dimension context than it \
             was written in",
            self.name()
        );
        Ok(t)
    }

    // -------------------------------------------------------------------
    // Assignment
    // -------------------------------------------------------------------

    /// Normalize an incoming value: pad the intermediate group up to the
    /// declared intrinsic dimension, then either accept it as full form or
    /// expand its intrinsic block to the variable's intrinsic shape.
    fn normalize(&self, val: &Tensor<T>) -> Result<Tensor<T>> {
        let mut v = val.clone();
        if v.intmd_dim() < self.intrinsic_dim {
            v = v.intmd_unsqueeze_n(-1, self.intrinsic_dim - v.intmd_dim())?;
        }

        let im = Shape::from_slice(v.intmd_sizes());
        let cur_iis = &im[im.len() - self.intrinsic_dim..];
        let total = self.total_intrinsic_sizes();
        if cur_iis == total.as_slice() {
            return Ok(v);
        }

        let var_iis = Shape::from_slice(self.var_intrinsic_sizes());
        if !shape::expandable_to(cur_iis, &var_iis) {
            return Err(TensorError::mismatch(
                "derivative assignment",
                var_iis,
                Shape::from_slice(cur_iis),
                format!(
                    "the intrinsic intermediate shape assigned to '{}' is not broadcastable \
                     to the variable's intrinsic intermediate shape",
                    self.name()
                ),
            ));
        }

        let ex_len = v.intmd_dim() - self.intrinsic_dim;
        if self.intrinsic_dim < var_iis.len() {
            v = v.intmd_unsqueeze_n(ex_len as isize, var_iis.len() - self.intrinsic_dim)?;
        }
        let target = shape::concat_shapes(&[&im[..ex_len], &var_iis]);
        v.intmd_expand(&target)
    }

    /// Classify a normalized tensor's intrinsic dimension count.
    fn classify(&self, t: &Tensor<T>) -> usize {
        let total = self.total_intrinsic_sizes();
        let im = t.intmd_sizes();
        if im.len() >= total.len() && im[im.len() - total.len()..] == total[..] {
            self.total_intrinsic_dim()
        } else {
            self.var_intrinsic_dim
        }
    }

    /// Assign a value (the `=` of the original interface).
    ///
    /// The value's base shape must equal [`base_sizes`](Self::base_sizes);
    /// its intermediate block is normalized as described on the type. The
    /// intermediate dimension at assignment time is cached and validated
    /// on reads.
    pub fn assign(&mut self, val: &Tensor<T>) -> Result<()> {
        if val.base_sizes() != self.base_sizes().as_slice() {
            return Err(TensorError::mismatch(
                "derivative assignment",
                self.base_sizes(),
                Shape::from_slice(val.base_sizes()),
                format!("incompatible base shape assigned to '{}'", self.name()),
            ));
        }
        let t = self.normalize(val)?;
        self.stored_intrinsic_dim = self.classify(&t);
        self.cached_intmd_dim = t.intmd_dim();
        self.value = Some(t);
        Ok(())
    }

    /// Accumulate a value (the `+=` of the original interface).
    pub fn accumulate(&mut self, val: &Tensor<T>) -> Result<()> {
        if val.base_sizes() != self.base_sizes().as_slice() {
            return Err(TensorError::mismatch(
                "derivative accumulation",
                self.base_sizes(),
                Shape::from_slice(val.base_sizes()),
                format!("incompatible base shape assigned to '{}'", self.name()),
            ));
        }
        let incoming = self.normalize(val)?;
        let t = match self.value.take() {
            Some(existing) => existing.try_add(&incoming)?,
            None => incoming,
        };
        self.stored_intrinsic_dim = self.classify(&t);
        self.cached_intmd_dim = t.intmd_dim();
        self.value = Some(t);
        Ok(())
    }

    /// Accumulate another derivative's value.
    pub fn accumulate_deriv(&mut self, other: &Derivative<T, N>) -> Result<()> {
        self.intrinsic_dim = other.intrinsic_dim;
        let val = other.tensor()?.clone();
        self.accumulate(&val)
    }

    /// Materialize the full representation.
    ///
    /// Identity when the value is already full. Otherwise the variable's
    /// intrinsic axes are flattened, diagonally embedded once per
    /// argument, reshaped to the inflated per-operand layout, and each
    /// argument block is sum-reduced down to its declared intrinsic shape
    /// (the adjoint of broadcasting, for arguments batched independently
    /// of the variable). Deterministic, so repeated calls return identical
    /// results.
    pub fn fullify(&self) -> Result<Tensor<T>> {
        let t = self.tensor()?;
        let mut operands: Vec<&[usize]> = Vec::with_capacity(N + 1);
        operands.push(self.var_intrinsic_sizes());
        for i in 0..N {
            operands.push(self.arg_intrinsic_sizes(i));
        }
        fullify_tensor(t, self.stored_intrinsic_dim, &operands)
    }
}

/// Materialize a broadcast-form derivative tensor into full form.
///
/// `intrinsic_dim` locates the trailing intermediate axes of `t` that
/// currently represent the intrinsic block; `operand_intrinsic_shapes`
/// lists the declared intrinsic shapes of the variable (first) and each
/// argument. When the block already equals the concatenation of all
/// operand shapes the tensor is returned unchanged.
pub fn fullify_tensor<T: Clone + Num>(
    t: &Tensor<T>,
    intrinsic_dim: usize,
    operand_intrinsic_shapes: &[&[usize]],
) -> Result<Tensor<T>> {
    let k = operand_intrinsic_shapes.len();
    debug_assert!(k >= 1, "fullify needs at least the variable's shape");
    if intrinsic_dim > t.intmd_dim() {
        return Err(TensorError::mismatch(
            "fullify",
            Shape::from_slice(t.intmd_sizes()),
            Shape::new(),
            format!(
                "intrinsic dimension {} exceeds the intermediate dimension {}",
                intrinsic_dim,
                t.intmd_dim()
            ),
        ));
    }

    let im = Shape::from_slice(t.intmd_sizes());
    let cur_iis = &im[im.len() - intrinsic_dim..];
    let total = shape::concat_shapes(operand_intrinsic_shapes);
    if cur_iis == total.as_slice() {
        return Ok(t.clone());
    }

    let var_iis = operand_intrinsic_shapes[0];
    if !shape::expandable_to(cur_iis, var_iis) {
        return Err(TensorError::mismatch(
            "fullify",
            Shape::from_slice(var_iis),
            Shape::from_slice(cur_iis),
            "the intrinsic block is not broadcastable to the variable's intrinsic shape",
        ));
    }
    if var_iis.is_empty() {
        return Err(TensorError::mismatch(
            "fullify",
            total,
            Shape::from_slice(cur_iis),
            "cannot materialize argument intrinsic axes from a variable with none",
        ));
    }

    let ex_len = t.intmd_dim() - intrinsic_dim;
    let ex = Shape::from_slice(&im[..ex_len]);

    // Align and expand the intrinsic block to the variable's shape.
    let mut v = t.clone();
    if intrinsic_dim < var_iis.len() {
        v = v.intmd_unsqueeze_n(ex_len as isize, var_iis.len() - intrinsic_dim)?;
    }
    v = v.intmd_expand(&shape::concat_shapes(&[&ex, var_iis]))?;

    // Flatten the block and embed it diagonally once per argument.
    v = v.intmd_flatten_from(ex_len)?;
    for _ in 1..k {
        v = v.intmd_diagonalize(-1)?;
    }

    // Unflatten to the inflated layout: the variable's intrinsic shape
    // repeated for every operand.
    let mut inflated = ex.clone();
    for _ in 0..k {
        inflated.extend_from_slice(var_iis);
    }
    v = v.intmd_reshape(&inflated)?;

    // Sum each argument block down to its declared intrinsic shape. This
    // is the broadcasting adjoint: an argument batched more coarsely than
    // the variable receives the sum of the contributions it was broadcast
    // over.
    let mut padded = shape::concat_shapes(&[&ex, var_iis]);
    let mut final_shape = shape::concat_shapes(&[&ex, var_iis]);
    for s in &operand_intrinsic_shapes[1..] {
        padded.extend_from_slice(&shape::pad_prepend(s, var_iis.len(), 1));
        final_shape.extend_from_slice(s);
    }
    v.intmd_sum_to_shape(&padded)?.intmd_reshape(&final_shape)
}

impl<T: Clone + Num> Derivative<T, 1> {
    /// Re-declare the derivative with `additional` extra intrinsic
    /// intermediate dimensions on both the variable and the argument,
    /// renormalizing the stored value.
    ///
    /// Only supported while the stored value is in broadcast form matching
    /// the variable's intrinsic shape.
    pub fn reinterpret(&self, additional: usize) -> Result<Derivative<T, 1>> {
        let t = self.tensor()?.clone();
        let im = t.intmd_sizes();
        let stored_iis = &im[im.len() - self.stored_intrinsic_dim..];
        if stored_iis != self.var_intrinsic_sizes() {
            return Err(TensorError::mismatch(
                "reinterpret",
                Shape::from_slice(self.var_intrinsic_sizes()),
                Shape::from_slice(stored_iis),
                format!(
                    "reinterpretation of '{}' requires the stored intrinsic shape to match \
                     the variable's intrinsic shape",
                    self.name()
                ),
            ));
        }

        let mut out = Derivative::<T, 1>::new(
            self.intrinsic_dim + additional,
            self.var_intrinsic_dim + additional,
            [self.arg_intrinsic_dims[0] + additional],
            &self.var_intmd,
            [&self.arg_intmd[0]],
            &self.var_base,
            [&self.arg_base[0]],
        );
        out.var_name = self.var_name.clone();
        out.arg_names = self.arg_names.clone();
        out.assign(&t)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------
// Intrinsic-intermediate axis movement
// ---------------------------------------------------------------------

/// Re-tag the trailing `n` intermediate axes as leading base axes.
pub fn pop_intrinsic_intmd<T: Clone + Num>(t: &Tensor<T>, n: usize) -> Result<Tensor<T>> {
    if n > t.intmd_dim() {
        return Err(TensorError::out_of_bounds(
            "intermediate axes to pop",
            n as isize,
            t.intmd_dim(),
        ));
    }
    Tensor::from_parts(
        t.array().clone(),
        t.dynamic_sizes().clone(),
        t.intmd_dim() - n,
    )
}

/// Re-tag the leading `n` base axes as trailing intermediate axes.
pub fn push_intrinsic_intmd<T: Clone + Num>(t: &Tensor<T>, n: usize) -> Result<Tensor<T>> {
    if n > t.base_dim() {
        return Err(TensorError::out_of_bounds(
            "base axes to push",
            n as isize,
            t.base_dim(),
        ));
    }
    Tensor::from_parts(
        t.array().clone(),
        t.dynamic_sizes().clone(),
        t.intmd_dim() + n,
    )
}

/// Physically interleave per-operand intrinsic intermediate blocks with
/// their base blocks.
///
/// The input has layout `(dynamic ; extrinsic, iis₀ … iisₖ ; base₀ …
/// baseₖ)`; the output has `(dynamic ; extrinsic ; iis₀, base₀, iis₁,
/// base₁, …)` with only the extrinsic axes left in the intermediate group.
/// `intrinsic_dims[i]`/`base_dims[i]` give the axis counts of block `i`.
pub fn pop_intrinsic_intmd_blocks<T: Clone + Num>(
    t: &Tensor<T>,
    intrinsic_dims: &[usize],
    base_dims: &[usize],
) -> Result<Tensor<T>> {
    let total_i: usize = intrinsic_dims.iter().sum();
    let total_b: usize = base_dims.iter().sum();
    if total_i > t.intmd_dim() || total_b != t.base_dim() {
        return Err(TensorError::mismatch(
            "pop_intrinsic_intmd_blocks",
            Shape::from_slice(t.static_sizes()),
            Shape::new(),
            format!(
                "cannot pop {} intermediate axes / {} base axes from a ({}, {}) layout",
                total_i,
                total_b,
                t.intmd_dim(),
                t.base_dim()
            ),
        ));
    }

    let d = t.dynamic_dim();
    let ex = t.intmd_dim() - total_i;
    let mut perm: Vec<usize> = (0..d + ex).collect();
    let mut i_start = d + ex;
    let mut b_start = t.batch_dim();
    for (ni, nb) in intrinsic_dims.iter().zip(base_dims.iter()) {
        perm.extend(i_start..i_start + ni);
        perm.extend(b_start..b_start + nb);
        i_start += ni;
        b_start += nb;
    }
    let data = crate::tensor::permute_raw(t.array(), &perm);
    Tensor::from_parts(data, t.dynamic_sizes().clone(), ex)
}

/// Inverse of [`pop_intrinsic_intmd_blocks`]: gather interleaved intrinsic
/// blocks back into the intermediate group.
pub fn push_intrinsic_intmd_blocks<T: Clone + Num>(
    t: &Tensor<T>,
    intrinsic_dims: &[usize],
    base_dims: &[usize],
) -> Result<Tensor<T>> {
    let total_i: usize = intrinsic_dims.iter().sum();
    let total_b: usize = base_dims.iter().sum();
    if total_i + total_b != t.base_dim() {
        return Err(TensorError::mismatch(
            "push_intrinsic_intmd_blocks",
            Shape::from_slice(t.base_sizes()),
            Shape::new(),
            format!(
                "interleaved layout needs {} base axes, found {}",
                total_i + total_b,
                t.base_dim()
            ),
        ));
    }

    let prefix = t.batch_dim();
    let mut perm: Vec<usize> = (0..prefix).collect();
    // intrinsic blocks first, in operand order
    let mut pos = prefix;
    for (ni, nb) in intrinsic_dims.iter().zip(base_dims.iter()) {
        perm.extend(pos..pos + ni);
        pos += ni + nb;
    }
    // then the base blocks
    let mut pos = prefix;
    for (ni, nb) in intrinsic_dims.iter().zip(base_dims.iter()) {
        perm.extend(pos + ni..pos + ni + nb);
        pos += ni + nb;
    }
    let data = crate::tensor::permute_raw(t.array(), &perm);
    Tensor::from_parts(data, t.dynamic_sizes().clone(), t.intmd_dim() + total_i)
}

/// Fullify a first-order derivative and interleave its intrinsic axes with
/// the operand base blocks, producing the layout equation assembly
/// consumes.
pub fn pop_intrinsic_intmd_deriv<T: Clone + Num>(deriv: &Derivative<T, 1>) -> Result<Tensor<T>> {
    let full = deriv.fullify()?;
    pop_intrinsic_intmd_blocks(
        &full,
        &[deriv.var_intrinsic_dim(), deriv.arg_intrinsic_dim(0)],
        &[deriv.var_base_sizes().len(), deriv.arg_base_sizes(0).len()],
    )
}
