//! # ConsTen — grouped tensors for constitutive models
//!
//! This is the meta crate re-exporting the ConsTen components:
//!
//! - [`core`] — the grouped [`Tensor`](core::Tensor) type, shape algebra,
//!   reduced notation, and derivative bookkeeping;
//! - [`assembly`] — heterogeneous block vectors/matrices and dense
//!   equation assembly.
//!
//! ## Quick start
//!
//! ```
//! use consten::prelude::*;
//!
//! // a batched stress-like quantity: batch 8, two sub-models, 3x3 base
//! let stress = Tensor::<f64>::zeros([8].into(), &[2], &[3, 3]);
//! assert_eq!(stress.base_sizes(), &[3, 3]);
//!
//! // collapse the symmetric base pair into Mandel notation
//! let reduced = full_to_mandel(&stress, 0).unwrap();
//! assert_eq!(reduced.base_sizes(), &[6]);
//! ```

pub use consten_assembly as assembly;
pub use consten_core as core;

pub mod prelude {
    //! Convenient imports for model code.
    //!
    //! ```
    //! use consten::prelude::*;
    //!
    //! let t = Tensor::<f64>::zeros([4].into(), &[], &[3]);
    //! assert_eq!(t.dynamic_dim(), 1);
    //! ```

    pub use crate::core::derivative::{
        pop_intrinsic_intmd, push_intrinsic_intmd, Derivative, DerivativeRepr,
    };
    pub use crate::core::notation::{
        full_to_mandel, full_to_skew, mandel_to_full, skew_to_full,
    };
    pub use crate::core::tensor::{base_cat, base_stack, inner, norm, norm_sq};
    pub use crate::core::{DynShape, DynSize, Index, Shape, Tensor, TensorError};

    pub use crate::assembly::{
        assemble, disassemble, from_assembly, to_assembly, AssemblyError, HMatrix, HVector,
        TensorList,
    };
}
