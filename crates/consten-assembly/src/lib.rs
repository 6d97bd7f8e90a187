//! # consten-assembly
//!
//! Heterogeneous block collections and equation assembly for ConsTen.
//!
//! A constitutive-model update couples differently-shaped physical
//! quantities (a `3 × 3` plastic strain, a per-slip-system scalar set, a
//! lone hardening variable) into one nonlinear system. This crate turns a
//! named collection of such blocks into a single dense tensor a generic
//! linear solver can factorize, and splits the solution back:
//!
//! - [`HVector`](hvector::HVector) / [`HMatrix`](hmatrix::HMatrix) —
//!   fixed-layout block vectors and matrices whose undefined blocks are
//!   implicit zeros, with block-wise algebra and
//!   `assemble`/`disassemble`;
//! - [`to_assembly`](assembly::to_assembly) /
//!   [`from_assembly`](assembly::from_assembly) — conversions for tensors
//!   whose intrinsic intermediate axes must be interleaved with their
//!   paired base axes before flattening (the layout vectorized derivative
//!   computations produce);
//! - free [`assemble`](assembly::assemble) /
//!   [`disassemble`](assembly::disassemble) over a plain
//!   [`TensorList`](blocks::TensorList).
//!
//! ```
//! use consten_assembly::hvector::HVector;
//! use consten_core::Tensor;
//! use smallvec::smallvec;
//!
//! let mut v = HVector::new(vec![smallvec![3], smallvec![2, 2]]);
//! v.set(0, Some(Tensor::from_base_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap()))
//!     .unwrap();
//! let (dense, split) = v.assemble(None).unwrap();
//! assert_eq!(dense.base_sizes(), &[7]);
//! assert_eq!(split, vec![3, 4]);
//! ```

pub mod assembly;
pub mod blocks;
pub mod error;
pub mod hmatrix;
pub mod hvector;

#[cfg(test)]
mod property_tests;

pub use assembly::{assemble, assemble_matrix, disassemble, disassemble_matrix, from_assembly, to_assembly};
pub use blocks::TensorList;
pub use error::{AssemblyError, Result};
pub use hmatrix::HMatrix;
pub use hvector::HVector;
