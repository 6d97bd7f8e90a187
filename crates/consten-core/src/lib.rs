//! # consten-core
//!
//! Grouped tensor algebra for constitutive-model libraries.
//!
//! Physical quantities are tensors whose axes fall into three independent
//! groups: a **dynamic** group (the runtime batch, broadcastable and
//! possibly symbolic), an **intermediate** group (structural vectorization
//! introduced by model composition), and a **base** group (the intrinsic
//! physical rank, e.g. `3 × 3` for a stress tensor). This crate provides:
//!
//! - the pure shape algebra over those groups ([`shape`]);
//! - the [`Tensor`](tensor::Tensor) value type carrying the group split
//!   alongside a dense runtime array, with per-group indexing, reshaping,
//!   broadcasting, and reductions ([`tensor`], [`index`]);
//! - reduced (Mandel / axial-vector) notation for symmetric and
//!   antisymmetric base pairs ([`notation`]);
//! - multi-argument derivative bookkeeping with lazy materialization of
//!   broadcast intermediate axes ([`derivative`]).
//!
//! Heterogeneous block collections and equation assembly live in the
//! companion crate `consten-assembly`.
//!
//! ## Quick start
//!
//! ```
//! use consten_core::tensor::Tensor;
//! use consten_core::index::Index;
//!
//! // batch of 5, two slip systems, 3x3 base
//! let t = Tensor::<f64>::zeros([5].into(), &[2], &[3, 3]);
//! let col = t.base_index(&[Index::all(), Index::At(0)]).unwrap();
//! assert_eq!(col.base_sizes(), &[3]);
//! assert_eq!(col.intmd_sizes(), &[2]);
//! ```
//!
//! ## Concurrency
//!
//! This layer is single-threaded and synchronous by contract: calls run to
//! completion on the caller's thread and either return or fail
//! immediately. The reduced-notation constant cache is process-wide and
//! populated lazily on first use; pre-warm it from one thread before
//! sharing tensors across threads.
//!
//! ## Errors
//!
//! All contract violations are reported synchronously through
//! [`TensorError`]; hot-path internal consistency checks are debug-only
//! and compiled out in release builds.

pub mod derivative;
pub mod error;
pub mod index;
pub mod notation;
pub mod shape;
pub mod tensor;

#[cfg(test)]
mod property_tests;

pub use error::{Result, TensorError};
pub use index::Index;
pub use shape::{DynShape, DynSize, Shape, SymbolId};
pub use tensor::Tensor;
