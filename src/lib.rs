#![cfg_attr(docsrs, feature(doc_cfg))]
//! # sieve-parvec
//!
//! Distributed vectors whose degrees of freedom are partitioned across
//! cooperating processes, with some dofs replicated on several ranks. Each
//! vector carries a [`ParallelStatus`]:
//!
//! - `Distributed`: a shared dof's true value is the sum of its replicas.
//! - `Cumulated`: every replica already holds the final value.
//! - `NotParallel`: no partition, plain local arithmetic.
//!
//! [`ParallelVector::cumulate`] and [`ParallelVector::distribute`] switch
//! between the two parallel forms; arithmetic and reductions reconcile their
//! operands automatically and never count a shared dof twice.
//!
//! ## Features
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Real and complex block vectors behind one generic type
//! - Lowest-rank master rule for single counting in norms
//! - Invariant checks in debug builds, or always with `check-invariants`
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sieve-parvec = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ```
//! use std::sync::Arc;
//! use sieve_parvec::prelude::*;
//!
//! let dofs = Arc::new(ParallelDofs::unshared(NoComm, 2, 1)?);
//! let mut v = ParallelVector::<f64, _>::new(dofs, ParallelStatus::Distributed)?;
//! v.as_mut_slice().copy_from_slice(&[3.0, 4.0]);
//! assert_eq!(v.norm()?, 5.0);
//! assert_eq!(v.status(), ParallelStatus::Cumulated);
//! # Ok::<(), sieve_parvec::vector_error::VectorError>(())
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod topology;
pub mod vector;
pub mod vector_error;

pub use debug_invariants::DebugInvariants;
pub use vector::{ParallelStatus, ParallelVector};
pub use vector_error::VectorError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
    pub use crate::config::SyncConfig;
    pub use crate::data::scalar::Scalar;
    pub use crate::topology::parallel_dofs::{DofPartition, ParallelDofs};
    pub use crate::vector::any_vector::{AnyParallelVector, create_parallel_vector};
    pub use crate::vector::parallel_vector::{LocalVector, ParallelVector};
    pub use crate::vector::status::ParallelStatus;
    pub use crate::vector_error::VectorError;
}
