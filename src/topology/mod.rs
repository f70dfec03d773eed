//! Dof partition views.
//!
//! A partition tells a vector which of its local dofs are replicated on which
//! ranks and which replica is authoritative. Vectors only ever query it.

pub mod parallel_dofs;

pub use parallel_dofs::{DofPartition, ParallelDofs, ParallelDofsBuilder, is_master_among};
