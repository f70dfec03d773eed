//! Status-aware parallel vectors.

pub mod any_vector;
pub mod parallel_vector;
pub mod status;

pub use any_vector::{AnyParallelVector, create_parallel_vector};
pub use parallel_vector::{LocalVector, ParallelVector};
pub use status::ParallelStatus;
