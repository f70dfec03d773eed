//! VectorError: Unified error type for sieve-parvec public APIs
//!
//! Every fallible operation in the crate returns this type. Nothing in the
//! synchronization path panics on bad input or a failed exchange.

use thiserror::Error;

/// Unified error type for parallel vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// A parallel vector was requested without a partition to bind to.
    #[error("parallel vector requires a dof partition, got none")]
    MissingParallelDofs,
    /// Two operands do not share the same local layout.
    #[error("layout mismatch: expected {expected} local entries, found {found}")]
    LayoutMismatch { expected: usize, found: usize },
    /// Two operands (or a partition and its storage) disagree on block size.
    #[error("entry size mismatch: expected {expected}, found {found}")]
    EntrySizeMismatch { expected: usize, found: usize },
    /// Operands are bound to partitions describing different sharing patterns.
    #[error("operands are bound to incompatible dof partitions")]
    IncompatiblePartitions,
    /// A local dof index outside `0..ndof`.
    #[error("dof {dof} out of range (ndof_local = {ndof})")]
    DofOutOfRange { dof: usize, ndof: usize },
    /// A rank outside the communicator.
    #[error("rank {rank} out of range for communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },
    /// A process listed itself as a sharer of one of its dofs.
    #[error("rank {0} cannot share dofs with itself")]
    SelfSharing(usize),
    /// Entry block size must be at least one.
    #[error("entry size must be non-zero")]
    InvalidEntrySize,
    /// Real storage requested for a complex partition or vice versa.
    #[error("scalar kind mismatch: partition is_complex = {partition_complex}")]
    ScalarKindMismatch { partition_complex: bool },
    /// A structural invariant of a partition or vector is broken.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// The messaging substrate failed while talking to `neighbor`.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A receive delivered a different number of bytes than the exchange expects.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}
