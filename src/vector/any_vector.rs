//! Runtime choice between real and complex storage.

use std::sync::Arc;

use num_complex::Complex64;

use crate::topology::parallel_dofs::DofPartition;
use crate::vector::parallel_vector::ParallelVector;
use crate::vector::status::ParallelStatus;
use crate::vector_error::VectorError;

/// A parallel vector whose scalar type follows its partition.
#[derive(Clone, Debug)]
pub enum AnyParallelVector<P: DofPartition> {
    Real(ParallelVector<f64, P>),
    Complex(ParallelVector<Complex64, P>),
}

/// Zeroed vector bound to `dofs`, complex when the partition says so.
///
/// A missing partition is an error, never an unbound vector.
pub fn create_parallel_vector<P: DofPartition>(
    dofs: Option<Arc<P>>,
    status: ParallelStatus,
) -> Result<AnyParallelVector<P>, VectorError> {
    let dofs = dofs.ok_or(VectorError::MissingParallelDofs)?;
    if dofs.is_complex() {
        ParallelVector::new(dofs, status).map(AnyParallelVector::Complex)
    } else {
        ParallelVector::new(dofs, status).map(AnyParallelVector::Real)
    }
}

impl<P: DofPartition> AnyParallelVector<P> {
    pub fn is_complex(&self) -> bool {
        matches!(self, AnyParallelVector::Complex(_))
    }

    pub fn status(&self) -> ParallelStatus {
        match self {
            AnyParallelVector::Real(v) => v.status(),
            AnyParallelVector::Complex(v) => v.status(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnyParallelVector::Real(v) => v.len(),
            AnyParallelVector::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cumulate(&mut self) -> Result<bool, VectorError> {
        match self {
            AnyParallelVector::Real(v) => v.cumulate(),
            AnyParallelVector::Complex(v) => v.cumulate(),
        }
    }

    pub fn distribute(&mut self) -> Result<bool, VectorError> {
        match self {
            AnyParallelVector::Real(v) => v.distribute(),
            AnyParallelVector::Complex(v) => v.distribute(),
        }
    }

    pub fn norm(&mut self) -> Result<f64, VectorError> {
        match self {
            AnyParallelVector::Real(v) => v.norm(),
            AnyParallelVector::Complex(v) => v.norm(),
        }
    }

    pub fn as_real(&self) -> Option<&ParallelVector<f64, P>> {
        match self {
            AnyParallelVector::Real(v) => Some(v),
            AnyParallelVector::Complex(_) => None,
        }
    }

    pub fn as_real_mut(&mut self) -> Option<&mut ParallelVector<f64, P>> {
        match self {
            AnyParallelVector::Real(v) => Some(v),
            AnyParallelVector::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ParallelVector<Complex64, P>> {
        match self {
            AnyParallelVector::Complex(v) => Some(v),
            AnyParallelVector::Real(_) => None,
        }
    }

    pub fn as_complex_mut(&mut self) -> Option<&mut ParallelVector<Complex64, P>> {
        match self {
            AnyParallelVector::Complex(v) => Some(v),
            AnyParallelVector::Real(_) => None,
        }
    }
}
