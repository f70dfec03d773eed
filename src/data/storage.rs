//! Pluggable storage for a vector's local entries.
//!
//! This trait abstracts how the flat local buffer is stored. Entries are grouped
//! in blocks of `entry_size` scalars, one block per local dof.

use core::fmt::{self, Debug};

use crate::data::scalar::Scalar;
use crate::vector_error::VectorError;

/// Contiguous, indexable storage for `V` with slice access.
pub trait Storage<V>: Debug {
    /// Construct a buffer of `len`, filled with `fill`.
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone;

    /// Current length in elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[V];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [V];

    /// The `entry_size` block of dof `dof`.
    fn block(&self, dof: usize, entry_size: usize) -> Result<&[V], VectorError> {
        let ndof = self.len() / entry_size.max(1);
        self.as_slice()
            .get(dof * entry_size..(dof + 1) * entry_size)
            .ok_or(VectorError::DofOutOfRange { dof, ndof })
    }

    /// Mutable `entry_size` block of dof `dof`.
    fn block_mut(&mut self, dof: usize, entry_size: usize) -> Result<&mut [V], VectorError> {
        let ndof = self.len() / entry_size.max(1);
        self.as_mut_slice()
            .get_mut(dof * entry_size..(dof + 1) * entry_size)
            .ok_or(VectorError::DofOutOfRange { dof, ndof })
    }

    /// Assign `value` to every entry.
    fn fill(&mut self, value: V)
    where
        V: Scalar,
    {
        self.as_mut_slice().fill(value);
    }

    /// `self = scale * src`; lengths must match.
    fn scale_assign(&mut self, scale: V, src: &[V]) -> Result<(), VectorError>
    where
        V: Scalar,
    {
        let dst = self.as_mut_slice();
        if dst.len() != src.len() {
            return Err(VectorError::LayoutMismatch {
                expected: dst.len(),
                found: src.len(),
            });
        }
        for (d, s) in dst.iter_mut().zip(src) {
            *d = scale * *s;
        }
        Ok(())
    }

    /// `self += scale * src`; lengths must match.
    fn scale_add(&mut self, scale: V, src: &[V]) -> Result<(), VectorError>
    where
        V: Scalar,
    {
        let dst = self.as_mut_slice();
        if dst.len() != src.len() {
            return Err(VectorError::LayoutMismatch {
                expected: dst.len(),
                found: src.len(),
            });
        }
        for (d, s) in dst.iter_mut().zip(src) {
            *d += scale * *s;
        }
        Ok(())
    }
}

/// `Vec`-backed storage (default).
#[derive(Clone)]
pub struct VecStorage<V>(pub(crate) Vec<V>);

impl<V> Debug for VecStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl<V> Storage<V> for VecStorage<V> {
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone,
    {
        Self(vec![fill; len])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

impl<V> From<Vec<V>> for VecStorage<V> {
    fn from(v: Vec<V>) -> Self {
        Self(v)
    }
}

impl<V> VecStorage<V> {
    pub fn into_inner(self) -> Vec<V> {
        self.0
    }
}
