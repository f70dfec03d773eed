//! `ParallelVector`: a local block vector bound to a dof partition, tagged with
//! its [`ParallelStatus`].
//!
//! Arithmetic consults the combination tables in [`crate::vector::status`] and
//! reconciles operands through the synchronization engine before touching the
//! raw storage. An unbound vector is always `NotParallel` and never
//! communicates.

use std::fmt;
use std::sync::Arc;

use crate::algs::communicator::NoComm;
use crate::algs::reduction::{
    global_sum, global_sum_real, local_dot, local_master_dot, local_master_norm2, local_norm2,
};
use crate::algs::synchronize;
use crate::config::SyncConfig;
use crate::data::exchange_buffers::ExchangeBuffers;
use crate::data::scalar::Scalar;
use crate::data::storage::{Storage, VecStorage};
use crate::debug_invariants::DebugInvariants;
use crate::topology::parallel_dofs::{DofPartition, ParallelDofs};
use crate::vector::status::{AddPlan, DotPlan, ParallelStatus, add_plan, dot_plan};
use crate::vector_error::VectorError;

/// Distributed block vector over the local dofs of one rank.
#[derive(Clone, Debug)]
pub struct ParallelVector<V: Scalar, P: DofPartition> {
    values: VecStorage<V>,
    entry_size: usize,
    dofs: Option<Arc<P>>,
    status: ParallelStatus,
    buffers: ExchangeBuffers<V>,
    config: SyncConfig,
}

/// A vector that is never bound to a partition.
pub type LocalVector<V> = ParallelVector<V, ParallelDofs<NoComm>>;

fn check_kind<V: Scalar, P: DofPartition>(dofs: &P) -> Result<(), VectorError> {
    if dofs.is_complex() != V::IS_COMPLEX {
        return Err(VectorError::ScalarKindMismatch {
            partition_complex: dofs.is_complex(),
        });
    }
    Ok(())
}

impl<V: Scalar, P: DofPartition> ParallelVector<V, P> {
    /// Zeroed vector bound to `dofs` with the given initial status.
    pub fn new(dofs: Arc<P>, status: ParallelStatus) -> Result<Self, VectorError> {
        check_kind::<V, P>(&dofs)?;
        let len = dofs.local_len();
        Self::bound(dofs, vec![V::zero(); len], status)
    }

    /// Like [`ParallelVector::new`], rejecting a missing partition.
    pub fn try_new(dofs: Option<Arc<P>>, status: ParallelStatus) -> Result<Self, VectorError> {
        let dofs = dofs.ok_or(VectorError::MissingParallelDofs)?;
        Self::new(dofs, status)
    }

    /// Unbound, zeroed vector of `ndof` blocks of `entry_size` scalars.
    pub fn local(ndof: usize, entry_size: usize) -> Result<Self, VectorError> {
        if entry_size == 0 {
            return Err(VectorError::InvalidEntrySize);
        }
        Ok(Self {
            values: VecStorage::with_len(ndof * entry_size, V::zero()),
            entry_size,
            dofs: None,
            status: ParallelStatus::NotParallel,
            buffers: ExchangeBuffers::empty(),
            config: SyncConfig::default(),
        })
    }

    /// Wrap existing local values.
    ///
    /// Without a partition the vector is unbound with block size one and the
    /// status is forced to `NotParallel`.
    pub fn from_values(
        dofs: Option<Arc<P>>,
        values: Vec<V>,
        status: ParallelStatus,
    ) -> Result<Self, VectorError> {
        match dofs {
            Some(dofs) => {
                check_kind::<V, P>(&dofs)?;
                if values.len() != dofs.local_len() {
                    return Err(VectorError::LayoutMismatch {
                        expected: dofs.local_len(),
                        found: values.len(),
                    });
                }
                Self::bound(dofs, values, status)
            }
            None => Ok(Self {
                values: VecStorage::from(values),
                entry_size: 1,
                dofs: None,
                status: ParallelStatus::NotParallel,
                buffers: ExchangeBuffers::empty(),
                config: SyncConfig::default(),
            }),
        }
    }

    fn bound(dofs: Arc<P>, values: Vec<V>, status: ParallelStatus) -> Result<Self, VectorError> {
        let v = Self {
            values: VecStorage::from(values),
            entry_size: dofs.entry_size(),
            buffers: ExchangeBuffers::for_partition(dofs.as_ref()),
            dofs: Some(dofs),
            status,
            config: SyncConfig::default(),
        };
        v.validate_invariants()?;
        Ok(v)
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// A zeroed vector with the same layout, binding, status and config.
    pub fn create_vector(&self) -> Self {
        Self {
            values: VecStorage::with_len(self.values.len(), V::zero()),
            entry_size: self.entry_size,
            dofs: self.dofs.clone(),
            status: self.status,
            buffers: match &self.dofs {
                Some(d) => ExchangeBuffers::for_partition(d.as_ref()),
                None => ExchangeBuffers::empty(),
            },
            config: self.config,
        }
    }

    /// Bind to a different partition, or unbind with `None`.
    ///
    /// Rebinding the same `Arc` is a no-op. A new partition reallocates the
    /// exchange buffers and keeps the current status; unbinding makes the
    /// vector `NotParallel`.
    pub fn set_parallel_dofs(&mut self, dofs: Option<Arc<P>>) -> Result<(), VectorError> {
        let Some(new) = dofs else {
            self.dofs = None;
            self.buffers = ExchangeBuffers::empty();
            self.status = ParallelStatus::NotParallel;
            return Ok(());
        };
        if let Some(old) = &self.dofs {
            if Arc::ptr_eq(old, &new) {
                return Ok(());
            }
            if !old.is_compatible_with(&new) {
                log::warn!(
                    "rank {}: rebinding vector to a partition with a different sharing pattern",
                    new.rank()
                );
            }
        }
        check_kind::<V, P>(&new)?;
        if new.local_len() != self.values.len() {
            return Err(VectorError::LayoutMismatch {
                expected: self.values.len(),
                found: new.local_len(),
            });
        }
        self.entry_size = new.entry_size();
        self.buffers = ExchangeBuffers::for_partition(new.as_ref());
        self.dofs = Some(new);
        self.debug_assert_invariants();
        Ok(())
    }

    pub fn parallel_dofs(&self) -> Option<&Arc<P>> {
        self.dofs.as_ref()
    }

    /// Current status (`CurrentStatus`).
    pub fn status(&self) -> ParallelStatus {
        self.status
    }

    /// Overwrite the status tag without touching the values.
    ///
    /// Use after writing raw storage. A parallel status needs a partition.
    pub fn set_status(&mut self, status: ParallelStatus) -> Result<(), VectorError> {
        if status.is_parallel() && self.dofs.is_none() {
            return Err(VectorError::MissingParallelDofs);
        }
        self.status = status;
        Ok(())
    }

    pub fn is_parallel(&self) -> bool {
        self.status.is_parallel()
    }

    /// Number of scalars stored locally.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of local dofs (blocks).
    pub fn ndof(&self) -> usize {
        self.values.len() / self.entry_size
    }

    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    pub fn as_slice(&self) -> &[V] {
        self.values.as_slice()
    }

    /// Raw local storage. The status is not changed; call
    /// [`set_status`](Self::set_status) if the writes change the representation.
    pub fn as_mut_slice(&mut self) -> &mut [V] {
        self.values.as_mut_slice()
    }

    pub fn entry(&self, dof: usize) -> Result<&[V], VectorError> {
        self.values.block(dof, self.entry_size)
    }

    pub fn entry_mut(&mut self, dof: usize) -> Result<&mut [V], VectorError> {
        self.values.block_mut(dof, self.entry_size)
    }

    pub fn into_values(self) -> Vec<V> {
        self.values.into_inner()
    }

    /// `Distributed` → `Cumulated`; a no-op in any other status.
    ///
    /// Returns whether the status changed.
    pub fn cumulate(&mut self) -> Result<bool, VectorError> {
        let Some(dofs) = self.dofs.as_deref() else {
            return Ok(false);
        };
        synchronize::cumulate(
            &mut self.status,
            self.values.as_mut_slice(),
            dofs,
            &mut self.buffers,
            self.config.comm_tag(),
        )
    }

    /// `Cumulated` → `Distributed`; a no-op in any other status.
    pub fn distribute(&mut self) -> Result<bool, VectorError> {
        let Some(dofs) = self.dofs.as_deref() else {
            return Ok(false);
        };
        synchronize::distribute(&mut self.status, self.values.as_mut_slice(), dofs)
    }

    /// Assign `value` everywhere. A bound vector becomes `Cumulated`.
    pub fn set_scalar(&mut self, value: V) {
        self.values.fill(value);
        self.status = if self.dofs.is_some() {
            ParallelStatus::Cumulated
        } else {
            ParallelStatus::NotParallel
        };
    }

    /// `self = scale * v`, adopting `v`'s binding and status.
    pub fn set(&mut self, scale: V, v: &Self) -> Result<(), VectorError> {
        self.values.scale_assign(scale, v.as_slice())?;
        self.entry_size = v.entry_size;
        self.set_parallel_dofs(v.dofs.clone())?;
        self.status = v.status;
        Ok(())
    }

    /// `self += scale * v`.
    ///
    /// When exactly one side is `Distributed`, that side is cumulated first, so
    /// `v` may change representation (never value). An unpartitioned side
    /// counts as already cumulated.
    pub fn add(&mut self, scale: V, v: &mut Self) -> Result<(), VectorError> {
        self.ensure_compatible(v)?;
        match add_plan(self.status, v.status) {
            AddPlan::Direct | AddPlan::LocalOnly => {}
            AddPlan::CumulateReceiver => {
                self.cumulate()?;
            }
            AddPlan::CumulateOperand => {
                v.cumulate()?;
            }
        }
        self.values.scale_add(scale, v.as_slice())
    }

    /// Global `Σ self_i · other_i` (`conj(self_i)` when `conjugate`).
    ///
    /// Two distributed operands cumulate `self`; two cumulated operands
    /// distribute `self`. `other` is never modified. Only two `NotParallel`
    /// operands skip the global reduction.
    pub fn inner_product(&mut self, other: &Self, conjugate: bool) -> Result<V, VectorError> {
        self.ensure_compatible(other)?;
        let plan = dot_plan(self.status, other.status);
        match plan {
            DotPlan::CumulateReceiver => {
                self.cumulate()?;
            }
            DotPlan::DistributeReceiver => {
                self.distribute()?;
            }
            DotPlan::Direct | DotPlan::MasterOnly | DotPlan::LocalOnly => {}
        }
        if plan == DotPlan::LocalOnly {
            return Ok(local_dot(self.as_slice(), other.as_slice(), conjugate));
        }
        // the partitioned side decides masters and carries the communicator
        let bound = if self.status.is_parallel() { &self.dofs } else { &other.dofs };
        let dofs = bound.as_deref().ok_or(VectorError::MissingParallelDofs)?;
        let local = if plan == DotPlan::MasterOnly {
            local_master_dot(self.as_slice(), other.as_slice(), dofs, conjugate)
        } else {
            local_dot(self.as_slice(), other.as_slice(), conjugate)
        };
        Ok(global_sum(dofs.comm(), local))
    }

    /// Inner product of the vector with itself.
    ///
    /// The vector is cumulated and only master blocks are summed, so shared
    /// dofs count once.
    pub fn dot_self(&mut self, conjugate: bool) -> Result<V, VectorError> {
        if !self.status.is_parallel() {
            return Ok(local_dot(self.as_slice(), self.as_slice(), conjugate));
        }
        self.cumulate()?;
        let Some(dofs) = self.dofs.as_deref() else {
            return Ok(local_dot(self.as_slice(), self.as_slice(), conjugate));
        };
        let values = self.values.as_slice();
        let local = local_master_dot(values, values, dofs, conjugate);
        Ok(global_sum(dofs.comm(), local))
    }

    /// L2 norm. Cumulates first and counts each shared dof at its master only.
    pub fn norm(&mut self) -> Result<f64, VectorError> {
        if !self.status.is_parallel() {
            return Ok(local_norm2(self.as_slice()).sqrt());
        }
        self.cumulate()?;
        let Some(dofs) = self.dofs.as_deref() else {
            return Ok(local_norm2(self.as_slice()).sqrt());
        };
        let local = local_master_norm2(self.values.as_slice(), dofs);
        Ok(global_sum_real(dofs.comm(), local).sqrt())
    }

    /// Write the status line (`NOT PARALLEL`, `DISTRIBUTED` or `CUMULATED`).
    pub fn print_status<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "{}", self.status)
    }

    fn ensure_compatible(&self, other: &Self) -> Result<(), VectorError> {
        if self.len() != other.len() {
            return Err(VectorError::LayoutMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        if self.entry_size != other.entry_size {
            return Err(VectorError::EntrySizeMismatch {
                expected: self.entry_size,
                found: other.entry_size,
            });
        }
        if !self.config.validate_layouts {
            return Ok(());
        }
        if let (Some(a), Some(b)) = (&self.dofs, &other.dofs) {
            if !Arc::ptr_eq(a, b) && !a.is_compatible_with(b) {
                return Err(VectorError::IncompatiblePartitions);
            }
        }
        Ok(())
    }
}

impl<V: Scalar, P: DofPartition> DebugInvariants for ParallelVector<V, P> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ParallelVector");
    }

    fn validate_invariants(&self) -> Result<(), VectorError> {
        if self.entry_size == 0 {
            return Err(VectorError::InvalidEntrySize);
        }
        match &self.dofs {
            None if self.status.is_parallel() => Err(VectorError::MissingParallelDofs),
            None => Ok(()),
            Some(dofs) => {
                if self.entry_size != dofs.entry_size() {
                    return Err(VectorError::EntrySizeMismatch {
                        expected: dofs.entry_size(),
                        found: self.entry_size,
                    });
                }
                if self.values.len() != dofs.local_len() {
                    return Err(VectorError::LayoutMismatch {
                        expected: dofs.local_len(),
                        found: self.values.len(),
                    });
                }
                if !self.buffers.matches(dofs.as_ref()) {
                    return Err(VectorError::InvariantViolation(
                        "exchange buffers out of date".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl<V: Scalar, P: DofPartition> fmt::Display for ParallelVector<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_status(f)?;
        for block in self.as_slice().chunks(self.entry_size) {
            let mut first = true;
            for x in block {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{x}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    type Local = LocalVector<f64>;

    fn serial(ndof: usize, es: usize) -> Arc<ParallelDofs<NoComm>> {
        Arc::new(ParallelDofs::unshared(NoComm, ndof, es).unwrap())
    }

    #[test]
    fn construction_checks_binding() {
        let err = Local::try_new(None, ParallelStatus::Cumulated).unwrap_err();
        assert!(matches!(err, VectorError::MissingParallelDofs));

        let v = Local::new(serial(3, 2), ParallelStatus::Distributed).unwrap();
        assert_eq!(v.len(), 6);
        assert_eq!(v.ndof(), 3);
        assert_eq!(v.status(), ParallelStatus::Distributed);

        let err = LocalVector::<Complex64>::new(serial(1, 1), ParallelStatus::Cumulated)
            .unwrap_err();
        assert!(matches!(
            err,
            VectorError::ScalarKindMismatch {
                partition_complex: false
            }
        ));

        let err = Local::from_values(Some(serial(2, 1)), vec![1.0], ParallelStatus::Cumulated)
            .unwrap_err();
        assert!(matches!(err, VectorError::LayoutMismatch { .. }));
        assert!(matches!(Local::local(2, 0), Err(VectorError::InvalidEntrySize)));
    }

    #[test]
    fn set_scalar_tracks_binding() {
        let mut bound = Local::new(serial(2, 1), ParallelStatus::Distributed).unwrap();
        bound.set_scalar(2.0);
        assert_eq!(bound.status(), ParallelStatus::Cumulated);
        assert_eq!(bound.as_slice(), &[2.0, 2.0]);

        let mut free = Local::local(2, 1).unwrap();
        free.set_scalar(1.0);
        assert_eq!(free.status(), ParallelStatus::NotParallel);
    }

    #[test]
    fn set_adopts_operand_binding_and_status() {
        let src = Local::from_values(
            Some(serial(2, 1)),
            vec![1.0, -1.0],
            ParallelStatus::Distributed,
        )
        .unwrap();
        let mut dst = Local::local(2, 1).unwrap();
        dst.set(3.0, &src).unwrap();
        assert_eq!(dst.as_slice(), &[3.0, -3.0]);
        assert_eq!(dst.status(), ParallelStatus::Distributed);
        assert!(Arc::ptr_eq(
            dst.parallel_dofs().unwrap(),
            src.parallel_dofs().unwrap()
        ));

        let free = Local::from_values(None, vec![1.0, 1.0], ParallelStatus::Cumulated).unwrap();
        dst.set(1.0, &free).unwrap();
        assert_eq!(dst.status(), ParallelStatus::NotParallel);
        assert!(dst.parallel_dofs().is_none());
    }

    #[test]
    fn serial_reductions_are_local() {
        let mut a = Local::from_values(None, vec![3.0, 4.0], ParallelStatus::NotParallel).unwrap();
        let b = Local::from_values(None, vec![1.0, 2.0], ParallelStatus::NotParallel).unwrap();
        assert_eq!(a.inner_product(&b, false).unwrap(), 11.0);
        assert_eq!(a.norm().unwrap(), 5.0);
        assert_eq!(a.dot_self(true).unwrap(), 25.0);
    }

    #[test]
    fn status_setter_and_rebinding() {
        let mut v = Local::local(2, 1).unwrap();
        assert!(matches!(
            v.set_status(ParallelStatus::Cumulated),
            Err(VectorError::MissingParallelDofs)
        ));
        let pd = serial(2, 1);
        v.set_parallel_dofs(Some(pd.clone())).unwrap();
        assert_eq!(v.status(), ParallelStatus::NotParallel);
        v.set_status(ParallelStatus::Cumulated).unwrap();
        v.set_parallel_dofs(Some(pd)).unwrap();
        assert_eq!(v.status(), ParallelStatus::Cumulated);

        let err = v.set_parallel_dofs(Some(serial(3, 1))).unwrap_err();
        assert!(matches!(err, VectorError::LayoutMismatch { .. }));

        v.set_parallel_dofs(None).unwrap();
        assert_eq!(v.status(), ParallelStatus::NotParallel);
        assert!(v.validate_invariants().is_ok());
    }

    #[test]
    fn entries_and_display() {
        let mut v = Local::new(serial(2, 2), ParallelStatus::Cumulated).unwrap();
        v.entry_mut(1).unwrap().copy_from_slice(&[1.5, 2.0]);
        assert_eq!(v.entry(1).unwrap(), &[1.5, 2.0]);
        assert!(v.entry(2).is_err());
        assert_eq!(v.to_string(), "CUMULATED\n0 0\n1.5 2\n");

        let mut line = String::new();
        Local::local(1, 1).unwrap().print_status(&mut line).unwrap();
        assert_eq!(line, "NOT PARALLEL\n");
    }

    #[test]
    fn operands_must_share_a_layout() {
        let mut a = Local::local(2, 1).unwrap();
        let mut b = Local::local(3, 1).unwrap();
        assert!(matches!(
            a.add(1.0, &mut b),
            Err(VectorError::LayoutMismatch {
                expected: 2,
                found: 3
            })
        ));
        let c = Local::local(1, 2).unwrap();
        assert!(matches!(
            a.inner_product(&c, false),
            Err(VectorError::EntrySizeMismatch { .. })
        ));
    }

    #[test]
    fn create_vector_copies_layout_not_values() {
        let mut v = Local::new(serial(2, 1), ParallelStatus::Distributed)
            .unwrap()
            .with_config(SyncConfig::default().with_tag(9));
        v.set_scalar(4.0);
        let w = v.create_vector();
        assert_eq!(w.as_slice(), &[0.0, 0.0]);
        assert_eq!(w.status(), ParallelStatus::Cumulated);
        assert_eq!(w.config().tag, 9);
        assert_eq!(v.into_values(), vec![4.0, 4.0]);
    }
}
