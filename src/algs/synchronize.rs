//! Synchronization engine: switch a vector's shared entries between the
//! distributed and cumulated representations.
//!
//! `cumulate` posts one receive and one send per distant process, drains the
//! sends, then folds receives into the local values in whatever order they
//! complete. `distribute` is purely local: every non-master replica of a
//! shared dof is zeroed.
//!
//! Both functions operate on the raw pieces of a vector (status, flat values,
//! partition, staging buffers) so the facade can borrow them disjointly.

use crate::algs::communicator::{CommTag, Communicator, wait_all, wait_any};
use crate::algs::wire::{cast_slice, cast_slice_mut, copy_into};
use crate::data::exchange_buffers::ExchangeBuffers;
use crate::data::scalar::Scalar;
use crate::topology::parallel_dofs::DofPartition;
use crate::vector::status::ParallelStatus;
use crate::vector_error::VectorError;

/// `Distributed` → `Cumulated`.
///
/// Returns `Ok(false)` without communicating when the status is anything but
/// `Distributed`. On error the status is left untouched; every posted send and
/// receive has completed by the time the error is returned.
pub fn cumulate<V, P>(
    status: &mut ParallelStatus,
    values: &mut [V],
    dofs: &P,
    buffers: &mut ExchangeBuffers<V>,
    tag: CommTag,
) -> Result<bool, VectorError>
where
    V: Scalar,
    P: DofPartition,
{
    if *status != ParallelStatus::Distributed {
        return Ok(false);
    }
    check_layout(values, dofs)?;
    if !buffers.matches(dofs) {
        return Err(VectorError::InvariantViolation(
            "exchange buffers were allocated for a different partition".into(),
        ));
    }

    let comm = dofs.comm();
    let me = comm.rank();
    let procs = dofs.distant_procs();
    if procs.is_empty() {
        log::debug!("rank {me}: cumulate with no neighbours");
        *status = ParallelStatus::Cumulated;
        return Ok(true);
    }
    check_neighbours(procs, me, comm.size())?;

    // 1) post every receive
    let mut pending = Vec::with_capacity(procs.len());
    for (k, &p) in procs.iter().enumerate() {
        let h = comm.irecv(p, tag.as_u16(), cast_slice_mut(buffers.recv_mut(k)));
        pending.push((k, h));
    }

    // 2) pack and post every send
    let mut sends = Vec::with_capacity(procs.len());
    for (k, &p) in procs.iter().enumerate() {
        buffers.pack(k, dofs.exchange_dofs(p), values);
        sends.push(comm.isend(p, tag.as_u16(), cast_slice(buffers.send(k))));
    }
    wait_all(sends);

    // 3) fold receives in completion order; keep draining after an error
    let mut maybe_err = None;
    while let Some((k, data)) = wait_any(&mut pending) {
        let p = procs[k];
        if maybe_err.is_some() {
            continue;
        }
        let raw = match data {
            Some(raw) => raw,
            None => {
                maybe_err = Some(VectorError::CommError {
                    neighbor: p,
                    source: format!("no data received from rank {p}").into(),
                });
                continue;
            }
        };
        match copy_into(p, &raw, buffers.recv_mut(k)) {
            Ok(()) => {
                buffers.add_received(k, dofs.exchange_dofs(p), values);
                log::trace!(
                    "rank {me}: added {} shared dofs from rank {p}",
                    dofs.exchange_dofs(p).len()
                );
            }
            Err(e) => maybe_err = Some(e),
        }
    }
    if let Some(err) = maybe_err {
        return Err(err);
    }

    log::debug!(
        "rank {me}: DISTRIBUTED -> CUMULATED over {} neighbours",
        procs.len()
    );
    *status = ParallelStatus::Cumulated;
    Ok(true)
}

/// `Cumulated` → `Distributed`: zero every shared dof this rank is not master of.
///
/// Returns `Ok(false)` when the status is anything but `Cumulated`.
pub fn distribute<V, P>(
    status: &mut ParallelStatus,
    values: &mut [V],
    dofs: &P,
) -> Result<bool, VectorError>
where
    V: Scalar,
    P: DofPartition,
{
    if *status != ParallelStatus::Cumulated {
        return Ok(false);
    }
    check_layout(values, dofs)?;

    let es = dofs.entry_size();
    let mut zeroed = 0usize;
    for &p in dofs.distant_procs() {
        for &dof in dofs.exchange_dofs(p) {
            if !dofs.is_master_dof(dof) {
                values[dof * es..(dof + 1) * es].fill(V::zero());
                zeroed += 1;
            }
        }
    }
    log::debug!(
        "rank {}: CUMULATED -> DISTRIBUTED, {zeroed} replica entries cleared",
        dofs.rank()
    );
    *status = ParallelStatus::Distributed;
    Ok(true)
}

fn check_layout<V, P: DofPartition>(values: &[V], dofs: &P) -> Result<(), VectorError> {
    let expected = dofs.local_len();
    if values.len() != expected {
        return Err(VectorError::LayoutMismatch {
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

/// Reject bad neighbours before anything is posted, so no receive is left dangling.
fn check_neighbours(procs: &[usize], me: usize, size: usize) -> Result<(), VectorError> {
    for &p in procs {
        if p >= size {
            return Err(VectorError::InvalidRank { rank: p, size });
        }
        if p == me {
            return Err(VectorError::SelfSharing(p));
        }
    }
    Ok(())
}
