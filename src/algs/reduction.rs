//! Reduction layer: local partial sums and their global reduction.
//!
//! Callers reconcile statuses first (see [`crate::vector::status::dot_plan`]);
//! these helpers only sum what they are given.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::algs::communicator::Communicator;
use crate::data::scalar::Scalar;
use crate::topology::parallel_dofs::DofPartition;

#[inline]
fn dot_term<V: Scalar>(x: V, y: V, conjugate: bool) -> V {
    if conjugate { x.conj() * y } else { x * y }
}

/// `Σ a_i · b_i`, or `Σ conj(a_i) · b_i` when `conjugate` is set.
///
/// Lengths are expected to match; extra entries of the longer slice are ignored.
pub fn local_dot<V: Scalar>(a: &[V], b: &[V], conjugate: bool) -> V {
    #[cfg(feature = "rayon")]
    {
        a.par_iter()
            .zip(b.par_iter())
            .map(|(&x, &y)| dot_term(x, y, conjugate))
            .reduce(V::zero, |s, t| s + t)
    }
    #[cfg(not(feature = "rayon"))]
    {
        a.iter()
            .zip(b)
            .fold(V::zero(), |s, (&x, &y)| s + dot_term(x, y, conjugate))
    }
}

/// `Σ |x_i|²` over every entry.
pub fn local_norm2<V: Scalar>(values: &[V]) -> f64 {
    values.iter().map(|x| x.abs_sqr()).sum()
}

/// `Σ |x_i|²` over the blocks of dofs this rank is master of.
///
/// Non-master replicas are skipped, so a cumulated vector contributes every
/// shared dof exactly once across all ranks.
pub fn local_master_norm2<V, P>(values: &[V], dofs: &P) -> f64
where
    V: Scalar,
    P: DofPartition,
{
    let es = dofs.entry_size();
    let block = |dof: usize| -> f64 { local_norm2(&values[dof * es..(dof + 1) * es]) };
    #[cfg(feature = "rayon")]
    {
        (0..dofs.ndof_local())
            .into_par_iter()
            .filter(|&d| dofs.is_master_dof(d))
            .map(block)
            .sum()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..dofs.ndof_local())
            .filter(|&d| dofs.is_master_dof(d))
            .map(block)
            .sum()
    }
}

/// [`local_dot`] restricted to the blocks of dofs this rank is master of.
///
/// Used when both operands are the same cumulated vector, where neither can be
/// distributed without destroying the other.
pub fn local_master_dot<V, P>(a: &[V], b: &[V], dofs: &P, conjugate: bool) -> V
where
    V: Scalar,
    P: DofPartition,
{
    let es = dofs.entry_size();
    (0..dofs.ndof_local())
        .filter(|&d| dofs.is_master_dof(d))
        .map(|d| {
            let r = d * es..(d + 1) * es;
            local_dot(&a[r.clone()], &b[r], conjugate)
        })
        .fold(V::zero(), |s, t| s + t)
}

/// Sum `x` over every rank of `comm`; complex values travel as `[re, im]`.
pub fn global_sum<V: Scalar, C: Communicator>(comm: &C, x: V) -> V {
    let mut lanes = [0.0f64; 2];
    let lanes = &mut lanes[..V::REDUCE_LANES];
    x.to_lanes(lanes);
    comm.allreduce_sum(lanes);
    V::from_lanes(lanes)
}

pub fn global_sum_real<C: Communicator>(comm: &C, x: f64) -> f64 {
    let mut buf = [x];
    comm.allreduce_sum(&mut buf);
    buf[0]
}
