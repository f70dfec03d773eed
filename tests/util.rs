#![allow(dead_code)]
use std::sync::Arc;

use sieve_parvec::algs::communicator::{Communicator, RayonComm};
use sieve_parvec::topology::parallel_dofs::ParallelDofs;

/// Run `f` once per rank of a fresh `n`-rank world, one thread each.
/// Results are indexed by rank.
pub fn on_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(RayonComm) -> T + Sync,
{
    let comms = RayonComm::world(n);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| s.spawn(move || f(c)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Global dof count of [`mesh_dofs`] on `n` ranks: one dof shared by every
/// rank, one private dof per rank, one dof per pair of ranks.
pub fn n_globals(n: usize) -> usize {
    1 + n + n * (n - 1) / 2
}

fn pair_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    (0..i).map(|t| n - 1 - t).sum::<usize>() + (j - i - 1)
}

/// Local layout `[shared-by-all, private, edge with each other rank...]` and
/// its local-to-global map.
pub fn mesh_dofs(comm: RayonComm, complex: bool) -> (Arc<ParallelDofs<RayonComm>>, Vec<u64>) {
    let (me, n) = (comm.rank(), comm.size());
    let others: Vec<usize> = (0..n).filter(|&r| r != me).collect();
    let mut l2g = vec![0u64, 1 + me as u64];
    for &s in &others {
        l2g.push((1 + n + pair_index(n, me, s)) as u64);
    }
    let mut b = ParallelDofs::builder(comm, l2g.len())
        .complex(complex)
        .global_numbering(l2g.clone());
    for (k, &s) in others.iter().enumerate() {
        b = b.share_all(s, [0, 2 + k]);
    }
    (Arc::new(b.build().expect("mesh partition")), l2g)
}

/// Local values picked from a global array through `l2g`.
pub fn gather<V: Copy>(global: &[V], l2g: &[u64]) -> Vec<V> {
    l2g.iter().map(|&g| global[g as usize]).collect()
}

/// Partition with `ndof` local dofs where `shared` are held by every rank.
pub fn fully_shared(comm: RayonComm, ndof: usize, shared: &[usize]) -> Arc<ParallelDofs<RayonComm>> {
    let (me, n) = (comm.rank(), comm.size());
    let mut b = ParallelDofs::builder(comm, ndof);
    for r in (0..n).filter(|&r| r != me) {
        b = b.share_all(r, shared.iter().copied());
    }
    Arc::new(b.build().expect("shared partition"))
}

pub fn assert_close(got: f64, want: f64) {
    assert!(
        (got - want).abs() <= 1e-10 * want.abs().max(1.0),
        "got {got}, want {want}"
    );
}
