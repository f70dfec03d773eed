mod util;

use std::sync::Arc;

use sieve_parvec::prelude::*;
use util::*;

/// Two ranks, four dofs each, dof 2 replicated on both; rank 0 is its master.
fn two_rank_partition(comm: RayonComm) -> Arc<ParallelDofs<RayonComm>> {
    let other = 1 - comm.rank();
    Arc::new(ParallelDofs::builder(comm, 4).share(2, other).build().unwrap())
}

#[test]
fn shared_dof_is_summed_and_counted_once() {
    let out = on_ranks(2, |comm| {
        let me = comm.rank();
        let dofs = two_rank_partition(comm);
        assert_eq!(dofs.is_master_dof(2), me == 0);
        let local = if me == 0 {
            vec![1.0, 2.0, 3.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0, 4.0]
        };
        let mut v =
            ParallelVector::from_values(Some(dofs), local, ParallelStatus::Distributed).unwrap();
        assert!(v.cumulate().unwrap());
        let after = v.as_slice().to_vec();
        let norm = v.norm().unwrap();
        (after, norm, v.status())
    });

    assert_eq!(out[0].0, vec![1.0, 2.0, 4.0, 0.0]);
    assert_eq!(out[1].0, vec![0.0, 0.0, 4.0, 4.0]);
    for (_, norm, status) in &out {
        // 1 + 4 + 16 from rank 0, 16 from rank 1's own dof 3
        assert_close(*norm, 37f64.sqrt());
        assert_eq!(*status, ParallelStatus::Cumulated);
    }
}

#[test]
fn norm_of_distributed_vector_cumulates_first() {
    let out = on_ranks(2, |comm| {
        let me = comm.rank();
        let dofs = two_rank_partition(comm);
        let local = if me == 0 {
            vec![1.0, 2.0, 3.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0, 4.0]
        };
        let mut v =
            ParallelVector::from_values(Some(dofs), local, ParallelStatus::Distributed).unwrap();
        let norm = v.norm().unwrap();
        (norm, v.entry(2).unwrap()[0])
    });
    for (norm, shared) in out {
        assert_close(norm, 37f64.sqrt());
        assert_eq!(shared, 4.0);
    }
}

#[test]
fn status_dump_follows_transitions() {
    let out = on_ranks(2, |comm| {
        let dofs = two_rank_partition(comm);
        let mut v = ParallelVector::<f64, _>::new(dofs, ParallelStatus::Distributed).unwrap();
        let mut log = String::new();
        v.print_status(&mut log).unwrap();
        v.cumulate().unwrap();
        v.print_status(&mut log).unwrap();
        v.set_parallel_dofs(None).unwrap();
        v.print_status(&mut log).unwrap();
        log
    });
    for log in out {
        assert_eq!(log, "DISTRIBUTED\nCUMULATED\nNOT PARALLEL\n");
    }
}
