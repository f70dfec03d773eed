//! Dof partition view: which local dofs are shared with which ranks, and who
//! is master of each.
//!
//! [`DofPartition`] is the read-only query interface the vectors consume.
//! [`ParallelDofs`] is the in-memory implementation, built from sharing pairs
//! with [`ParallelDofsBuilder`]. Master selection is the lowest rank among the
//! sharers of a dof ([`is_master_among`]).

use std::collections::BTreeMap;

use hashbrown::HashMap;
use itertools::Itertools;

use crate::algs::communicator::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::vector_error::VectorError;

/// Read-only view of a dof partition.
///
/// Shared by reference between every vector with the same layout.
pub trait DofPartition: Send + Sync {
    type Comm: Communicator;

    /// Communicator connecting the sharers.
    fn comm(&self) -> &Self::Comm;

    fn rank(&self) -> usize {
        self.comm().rank()
    }

    /// Ranks sharing at least one dof with this process, ascending.
    fn distant_procs(&self) -> &[usize];

    /// Local dofs shared with `rank`, in exchange order. Empty for non-neighbours.
    fn exchange_dofs(&self, rank: usize) -> &[usize];

    /// Whether this process is the master of local dof `dof`.
    fn is_master_dof(&self, dof: usize) -> bool;

    fn ndof_local(&self) -> usize;

    /// Scalars per dof.
    fn entry_size(&self) -> usize;

    fn is_complex(&self) -> bool;

    /// Length of the flat local buffer.
    fn local_len(&self) -> usize {
        self.ndof_local() * self.entry_size()
    }

    /// Same dof count, block size, neighbours and exchange lists.
    fn is_compatible_with(&self, other: &Self) -> bool {
        self.ndof_local() == other.ndof_local()
            && self.entry_size() == other.entry_size()
            && self.distant_procs() == other.distant_procs()
            && self
                .distant_procs()
                .iter()
                .all(|&p| self.exchange_dofs(p) == other.exchange_dofs(p))
    }
}

/// Master rule: a process is master of a dof when no other sharer has a lower rank.
#[inline]
pub fn is_master_among<I>(my_rank: usize, sharers: I) -> bool
where
    I: IntoIterator<Item = usize>,
{
    sharers
        .into_iter()
        .filter(|&r| r != my_rank)
        .all(|r| r > my_rank)
}

/// In-memory dof partition.
#[derive(Clone, Debug)]
pub struct ParallelDofs<C: Communicator> {
    comm: C,
    ndof: usize,
    entry_size: usize,
    is_complex: bool,
    procs: Vec<usize>,
    exchange: Vec<Vec<usize>>,
    sharers: HashMap<usize, Vec<usize>>,
    master: Vec<bool>,
}

impl<C: Communicator> ParallelDofs<C> {
    pub fn builder(comm: C, ndof_local: usize) -> ParallelDofsBuilder<C> {
        ParallelDofsBuilder::new(comm, ndof_local)
    }

    /// A partition with no shared dofs.
    pub fn unshared(comm: C, ndof_local: usize, entry_size: usize) -> Result<Self, VectorError> {
        Self::builder(comm, ndof_local).entry_size(entry_size).build()
    }

    /// Ranks (other than this one) holding a replica of `dof`, ascending.
    pub fn sharers(&self, dof: usize) -> &[usize] {
        self.sharers.get(&dof).map_or(&[][..], |v| &v[..])
    }

    /// Number of local dofs replicated on at least one other rank.
    pub fn num_shared_dofs(&self) -> usize {
        self.sharers.len()
    }

    /// Local dofs this process is master of.
    pub fn master_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.master
            .iter()
            .enumerate()
            .filter_map(|(dof, &m)| m.then_some(dof))
    }

    fn proc_index(&self, rank: usize) -> Option<usize> {
        self.procs.binary_search(&rank).ok()
    }
}

impl<C: Communicator> DofPartition for ParallelDofs<C> {
    type Comm = C;

    fn comm(&self) -> &C {
        &self.comm
    }

    fn distant_procs(&self) -> &[usize] {
        &self.procs
    }

    fn exchange_dofs(&self, rank: usize) -> &[usize] {
        self.proc_index(rank)
            .map_or(&[][..], |k| &self.exchange[k][..])
    }

    fn is_master_dof(&self, dof: usize) -> bool {
        self.master.get(dof).copied().unwrap_or(false)
    }

    fn ndof_local(&self) -> usize {
        self.ndof
    }

    fn entry_size(&self) -> usize {
        self.entry_size
    }

    fn is_complex(&self) -> bool {
        self.is_complex
    }
}

impl<C: Communicator> DebugInvariants for ParallelDofs<C> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ParallelDofs");
    }

    fn validate_invariants(&self) -> Result<(), VectorError> {
        let me = self.comm.rank();
        if self.entry_size == 0 {
            return Err(VectorError::InvalidEntrySize);
        }
        if !self.procs.windows(2).all(|w| w[0] < w[1]) {
            return Err(VectorError::InvariantViolation(
                "distant procs not strictly ascending".into(),
            ));
        }
        if self.procs.len() != self.exchange.len() {
            return Err(VectorError::InvariantViolation(format!(
                "{} distant procs but {} exchange lists",
                self.procs.len(),
                self.exchange.len()
            )));
        }
        for (&p, list) in self.procs.iter().zip(&self.exchange) {
            if p == me {
                return Err(VectorError::SelfSharing(p));
            }
            if let Some(&dof) = list.iter().find(|&&d| d >= self.ndof) {
                return Err(VectorError::DofOutOfRange {
                    dof,
                    ndof: self.ndof,
                });
            }
            if list.iter().duplicates().next().is_some() {
                return Err(VectorError::InvariantViolation(format!(
                    "duplicate dof in exchange list for rank {p}"
                )));
            }
        }
        if self.master.len() != self.ndof {
            return Err(VectorError::InvariantViolation(
                "master table does not cover every dof".into(),
            ));
        }
        for dof in 0..self.ndof {
            let expect = is_master_among(me, self.sharers(dof).iter().copied());
            if self.master[dof] != expect {
                return Err(VectorError::InvariantViolation(format!(
                    "master flag of dof {dof} disagrees with lowest-rank rule"
                )));
            }
        }
        Ok(())
    }
}

/// How the dofs shared with one rank are ordered on the wire.
#[derive(Clone, Debug)]
enum ExchangeOrder {
    /// Collected pairs; sorted at build time.
    Collected(Vec<usize>),
    /// Order given by the caller, kept verbatim.
    Explicit(Vec<usize>),
}

/// Builder for [`ParallelDofs`].
///
/// Both ends of a sharing pair must list their common dofs in the same order.
/// Collected lists are sorted by global number when one is supplied, by local
/// index otherwise.
#[derive(Clone, Debug)]
pub struct ParallelDofsBuilder<C: Communicator> {
    comm: C,
    ndof: usize,
    entry_size: usize,
    is_complex: bool,
    global_numbers: Option<Vec<u64>>,
    lists: BTreeMap<usize, ExchangeOrder>,
}

impl<C: Communicator> ParallelDofsBuilder<C> {
    pub fn new(comm: C, ndof_local: usize) -> Self {
        Self {
            comm,
            ndof: ndof_local,
            entry_size: 1,
            is_complex: false,
            global_numbers: None,
            lists: BTreeMap::new(),
        }
    }

    pub fn entry_size(mut self, entry_size: usize) -> Self {
        self.entry_size = entry_size;
        self
    }

    pub fn complex(mut self, is_complex: bool) -> Self {
        self.is_complex = is_complex;
        self
    }

    /// Global number of every local dof, used to order collected exchange lists.
    pub fn global_numbering(mut self, local_to_global: Vec<u64>) -> Self {
        self.global_numbers = Some(local_to_global);
        self
    }

    /// Record that local `dof` is also held by `rank`.
    pub fn share(mut self, dof: usize, rank: usize) -> Self {
        self.push(rank, dof);
        self
    }

    /// Record that every dof in `dofs` is also held by `rank`.
    pub fn share_all<I>(mut self, rank: usize, dofs: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        for dof in dofs {
            self.push(rank, dof);
        }
        self
    }

    /// Set the exchange list for `rank` in exactly the given order.
    pub fn exchange_list(mut self, rank: usize, dofs: Vec<usize>) -> Self {
        self.lists.insert(rank, ExchangeOrder::Explicit(dofs));
        self
    }

    fn push(&mut self, rank: usize, dof: usize) {
        match self
            .lists
            .entry(rank)
            .or_insert_with(|| ExchangeOrder::Collected(Vec::new()))
        {
            ExchangeOrder::Collected(v) | ExchangeOrder::Explicit(v) => v.push(dof),
        }
    }

    pub fn build(self) -> Result<ParallelDofs<C>, VectorError> {
        let me = self.comm.rank();
        let size = self.comm.size();
        if self.entry_size == 0 {
            return Err(VectorError::InvalidEntrySize);
        }
        if let Some(l2g) = &self.global_numbers {
            if l2g.len() != self.ndof {
                return Err(VectorError::LayoutMismatch {
                    expected: self.ndof,
                    found: l2g.len(),
                });
            }
        }

        let mut procs = Vec::with_capacity(self.lists.len());
        let mut exchange = Vec::with_capacity(self.lists.len());
        for (rank, order) in self.lists {
            if rank >= size {
                return Err(VectorError::InvalidRank { rank, size });
            }
            if rank == me {
                return Err(VectorError::SelfSharing(rank));
            }
            let list = match order {
                ExchangeOrder::Collected(dofs) => match &self.global_numbers {
                    Some(l2g) => {
                        check_range(&dofs, self.ndof)?;
                        dofs.into_iter()
                            .unique()
                            .sorted_by_key(|&d| l2g[d])
                            .collect()
                    }
                    None => dofs.into_iter().sorted_unstable().dedup().collect(),
                },
                ExchangeOrder::Explicit(dofs) => {
                    if let Some(dup) = dofs.iter().duplicates().next() {
                        return Err(VectorError::InvariantViolation(format!(
                            "dof {dup} listed twice for rank {rank}"
                        )));
                    }
                    dofs
                }
            };
            check_range(&list, self.ndof)?;
            if list.is_empty() {
                continue;
            }
            procs.push(rank);
            exchange.push(list);
        }

        let mut sharers: HashMap<usize, Vec<usize>> = HashMap::new();
        for (&p, list) in procs.iter().zip(&exchange) {
            for &dof in list {
                sharers.entry(dof).or_default().push(p);
            }
        }
        let master = (0..self.ndof)
            .map(|dof| {
                is_master_among(
                    me,
                    sharers.get(&dof).into_iter().flatten().copied(),
                )
            })
            .collect();

        let pd = ParallelDofs {
            comm: self.comm,
            ndof: self.ndof,
            entry_size: self.entry_size,
            is_complex: self.is_complex,
            procs,
            exchange,
            sharers,
            master,
        };
        pd.debug_assert_invariants();
        log::debug!(
            "rank {me}: built dof partition with {} local dofs, {} shared, {} neighbours",
            pd.ndof,
            pd.num_shared_dofs(),
            pd.procs.len()
        );
        Ok(pd)
    }
}

fn check_range(dofs: &[usize], ndof: usize) -> Result<(), VectorError> {
    match dofs.iter().find(|&&d| d >= ndof) {
        Some(&dof) => Err(VectorError::DofOutOfRange { dof, ndof }),
        None => Ok(()),
    }
}
