//! Per-neighbour staging buffers for the cumulate exchange.
//!
//! One receive and one send buffer per distant process, each sized
//! `exchange_dofs(p).len() * entry_size` and addressed by position within that
//! process's exchange list. Buffers are owned by one vector and reallocated
//! whenever it is bound to a different partition.

use crate::data::scalar::Scalar;
use crate::topology::parallel_dofs::DofPartition;

#[derive(Clone, Debug)]
pub struct ExchangeBuffers<V> {
    procs: Vec<usize>,
    entry_size: usize,
    recv: Vec<Vec<V>>,
    send: Vec<Vec<V>>,
}

impl<V: Scalar> ExchangeBuffers<V> {
    /// No neighbours, no storage.
    pub fn empty() -> Self {
        Self {
            procs: Vec::new(),
            entry_size: 1,
            recv: Vec::new(),
            send: Vec::new(),
        }
    }

    /// Allocate buffers matching `dofs`' sharing pattern.
    pub fn for_partition<P: DofPartition>(dofs: &P) -> Self {
        let entry_size = dofs.entry_size();
        let procs = dofs.distant_procs().to_vec();
        let sizes: Vec<usize> = procs
            .iter()
            .map(|&p| dofs.exchange_dofs(p).len() * entry_size)
            .collect();
        Self {
            recv: sizes.iter().map(|&n| vec![V::zero(); n]).collect(),
            send: sizes.iter().map(|&n| vec![V::zero(); n]).collect(),
            procs,
            entry_size,
        }
    }

    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Whether these buffers were allocated for `dofs`' neighbour set and sizes.
    pub fn matches<P: DofPartition>(&self, dofs: &P) -> bool {
        self.procs == dofs.distant_procs()
            && self.entry_size == dofs.entry_size()
            && self
                .procs
                .iter()
                .zip(&self.recv)
                .all(|(&p, buf)| buf.len() == dofs.exchange_dofs(p).len() * self.entry_size)
    }

    pub fn recv_mut(&mut self, k: usize) -> &mut [V] {
        &mut self.recv[k]
    }

    pub fn send(&self, k: usize) -> &[V] {
        &self.send[k]
    }

    /// Gather the blocks of `exchange` from `values` into neighbour `k`'s send buffer.
    pub fn pack(&mut self, k: usize, exchange: &[usize], values: &[V]) {
        let es = self.entry_size;
        for (chunk, &dof) in self.send[k].chunks_exact_mut(es).zip(exchange) {
            chunk.copy_from_slice(&values[dof * es..(dof + 1) * es]);
        }
    }

    /// Add neighbour `k`'s received blocks into the dofs of `exchange`.
    pub fn add_received(&self, k: usize, exchange: &[usize], values: &mut [V]) {
        let es = self.entry_size;
        for (chunk, &dof) in self.recv[k].chunks_exact(es).zip(exchange) {
            for (v, r) in values[dof * es..(dof + 1) * es].iter_mut().zip(chunk) {
                *v += *r;
            }
        }
    }
}
