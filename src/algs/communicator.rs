//! Thin façade over intra-process (Rayon) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the synchronization engine
//! calls `.wait()` (or [`wait_any`]) before it trusts that a buffer is ready.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::vector_error::VectorError;

/// Typed message tag. Distinct synchronization epochs use distinct tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;

    /// Non-blocking completion check. Handles that cannot tell report ready,
    /// which degrades [`wait_any`] to posting order.
    fn is_ready(&mut self) -> bool {
        true
    }
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Non-blocking point-to-point messaging plus the two collectives the vectors need.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank in the communicator.
    fn rank(&self) -> usize;
    /// Number of processes in the communicator.
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self);

    /// Element-wise global sum; every rank ends up with the same values.
    fn allreduce_sum(&self, vals: &mut [f64]);

    /// `isend` with the peer checked against the communicator size.
    fn isend_result(
        &self,
        peer: usize,
        tag: u16,
        buf: &[u8],
    ) -> Result<Self::SendHandle, VectorError> {
        check_peer(peer, self.rank(), self.size())?;
        Ok(self.isend(peer, tag, buf))
    }

    /// `irecv` with the peer checked against the communicator size.
    fn irecv_result(
        &self,
        peer: usize,
        tag: u16,
        buf: &mut [u8],
    ) -> Result<Self::RecvHandle, VectorError> {
        check_peer(peer, self.rank(), self.size())?;
        Ok(self.irecv(peer, tag, buf))
    }
}

fn check_peer(peer: usize, me: usize, size: usize) -> Result<(), VectorError> {
    if peer >= size {
        return Err(VectorError::InvalidRank { rank: peer, size });
    }
    if peer == me && size > 1 {
        return Err(VectorError::SelfSharing(peer));
    }
    Ok(())
}

/// Drain every handle. An empty set is fine.
pub fn wait_all<H, I>(handles: I)
where
    H: Wait,
    I: IntoIterator<Item = H>,
{
    for h in handles {
        let _ = h.wait();
    }
}

/// Complete whichever pending handle finishes first and remove it from `pending`.
///
/// Returns `None` once `pending` is empty. The key travels with the handle so
/// callers can tell which exchange completed.
pub fn wait_any<K, H: Wait>(pending: &mut Vec<(K, H)>) -> Option<(K, Option<Vec<u8>>)> {
    if pending.is_empty() {
        return None;
    }
    loop {
        if let Some(i) = pending.iter_mut().position(|(_, h)| h.is_ready()) {
            let (key, h) = pending.swap_remove(i);
            return Some((key, h.wait()));
        }
        std::thread::yield_now();
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
    fn barrier(&self) {}
    fn allreduce_sum(&self, _vals: &mut [f64]) {}
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// Point-to-point slots. Sends and receives on the same key are paired by
/// posting order, mirroring MPI's non-overtaking rule.
#[derive(Default)]
struct Mailbox {
    slots: DashMap<(Key, u64), Bytes>,
    sent: DashMap<Key, u64>,
    posted: DashMap<Key, u64>,
}

impl Mailbox {
    fn next_seq(counter: &DashMap<Key, u64>, key: Key) -> u64 {
        let mut c = counter.entry(key).or_insert(0);
        let seq = *c;
        *c += 1;
        seq
    }
}

#[derive(Default)]
struct CollectiveState {
    generation: u64,
    arrived: usize,
    contributions: VecDeque<(usize, Vec<f64>)>,
    result: Vec<f64>,
}

/// Shared state of one in-process world.
#[derive(Default)]
struct LocalWorld {
    mailbox: Mailbox,
    state: Mutex<CollectiveState>,
    cv: Condvar,
}

impl LocalWorld {
    /// Rendezvous of all `size` ranks; contributions are summed in rank order.
    fn all_reduce(&self, rank: usize, size: usize, vals: &mut [f64]) {
        let mut st = self.state.lock();
        st.contributions.push_back((rank, vals.to_vec()));
        st.arrived += 1;
        let generation = st.generation;
        if st.arrived == size {
            let mut parts: Vec<_> = st.contributions.drain(..).collect();
            parts.sort_unstable_by_key(|(r, _)| *r);
            let mut acc = vec![0.0; vals.len()];
            for (_, part) in &parts {
                for (a, x) in acc.iter_mut().zip(part) {
                    *a += *x;
                }
            }
            st.result = acc;
            st.arrived = 0;
            st.generation = st.generation.wrapping_add(1);
            self.cv.notify_all();
        } else {
            while st.generation == generation {
                self.cv.wait(&mut st);
            }
        }
        let n = vals.len().min(st.result.len());
        vals[..n].copy_from_slice(&st.result[..n]);
    }
}

static GLOBAL_WORLD: Lazy<Arc<LocalWorld>> = Lazy::new(|| Arc::new(LocalWorld::default()));

/// Receive handle of [`RayonComm`]; the message is claimed at `wait` time.
///
/// The payload is returned whole, so a message longer than the posted buffer
/// reaches the caller's length check instead of being cut.
pub struct LocalHandle {
    world: Arc<LocalWorld>,
    slot: (Key, u64),
}

impl fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHandle")
            .field("slot", &self.slot)
            .finish()
    }
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some((_, bytes)) = self.world.mailbox.slots.remove(&self.slot) {
                return Some(bytes.to_vec());
            }
            std::thread::yield_now();
        }
    }

    fn is_ready(&mut self) -> bool {
        self.world.mailbox.slots.contains_key(&self.slot)
    }
}

/// In-process communicator: one thread plays one rank.
#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    world: Arc<LocalWorld>,
}

impl fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RayonComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl RayonComm {
    /// Join the process-global world as `rank` of `size`.
    ///
    /// All `new` communicators share one mailbox; tests using it should not run
    /// concurrently on the same tags.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            world: Arc::clone(&GLOBAL_WORLD),
        }
    }

    /// `size` communicators sharing a private mailbox, index = rank.
    pub fn world(size: usize) -> Vec<Self> {
        let world = Arc::new(LocalWorld::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                world: Arc::clone(&world),
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        let seq = Mailbox::next_seq(&self.world.mailbox.sent, key);
        self.world
            .mailbox
            .slots
            .insert((key, seq), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        let key = (peer, self.rank, tag);
        let seq = Mailbox::next_seq(&self.world.mailbox.posted, key);
        LocalHandle {
            world: Arc::clone(&self.world),
            slot: (key, seq),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.world.all_reduce(self.rank, self.size, &mut []);
    }

    fn allreduce_sum(&self, vals: &mut [f64]) {
        if self.size <= 1 {
            return;
        }
        self.world.all_reduce(self.rank, self.size, vals);
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::datatype::Equivalence;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiComm {
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Arc<Universe>,
    }

    // SAFETY: MPI is initialized at the default (funneled) thread level and the
    // crate only drives a communicator from the thread that owns the vector.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new() -> Result<Self, VectorError> {
            let universe = mpi::initialize().ok_or_else(|| VectorError::CommError {
                neighbor: 0,
                source: "MPI already initialized or unavailable".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: Arc::new(universe),
            })
        }
    }

    /// Request plus the byte buffer it reads from / writes into.
    ///
    /// The buffer lives on the heap and is never touched until the request
    /// completes, so handing MPI a `'static` view of it is sound.
    pub struct MpiHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        buf: Vec<u8>,
        received: Option<usize>,
        is_recv: bool,
    }

    // SAFETY: see `MpiComm`.
    unsafe impl Send for MpiHandle {}

    impl MpiHandle {
        fn record(&mut self, status: mpi::point_to_point::Status) {
            if self.is_recv {
                let n = status.count(u8::equivalent_datatype());
                self.received = Some(n.max(0) as usize);
            }
        }
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.req.take() {
                let status = req.wait();
                self.record(status);
            }
            if !self.is_recv {
                return None;
            }
            let mut data = std::mem::take(&mut self.buf);
            if let Some(n) = self.received {
                data.truncate(n);
            }
            Some(data)
        }

        fn is_ready(&mut self) -> bool {
            match self.req.take() {
                None => true,
                Some(req) => match req.test() {
                    Ok(status) => {
                        self.record(status);
                        true
                    }
                    Err(req) => {
                        self.req = Some(req);
                        false
                    }
                },
            }
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            if let Some(req) = self.req.take() {
                req.wait();
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let owned = buf.to_vec();
            // SAFETY: `owned` is moved into the handle and outlives the request.
            let view: &'static [u8] =
                unsafe { std::slice::from_raw_parts(owned.as_ptr(), owned.len()) };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, view, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: owned,
                received: None,
                is_recv: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let mut owned = vec![0u8; buf.len()];
            // SAFETY: as in `isend`; the vector is not read until completion.
            let view: &'static mut [u8] =
                unsafe { std::slice::from_raw_parts_mut(owned.as_mut_ptr(), owned.len()) };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, view, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: owned,
                received: None,
                is_recv: true,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn allreduce_sum(&self, vals: &mut [f64]) {
            let local = vals.to_vec();
            self.world
                .all_reduce_into(&local[..], vals, SystemOperation::sum());
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let comms = RayonComm::world(2);
        let (comm0, comm1) = (&comms[0], &comms[1]);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        let send_handle = comm0.isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn receives_match_in_posting_order() {
        let comms = RayonComm::world(2);
        let mut b = [0u8; 1];
        let first = comms[1].irecv(0, 3, &mut b);
        let second = comms[1].irecv(0, 3, &mut b);
        comms[0].isend(1, 3, &[10]);
        comms[0].isend(1, 3, &[20]);
        assert_eq!(second.wait(), Some(vec![20]));
        assert_eq!(first.wait(), Some(vec![10]));
    }

    #[test]
    fn wait_any_returns_ready_handle_first() {
        let comms = RayonComm::world(3);
        let mut b = [0u8; 1];
        let mut pending = vec![
            (1usize, comms[0].irecv(1, 5, &mut b)),
            (2usize, comms[0].irecv(2, 5, &mut b)),
        ];
        comms[2].isend(0, 5, &[2]);
        let (who, data) = wait_any(&mut pending).expect("one pending");
        assert_eq!(who, 2);
        assert_eq!(data, Some(vec![2]));
        comms[1].isend(0, 5, &[1]);
        let (who, data) = wait_any(&mut pending).expect("one pending");
        assert_eq!(who, 1);
        assert_eq!(data, Some(vec![1]));
        assert!(wait_any(&mut pending).is_none());
    }

    #[test]
    fn wait_on_empty_sets_is_fine() {
        let mut none: Vec<(usize, ())> = Vec::new();
        assert!(wait_any(&mut none).is_none());
        wait_all(Vec::<()>::new());
    }

    #[test]
    fn result_variants_reject_bad_peers() {
        let comms = RayonComm::world(2);
        let err = comms[0].isend_result(5, 1, &[]).unwrap_err();
        assert!(matches!(err, VectorError::InvalidRank { rank: 5, size: 2 }));
        let mut b = [0u8; 1];
        let err = comms[0].irecv_result(0, 1, &mut b).unwrap_err();
        assert!(matches!(err, VectorError::SelfSharing(0)));
    }

    #[test]
    fn allreduce_sums_across_threads() {
        let comms = RayonComm::world(3);
        let sums: Vec<Vec<f64>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let mut v = [c.rank() as f64, 1.0];
                        c.allreduce_sum(&mut v);
                        c.barrier();
                        let mut again = [2.0];
                        c.allreduce_sum(&mut again);
                        vec![v[0], v[1], again[0]]
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for s in sums {
            assert_eq!(s, vec![3.0, 3.0, 6.0]);
        }
    }
}
