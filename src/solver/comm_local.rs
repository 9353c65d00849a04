//! In-process communication backend: one thread per rank.
//!
//! Ranks are linked in a chain (rank r talks to r-1 and r+1) by a pair of
//! `mpsc` channels per neighbor. Reductions go through a shared slot vector
//! guarded by a barrier on both sides of the read, and are summed in rank
//! order, so every rank sees a bit-identical result.
//!
//! A rank leaves the group when its `LocalComm` is dropped. From then on the
//! remaining ranks cannot complete a collective: exchanges with the departed
//! peer fail with a transport error and reductions return NaN.

use super::comm::CommunicationBackend;
use crate::error::{HeatError, Result};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

struct Link {
    tx: Sender<Vec<f64>>,
    rx: Mutex<Receiver<Vec<f64>>>,
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    departed: usize,
}

/// Barrier that releases its waiters with `false` once any rank has left.
struct RankBarrier {
    num_ranks: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl RankBarrier {
    fn new(num_ranks: usize) -> Self {
        Self {
            num_ranks,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.departed > 0 {
            return false;
        }
        state.arrived += 1;
        if state.arrived == self.num_ranks {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return true;
        }

        let generation = state.generation;
        loop {
            state = self
                .cvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            // A completed generation wins over a departure that followed it.
            if state.generation != generation {
                return true;
            }
            if state.departed > 0 {
                return false;
            }
        }
    }

    fn leave(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.departed += 1;
        self.cvar.notify_all();
    }
}

/// Shared-memory stand-in for a message-passing communicator.
pub struct LocalComm {
    rank: usize,
    num_ranks: usize,
    links: HashMap<usize, Link>,
    slots: Arc<Mutex<Vec<f64>>>,
    barrier: Arc<RankBarrier>,
}

impl LocalComm {
    /// Create `num_ranks` connected communicators, indexed by rank.
    pub fn group(num_ranks: usize) -> Vec<LocalComm> {
        let slots = Arc::new(Mutex::new(vec![0.0; num_ranks]));
        let barrier = Arc::new(RankBarrier::new(num_ranks.max(1)));

        let mut comms: Vec<LocalComm> = (0..num_ranks)
            .map(|rank| LocalComm {
                rank,
                num_ranks,
                links: HashMap::new(),
                slots: Arc::clone(&slots),
                barrier: Arc::clone(&barrier),
            })
            .collect();

        for upper in 1..num_ranks {
            let lower = upper - 1;
            let (up_tx, up_rx) = mpsc::channel();
            let (down_tx, down_rx) = mpsc::channel();
            comms[lower].links.insert(
                upper,
                Link {
                    tx: up_tx,
                    rx: Mutex::new(down_rx),
                },
            );
            comms[upper].links.insert(
                lower,
                Link {
                    tx: down_tx,
                    rx: Mutex::new(up_rx),
                },
            );
        }
        comms
    }

    fn reduce(&self, local: f64, combine: impl Fn(&[f64]) -> f64) -> f64 {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[self.rank] = local;
        if !self.barrier.wait() {
            return self.abandoned();
        }
        let global = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            combine(&slots[..])
        };
        // Nobody may overwrite a slot until every rank has read them all.
        if !self.barrier.wait() {
            return self.abandoned();
        }
        global
    }

    fn abandoned(&self) -> f64 {
        tracing::warn!(rank = self.rank, "reduction abandoned: a peer rank has exited");
        f64::NAN
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.barrier.leave();
    }
}

impl CommunicationBackend for LocalComm {
    fn all_reduce_sum(&self, local: f64) -> f64 {
        self.reduce(local, |slots| slots.iter().sum())
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        self.reduce(local, |slots| {
            if slots.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                slots.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        })
    }

    fn exchange(&self, peer: usize, send: &[f64], recv: &mut [f64]) -> Result<()> {
        let link = self.links.get(&peer).ok_or_else(|| {
            HeatError::Transport(format!("rank {} has no link to rank {peer}", self.rank))
        })?;

        link.tx
            .send(send.to_vec())
            .map_err(|_| HeatError::Transport(format!("rank {peer} hung up")))?;
        let received = link
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .map_err(|_| HeatError::Transport(format!("rank {peer} hung up")))?;

        if received.len() != recv.len() {
            return Err(HeatError::Transport(format!(
                "rank {} expected {} values from rank {peer}, got {}",
                self.rank,
                recv.len(),
                received.len()
            )));
        }
        recv.copy_from_slice(&received);
        Ok(())
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Run `f` once per rank on `num_ranks` scoped threads and collect the
/// results in rank order. A panic on any rank is re-raised on the caller.
///
/// Each thread owns its communicator, so a rank that returns early (or
/// panics) leaves the group and unblocks its peers.
pub fn run_local<T, F>(num_ranks: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&LocalComm) -> T + Sync,
{
    let comms = LocalComm::group(num_ranks);
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| scope.spawn(move || f(&comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
