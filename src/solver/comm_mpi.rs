//! MPI communication backend for distributed solvers.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements `CommunicationBackend` using `mpi::traits::*` for
//! inter-process communication (all-reduce, neighbor exchange).
//!
//! # Usage
//!
//! The caller must initialize MPI before constructing `MpiComm` and keep the
//! universe alive for as long as the communicator is used:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```

use super::comm::CommunicationBackend;
use crate::error::{HeatError, Result};
use mpi::collective::SystemOperation;
use mpi::point_to_point::send_receive_into;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// MPI-based communication backend over the world communicator.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI communication backend.
    ///
    /// Panics if MPI has not been initialized via `mpi::initialize()`.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationBackend for MpiComm {
    fn all_reduce_sum(&self, local: f64) -> f64 {
        let world = SimpleCommunicator::world();
        let mut global = 0.0f64;
        world.all_reduce_into(&local, &mut global, SystemOperation::sum());
        global
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        let world = SimpleCommunicator::world();
        let mut global = 0.0f64;
        world.all_reduce_into(&local, &mut global, SystemOperation::max());
        global
    }

    fn exchange(&self, peer: usize, send: &[f64], recv: &mut [f64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        if peer >= world.size() as usize {
            return Err(HeatError::Transport(format!(
                "peer rank {peer} outside world of size {}",
                world.size()
            )));
        }
        let process = world.process_at_rank(peer as i32);
        // Combined send/receive: both sides post at once, so the chain
        // exchange cannot deadlock regardless of which neighbor goes first.
        let status = send_receive_into(send, &process, recv, &process);
        let received = status.count(f64::equivalent_datatype()) as usize;
        if received != recv.len() {
            return Err(HeatError::Transport(format!(
                "expected {} values from rank {peer}, got {received}",
                recv.len()
            )));
        }
        Ok(())
    }

    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn num_ranks(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn barrier(&self) {
        let world = SimpleCommunicator::world();
        world.barrier();
    }
}
