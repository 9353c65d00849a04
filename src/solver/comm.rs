//! Communication backend abstraction for distributed solvers.
//!
//! Provides a trait for cross-rank coordination (scalar reductions and
//! paired neighbor exchange) and a no-op single-process implementation.

use crate::error::{HeatError, Result};

/// Abstraction over inter-process communication for distributed solvers.
///
/// Implementations: `SingleProcessComm` (no-op), `LocalComm` (threads in one
/// process), `MpiComm` (via mpi crate). Every method is blocking: a rank
/// returns only once its matched peers have taken part.
pub trait CommunicationBackend: Send + Sync {
    /// Sum a local scalar across all ranks.
    fn all_reduce_sum(&self, local: f64) -> f64;

    /// Max of a local scalar across all ranks.
    fn all_reduce_max(&self, local: f64) -> f64;

    /// Paired send/receive with `peer`.
    ///
    /// Sends `send` to `peer` and fills `recv` with the buffer the peer sends
    /// back in its mirrored call. Both buffers must have the same length on
    /// both sides.
    fn exchange(&self, peer: usize, send: &[f64], recv: &mut [f64]) -> Result<()>;

    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn num_ranks(&self) -> usize;

    /// Whether this rank is the single writer for shared diagnostics.
    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Synchronization barrier.
    fn barrier(&self);
}

/// No-op communication backend for single-process execution.
///
/// Reductions pass through unchanged. There are no peers, so any exchange
/// request is a topology error.
pub struct SingleProcessComm;

impl CommunicationBackend for SingleProcessComm {
    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        local
    }

    fn exchange(&self, peer: usize, _send: &[f64], _recv: &mut [f64]) -> Result<()> {
        Err(HeatError::Transport(format!(
            "single process has no peer rank {peer}"
        )))
    }

    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn barrier(&self) {}
}
