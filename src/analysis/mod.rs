//! Analysis engine: time integration of the heat equation.

pub mod transient;

use nalgebra::DVector;

/// Transient run results for one rank.
#[derive(Debug)]
pub struct TransientResult {
    /// Times at which the state was advanced to, starting with the initial time.
    pub times: Vec<f64>,
    /// Final state on this rank's points.
    pub solution: DVector<f64>,
    /// CG iterations per step (empty for explicit runs).
    pub cg_iterations: Vec<usize>,
    /// Steps whose CG solve hit the iteration cap.
    pub exhausted_solves: usize,
    /// Global max-abs deviation from the exact solution at the final time,
    /// when the problem has one.
    pub max_error: Option<f64>,
}
