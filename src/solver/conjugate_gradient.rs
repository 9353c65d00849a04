//! Distributed Conjugate Gradient solver on the matrix-free Laplacian.
//!
//! Every dot product is a local partial sum followed by `all_reduce_sum`, so
//! all ranks agree on the step sizes and on the stopping decision. A NaN on
//! any rank poisons the reduction and is reported by every rank.

use super::comm::CommunicationBackend;
use super::laplacian::Laplacian;
use crate::error::{HeatError, Result};
use crate::output::ResidualLog;
use nalgebra::DVector;
use std::io::Write;

/// Terminal state of a CG solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgStatus {
    /// Residual norm at or below the tolerance.
    Converged,
    /// Iteration cap reached with the residual still above the tolerance.
    Exhausted,
}

/// Result of a CG solve. `solution` is this rank's slice.
#[derive(Debug, Clone)]
pub struct CgOutcome {
    pub solution: DVector<f64>,
    pub iterations: usize,
    /// Global L2 norm of the final residual.
    pub residual_norm: f64,
    pub status: CgStatus,
    /// Global residual norms, initial residual first.
    pub residual_history: Vec<f64>,
}

impl CgOutcome {
    pub fn converged(&self) -> bool {
        self.status == CgStatus::Converged
    }
}

/// Global dot product.
fn global_dot(comm: &dyn CommunicationBackend, a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    comm.all_reduce_sum(a.dot(b))
}

fn checked_norm(squared: f64, iteration: usize) -> Result<f64> {
    let norm = squared.sqrt();
    if !norm.is_finite() {
        return Err(HeatError::Diverged(format!(
            "non-finite residual norm at iteration {iteration}"
        )));
    }
    Ok(norm)
}

/// Solve `A x = b` by CG starting from `x0`.
///
/// Iterates while the global residual norm exceeds `tolerance` and fewer than
/// `max_iterations` iterations have run. Hitting the cap is not an error:
/// the best-effort iterate comes back with [`CgStatus::Exhausted`].
///
/// Every residual norm, starting with the initial one, is appended to
/// `residual_log`.
pub fn solve_conj_grad<W: Write>(
    operator: &Laplacian,
    comm: &dyn CommunicationBackend,
    b: &DVector<f64>,
    x0: &DVector<f64>,
    tolerance: f64,
    max_iterations: usize,
    residual_log: &mut ResidualLog<W>,
) -> Result<CgOutcome> {
    let _span = tracing::debug_span!(
        "solve_conj_grad",
        rank = comm.rank(),
        local_size = b.len()
    )
    .entered();

    if b.len() != x0.len() {
        return Err(HeatError::Solve(format!(
            "dimension mismatch: rhs has {} entries, initial guess has {}",
            b.len(),
            x0.len()
        )));
    }

    let mut x = x0.clone();
    let mut res = b - operator.mat_vec_prod(x0, comm)?;
    let mut p = res.clone();

    let mut beta = checked_norm(global_dot(comm, &res, &res), 0)?;
    let mut history = vec![beta];
    residual_log.record(beta)?;

    let mut iterations = 0;
    while beta > tolerance && iterations < max_iterations {
        let z = operator.mat_vec_prod(&p, comm)?;

        let res_dot_p = global_dot(comm, &res, &p);
        let z_dot_p = global_dot(comm, &z, &p);
        if z_dot_p == 0.0 || !z_dot_p.is_finite() {
            return Err(HeatError::SingularOrStagnant {
                iteration: iterations,
                z_dot_p,
            });
        }
        let step = res_dot_p / z_dot_p;

        // x += step p, res -= step z
        x.axpy(step, &p, 1.0);
        res.axpy(-step, &z, 1.0);

        let new_res_dot_res = global_dot(comm, &res, &res);
        let gamma = new_res_dot_res / (beta * beta);

        // p = res + gamma p
        p.axpy(1.0, &res, gamma);

        iterations += 1;
        beta = checked_norm(new_res_dot_res, iterations)?;
        history.push(beta);
        residual_log.record(beta)?;
    }

    let status = if beta > tolerance {
        CgStatus::Exhausted
    } else {
        CgStatus::Converged
    };

    if comm.is_coordinator() {
        match status {
            CgStatus::Converged => tracing::debug!(
                iterations,
                residual = beta,
                "CG converged"
            ),
            CgStatus::Exhausted => tracing::warn!(
                max_iterations,
                residual = beta,
                "CG did not converge"
            ),
        }
    }

    Ok(CgOutcome {
        solution: x,
        iterations,
        residual_norm: beta,
        status,
        residual_history: history,
    })
}
