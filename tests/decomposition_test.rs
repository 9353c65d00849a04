//! Row decomposition must be invisible to the numerics: splitting the grid
//! across ranks reproduces the single-rank operator and solver.

use approx::assert_abs_diff_eq;
use heatcg::config::TimeScheme;
use heatcg::output::ResidualLog;
use heatcg::solver::comm::{CommunicationBackend, SingleProcessComm};
use heatcg::solver::comm_local::run_local;
use heatcg::solver::conjugate_gradient::{solve_conj_grad, CgStatus};
use heatcg::solver::laplacian::{Laplacian, StencilCoefficients};
use heatcg::solver::partition::Subdomain;
use nalgebra::DVector;

const NX: usize = 5;
const NY: usize = 8;

fn coefficients(scheme: TimeScheme) -> StencilCoefficients {
    let dx = 1.0 / (NX + 1) as f64;
    let dy = 1.0 / (NY + 1) as f64;
    StencilCoefficients::new(dx, dy, 1.0, 0.01, scheme)
}

/// A global vector with no symmetry, so misplaced halo rows show up.
fn global_vector() -> Vec<f64> {
    (0..NX * NY)
        .map(|k| (k as f64 * 0.731).sin() + 0.01 * k as f64)
        .collect()
}

fn local_slice(sub: &Subdomain, global: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(&global[sub.global_range()])
}

/// Apply the operator on `num_ranks` ranks and concatenate in rank order.
fn distributed_mat_vec(num_ranks: usize, scheme: TimeScheme) -> Vec<f64> {
    let global = global_vector();
    let parts = run_local(num_ranks, |comm| {
        let sub = Subdomain::balanced(NX, NY, comm.rank(), num_ranks).unwrap();
        let op = Laplacian::new(coefficients(scheme), sub);
        op.mat_vec_prod(&local_slice(&sub, &global), comm).unwrap()
    });
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}

fn single_rank_mat_vec(scheme: TimeScheme) -> Vec<f64> {
    let sub = Subdomain::balanced(NX, NY, 0, 1).unwrap();
    let op = Laplacian::new(coefficients(scheme), sub);
    let x = DVector::from_vec(global_vector());
    op.mat_vec_prod(&x, &SingleProcessComm)
        .unwrap()
        .iter()
        .copied()
        .collect()
}

// ── Operator ────────────────────────────────────────────────────

#[test]
fn mat_vec_is_decomposition_transparent_for_even_splits() {
    for scheme in [TimeScheme::ExplicitEuler, TimeScheme::ImplicitEuler] {
        let reference = single_rank_mat_vec(scheme);
        for num_ranks in [2, 4, 8] {
            assert_eq!(
                distributed_mat_vec(num_ranks, scheme),
                reference,
                "{num_ranks} ranks, {scheme}"
            );
        }
    }
}

#[test]
fn mat_vec_is_decomposition_transparent_for_uneven_splits() {
    let reference = single_rank_mat_vec(TimeScheme::ImplicitEuler);
    for num_ranks in [3, 5, 7] {
        assert_eq!(
            distributed_mat_vec(num_ranks, TimeScheme::ImplicitEuler),
            reference,
            "{num_ranks} ranks"
        );
    }
}

#[test]
fn distributed_mat_vec_is_repeatable() {
    let first = distributed_mat_vec(4, TimeScheme::ExplicitEuler);
    let second = distributed_mat_vec(4, TimeScheme::ExplicitEuler);
    assert_eq!(first, second);
}

// ── Solver ──────────────────────────────────────────────────────

struct RankSolve {
    solution: Vec<f64>,
    iterations: usize,
    status: CgStatus,
    history: Vec<f64>,
}

fn distributed_solve(num_ranks: usize) -> Vec<RankSolve> {
    let rhs = global_vector();
    run_local(num_ranks, |comm| {
        let sub = Subdomain::balanced(NX, NY, comm.rank(), num_ranks).unwrap();
        let op = Laplacian::new(coefficients(TimeScheme::ImplicitEuler), sub);
        let b = local_slice(&sub, &rhs);
        let out = solve_conj_grad(
            &op,
            comm,
            &b,
            &DVector::zeros(sub.local_size()),
            1e-12,
            500,
            &mut ResidualLog::<Vec<u8>>::inactive(),
        )
        .unwrap();
        RankSolve {
            solution: out.solution.iter().copied().collect(),
            iterations: out.iterations,
            status: out.status,
            history: out.residual_history,
        }
    })
}

#[test]
fn cg_agrees_with_single_rank_solve() {
    let reference = distributed_solve(1);
    let reference_solution = &reference[0].solution;

    for num_ranks in [2, 3, 4] {
        let ranks = distributed_solve(num_ranks);
        let solution: Vec<f64> = ranks.iter().flat_map(|r| r.solution.clone()).collect();
        assert_eq!(solution.len(), reference_solution.len());
        for (got, want) in solution.iter().zip(reference_solution) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-10);
        }
    }
}

#[test]
fn every_rank_reaches_the_same_decision() {
    let ranks = distributed_solve(4);
    let first = &ranks[0];
    assert_eq!(first.status, CgStatus::Converged);
    for rank in &ranks[1..] {
        assert_eq!(rank.iterations, first.iterations);
        assert_eq!(rank.status, first.status);
        // Reductions are summed in rank order, so the traces are bit-identical.
        assert_eq!(rank.history, first.history);
    }
}
