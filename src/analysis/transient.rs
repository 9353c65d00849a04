//! Transient (time-domain) integration of `du/dt = D Δu + S(t)`.
//!
//! Explicit Euler applies the operator directly:
//! `u(n+1) = u(n) + dt A u(n) + dt S(t(n))`.
//! Implicit Euler solves `(I - dt A) u(n+1) = u(n) + dt S(t(n+1))` with CG,
//! warm-started from the previous state. `S` already carries the Dirichlet
//! edge contributions, so the operator itself stays homogeneous.

use super::TransientResult;
use crate::config::{Config, TimeScheme};
use crate::error::{HeatError, Result};
use crate::output::{self, ResidualLog};
use crate::problem::Problem;
use crate::solver::comm::CommunicationBackend;
use crate::solver::conjugate_gradient::{solve_conj_grad, CgStatus};
use crate::solver::laplacian::Laplacian;
use crate::solver::partition::{RowPartitioner, Subdomain};
use crate::stats::Stats;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::Instant;

/// Run the configured time integration on this rank.
///
/// All ranks must call this together with the same configuration.
pub fn run<W: Write>(
    config: &Config,
    problem: &Problem,
    partitioner: &dyn RowPartitioner,
    comm: &dyn CommunicationBackend,
    residual_log: &mut ResidualLog<W>,
    mut stats: Option<&mut Stats>,
) -> Result<TransientResult> {
    let subdomain = Subdomain::new(
        config.grid.nx,
        config.grid.ny,
        comm.rank(),
        comm.num_ranks(),
        partitioner,
    )?;
    let n_steps = config.n_steps();
    let _span = tracing::info_span!(
        "transient",
        rank = comm.rank(),
        scheme = %config.scheme,
        n_steps
    )
    .entered();
    tracing::debug!(
        start_row = subdomain.rows.start,
        rows = subdomain.rows.count,
        "subdomain assigned"
    );

    let operator = Laplacian::from_config(config, subdomain);
    let dt = config.time_step;

    let mut u = problem.initial_condition(&subdomain);
    let mut t = config.initial_time;
    let mut times = vec![t];
    let mut cg_iterations = Vec::new();
    let mut exhausted_solves = 0;

    for step in 1..=n_steps {
        match config.scheme {
            TimeScheme::ExplicitEuler => {
                let start = Instant::now();
                let source = problem.build_source_term(config, &subdomain, t);
                if let Some(ref mut s) = stats { s.rhs_assembly += start.elapsed(); }

                let start = Instant::now();
                let du = operator.mat_vec_prod(&u, comm)?;
                u += du;
                u.axpy(dt, &source, 1.0);
                if let Some(ref mut s) = stats { s.explicit_update += start.elapsed(); }
            }
            TimeScheme::ImplicitEuler => {
                let start = Instant::now();
                let source = problem.build_source_term(config, &subdomain, t + dt);
                let mut rhs = u.clone();
                rhs.axpy(dt, &source, 1.0);
                if let Some(ref mut s) = stats { s.rhs_assembly += start.elapsed(); }

                let start = Instant::now();
                let outcome = solve_conj_grad(
                    &operator,
                    comm,
                    &rhs,
                    &u,
                    config.tolerance,
                    config.max_iterations,
                    residual_log,
                )?;
                if let Some(ref mut s) = stats {
                    s.linear_solve += start.elapsed();
                    s.cg_iters_per_step.push(outcome.iterations as u32);
                }

                if outcome.status == CgStatus::Exhausted {
                    exhausted_solves += 1;
                    if let Some(ref mut s) = stats { s.cg_exhausted += 1; }
                }
                cg_iterations.push(outcome.iterations);
                u = outcome.solution;
            }
        }

        t = config.initial_time + step as f64 * dt;
        times.push(t);
        if let Some(ref mut s) = stats { s.time_steps += 1; }

        if config.save_every > 0 && step % config.save_every == 0 {
            let start = Instant::now();
            write_snapshot(config, &subdomain, u.as_slice(), step)?;
            if let Some(ref mut s) = stats { s.output += start.elapsed(); }
        }
    }
    residual_log.finish()?;

    // NaN here (a poisoned or abandoned reduction) counts as a failure too.
    let local_bad = u.iter().filter(|v| !v.is_finite()).count() as f64;
    let non_finite = comm.all_reduce_sum(local_bad);
    if non_finite != 0.0 {
        return Err(HeatError::Diverged(format!(
            "state is no longer finite at t = {t} ({non_finite} non-finite values)"
        )));
    }

    let max_error = match problem.build_exact_solution(config, &subdomain, t) {
        Some(exact) => {
            let local = (&u - exact).amax();
            Some(comm.all_reduce_max(local))
        }
        None => None,
    };

    if comm.is_coordinator() {
        match max_error {
            Some(err) => tracing::info!(t, max_error = err, exhausted_solves, "transient run finished"),
            None => tracing::info!(t, exhausted_solves, "transient run finished"),
        }
    }

    Ok(TransientResult {
        times,
        solution: u,
        cg_iterations,
        exhausted_solves,
        max_error,
    })
}

fn write_snapshot(config: &Config, subdomain: &Subdomain, values: &[f64], step: usize) -> Result<()> {
    fs::create_dir_all(&config.results_dir)?;
    let path = config
        .results_dir
        .join(format!("solution_{step:05}_rank{}.dat", subdomain.rank));
    let mut writer = BufWriter::new(File::create(path)?);
    output::write_solution(config, subdomain, values, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::comm::SingleProcessComm;
    use crate::solver::partition::BalancedRows;
    use approx::assert_abs_diff_eq;

    fn config(scheme: &str, dt: f64, final_time: f64) -> Config {
        Config::from_toml_str(&format!(
            "[grid]\nxmin = 0.0\nxmax = 1.0\nymin = 0.0\nymax = 1.0\nnx = 4\nny = 4\n\
             [physics]\ndiffusion_coefficient = 1.0\nproblem = \"polynomial\"\n\
             [time]\nscheme = \"{scheme}\"\ntime_step = {dt}\nfinal_time = {final_time}\n\
             [solver]\ntolerance = 1e-12\nmax_iterations = 200\n"
        ))
        .unwrap()
    }

    #[test]
    fn zero_length_run_returns_initial_condition() {
        let config = config("ImplicitEuler", 0.1, 0.0);
        let problem = Problem::from_config(&config);
        let result = run(
            &config,
            &problem,
            &BalancedRows,
            &SingleProcessComm,
            &mut ResidualLog::<Vec<u8>>::inactive(),
            None,
        )
        .unwrap();
        assert_eq!(result.times, vec![0.0]);
        assert!(result.solution.iter().all(|&v| v == 1.0));
        assert!(result.cg_iterations.is_empty());
    }

    #[test]
    fn explicit_step_matches_hand_computation() {
        let config = config("ExplicitEuler", 0.001, 0.001);
        let problem = Problem::from_config(&config);
        let result = run(
            &config,
            &problem,
            &BalancedRows,
            &SingleProcessComm,
            &mut ResidualLog::<Vec<u8>>::inactive(),
            None,
        )
        .unwrap();

        // Corner point (0,0): two zero-valued boundary neighbors.
        let h2 = config.dx().powi(2);
        let dt = config.time_step;
        let laplacian = (1.0 + 1.0 - 4.0) / h2;
        let (x, y) = config.point(0, 0);
        let expected = 1.0 + dt * laplacian + dt * problem.f(x, y, 0.0);
        assert_abs_diff_eq!(result.solution[0], expected, epsilon = 1e-12);
        assert_eq!(result.times.len(), 2);
    }

    #[test]
    fn implicit_run_counts_iterations_and_stats() {
        let config = config("ImplicitEuler", 0.1, 0.5);
        let problem = Problem::from_config(&config);
        let mut stats = Stats::new();
        let mut log = ResidualLog::new(Vec::new(), true);
        let result = run(
            &config,
            &problem,
            &BalancedRows,
            &SingleProcessComm,
            &mut log,
            Some(&mut stats),
        )
        .unwrap();

        assert_eq!(result.cg_iterations.len(), 5);
        assert_eq!(result.exhausted_solves, 0);
        assert_eq!(stats.time_steps, 5);
        assert_eq!(stats.cg_iters_per_step.len(), 5);

        // One line per CG iteration plus one initial residual per solve.
        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let expected_lines: usize = result.cg_iterations.iter().map(|i| i + 1).sum();
        assert_eq!(text.lines().count(), expected_lines);
    }

    #[test]
    fn exhausted_solves_are_counted_not_fatal() {
        let mut config = config("ImplicitEuler", 0.1, 0.3);
        config.tolerance = 0.0;
        config.max_iterations = 1;
        let problem = Problem::from_config(&config);
        let result = run(
            &config,
            &problem,
            &BalancedRows,
            &SingleProcessComm,
            &mut ResidualLog::<Vec<u8>>::inactive(),
            None,
        )
        .unwrap();
        assert_eq!(result.exhausted_solves, 3);
        assert_eq!(result.cg_iterations, vec![1, 1, 1]);
    }

    #[test]
    fn unstable_explicit_run_is_reported_as_divergence() {
        // dt far above h^2/4: the explicit update amplifies every step.
        let config = config("ExplicitEuler", 1.0, 2000.0);
        let problem = Problem::from_config(&config);
        let result = run(
            &config,
            &problem,
            &BalancedRows,
            &SingleProcessComm,
            &mut ResidualLog::<Vec<u8>>::inactive(),
            None,
        );
        assert!(matches!(result, Err(HeatError::Diverged(_))));
    }
}
