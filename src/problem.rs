//! Benchmark problems: source term, boundary values and exact solution.
//!
//! Each problem is a fixed triple of scalar functions `f` (volume source),
//! `g` (value on the horizontal edges `y = ymin`, `y = ymax`) and `h` (value
//! on the vertical edges `x = xmin`, `x = xmax`). They are only evaluated
//! while assembling right-hand sides, never inside the operator.

use crate::config::Config;
use crate::error::{HeatError, Result};
use crate::solver::partition::Subdomain;
use nalgebra::DVector;
use std::f64::consts::PI;
use std::str::FromStr;

/// Which benchmark problem to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Steady state `x(1-x)y(1-y)` on the unit square, homogeneous boundary.
    Polynomial,
    /// Stationary `sin x + cos y` with matching boundary values.
    Trigonometric,
    /// Centered Gaussian source pulsing in time, no closed form.
    Gaussian,
}

impl FromStr for ProblemKind {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polynomial" => Ok(ProblemKind::Polynomial),
            "trigonometric" => Ok(ProblemKind::Trigonometric),
            "gaussian" => Ok(ProblemKind::Gaussian),
            other => Err(HeatError::UnknownProblem(other.to_string())),
        }
    }
}

/// Initial temperature everywhere in the interior.
pub const INITIAL_VALUE: f64 = 1.0;

/// A problem bound to the domain it runs on.
#[derive(Debug, Clone, Copy)]
pub struct Problem {
    pub kind: ProblemKind,
    lx: f64,
    ly: f64,
}

impl Problem {
    pub fn new(kind: ProblemKind, lx: f64, ly: f64) -> Self {
        Self { kind, lx, ly }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.problem, config.lx(), config.ly())
    }

    pub fn f(&self, x: f64, y: f64, t: f64) -> f64 {
        match self.kind {
            ProblemKind::Polynomial => 2.0 * (y - y * y + x - x * x),
            ProblemKind::Trigonometric => x.sin() + y.cos(),
            ProblemKind::Gaussian => {
                (-(x - 0.5 * self.lx).powi(2)).exp()
                    * (-(y - 0.5 * self.ly).powi(2)).exp()
                    * (0.5 * PI * t).cos()
            }
        }
    }

    pub fn g(&self, x: f64, y: f64, _t: f64) -> f64 {
        match self.kind {
            ProblemKind::Polynomial | ProblemKind::Gaussian => 0.0,
            ProblemKind::Trigonometric => x.sin() + y.cos(),
        }
    }

    pub fn h(&self, x: f64, y: f64, _t: f64) -> f64 {
        match self.kind {
            ProblemKind::Polynomial => 0.0,
            ProblemKind::Trigonometric => x.sin() + y.cos(),
            ProblemKind::Gaussian => 1.0,
        }
    }

    /// Closed-form solution, where one exists.
    pub fn exact(&self, x: f64, y: f64, _t: f64) -> Option<f64> {
        match self.kind {
            ProblemKind::Polynomial => Some(x * (1.0 - x) * y * (1.0 - y)),
            ProblemKind::Trigonometric => Some(x.sin() + y.cos()),
            ProblemKind::Gaussian => None,
        }
    }

    /// Right-hand side for the owned points at time `t`.
    ///
    /// `f` plus the Dirichlet contributions of the edges adjacent to the
    /// first/last global row and column, scaled by `D / h^2`.
    pub fn build_source_term(&self, config: &Config, subdomain: &Subdomain, t: f64) -> DVector<f64> {
        let g = &config.grid;
        let d = config.diffusion_coefficient;
        let (dx2, dy2) = (config.dx().powi(2), config.dy().powi(2));

        DVector::from_fn(subdomain.local_size(), |k, _| {
            let (i, j) = subdomain.local_coords(k);
            let row = subdomain.global_row(j);
            let (x, y) = config.point(i, row);

            let mut value = self.f(x, y, t);
            if row == 0 {
                value += d * self.g(x, g.ymin, t) / dy2;
            }
            if row == g.ny - 1 {
                value += d * self.g(x, g.ymax, t) / dy2;
            }
            if i == 0 {
                value += d * self.h(g.xmin, y, t) / dx2;
            }
            if i == g.nx - 1 {
                value += d * self.h(g.xmax, y, t) / dx2;
            }
            value
        })
    }

    /// Exact solution on the owned points, or `None` if the problem has none.
    pub fn build_exact_solution(
        &self,
        config: &Config,
        subdomain: &Subdomain,
        t: f64,
    ) -> Option<DVector<f64>> {
        let values: Option<Vec<f64>> = (0..subdomain.local_size())
            .map(|k| {
                let (i, j) = subdomain.local_coords(k);
                let (x, y) = config.point(i, subdomain.global_row(j));
                self.exact(x, y, t)
            })
            .collect();
        values.map(DVector::from_vec)
    }

    pub fn initial_condition(&self, subdomain: &Subdomain) -> DVector<f64> {
        DVector::from_element(subdomain.local_size(), INITIAL_VALUE)
    }
}
