//! Matrix-free five-point Laplacian on a row-decomposed grid.
//!
//! The operator is never assembled. Each application exchanges halo rows
//! with the neighboring ranks and then sweeps the local block with the
//! stencil weights `alpha` (vertical), `beta` (horizontal) and `gamma`
//! (diagonal).

use super::comm::CommunicationBackend;
use super::halo::{self, HaloRows};
use super::partition::Subdomain;
use crate::config::{Config, TimeScheme};
use crate::error::{HeatError, Result};
use nalgebra::DVector;

/// Stencil weights of the discrete operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilCoefficients {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl StencilCoefficients {
    /// `ExplicitEuler` gives `dt * A`, `ImplicitEuler` gives `I - dt * A`,
    /// where `A` is the `D`-scaled five-point Laplacian.
    pub fn new(dx: f64, dy: f64, diffusion: f64, dt: f64, scheme: TimeScheme) -> Self {
        let vertical = dt * diffusion / dy.powi(2);
        let horizontal = dt * diffusion / dx.powi(2);
        let diagonal = 2.0 * dt * diffusion * (1.0 / dx.powi(2) + 1.0 / dy.powi(2));
        match scheme {
            TimeScheme::ExplicitEuler => Self {
                alpha: vertical,
                beta: horizontal,
                gamma: -diagonal,
            },
            TimeScheme::ImplicitEuler => Self {
                alpha: -vertical,
                beta: -horizontal,
                gamma: 1.0 + diagonal,
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.dx(),
            config.dy(),
            config.diffusion_coefficient,
            config.time_step,
            config.scheme,
        )
    }
}

/// The discrete operator restricted to one rank's rows.
#[derive(Debug, Clone)]
pub struct Laplacian {
    coefficients: StencilCoefficients,
    subdomain: Subdomain,
}

impl Laplacian {
    pub fn new(coefficients: StencilCoefficients, subdomain: Subdomain) -> Self {
        Self {
            coefficients,
            subdomain,
        }
    }

    pub fn from_config(config: &Config, subdomain: Subdomain) -> Self {
        Self::new(StencilCoefficients::from_config(config), subdomain)
    }

    /// Recompute the coefficients after a configuration change.
    pub fn reinitialize(&mut self, config: &Config) {
        self.coefficients = StencilCoefficients::from_config(config);
    }

    pub fn coefficients(&self) -> StencilCoefficients {
        self.coefficients
    }

    /// Apply the operator to the local slice `x`.
    ///
    /// Blocks on the halo exchange with both neighbors before evaluating
    /// the stencil.
    pub fn mat_vec_prod(
        &self,
        x: &DVector<f64>,
        comm: &dyn CommunicationBackend,
    ) -> Result<DVector<f64>> {
        let size = self.subdomain.local_size();
        if x.len() != size {
            return Err(HeatError::Solve(format!(
                "dimension mismatch: operator block has {size} rows, vector has {}",
                x.len()
            )));
        }
        let halo = halo::exchange(comm, &self.subdomain, x.as_slice())?;
        self.apply_with_halo(x, &halo)
    }

    /// Evaluate the stencil on `x` using an already exchanged halo.
    pub(crate) fn apply_with_halo(
        &self,
        x: &DVector<f64>,
        halo: &HaloRows,
    ) -> Result<DVector<f64>> {
        let StencilCoefficients { alpha, beta, gamma } = self.coefficients;
        let nx = self.subdomain.nx;
        let last_row = self.subdomain.rows.count - 1;

        if x.len() != self.subdomain.local_size()
            || halo.prev.len() != nx
            || halo.next.len() != nx
        {
            return Err(HeatError::Solve(format!(
                "dimension mismatch: block {}x{}, vector {}, halo rows {}/{}",
                nx,
                self.subdomain.rows.count,
                x.len(),
                halo.prev.len(),
                halo.next.len()
            )));
        }

        Ok(DVector::from_fn(x.len(), |k, _| {
            let (i, j) = (k % nx, k / nx);
            let mut value = gamma * x[k];

            value += if j == 0 {
                alpha * halo.prev[i]
            } else {
                alpha * x[k - nx]
            };

            if i != 0 {
                value += beta * x[k - 1];
            }
            if i != nx - 1 {
                value += beta * x[k + 1];
            }

            value += if j == last_row {
                alpha * halo.next[i]
            } else {
                alpha * x[k + nx]
            };
            value
        }))
    }
}
