//! Problem configuration loaded from a TOML file.
//!
//! The file is deserialized into raw sections first and then validated into
//! a [`Config`], which carries the derived grid spacing and the parsed
//! time-integration scheme.

use crate::error::{HeatError, Result};
use crate::problem::ProblemKind;
use serde_derive::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Time-integration scheme. Selects the operator coefficient formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeScheme {
    /// Operator represents `dt * A`.
    ExplicitEuler,
    /// Operator represents `I - dt * A`.
    ImplicitEuler,
}

impl FromStr for TimeScheme {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ExplicitEuler" => Ok(TimeScheme::ExplicitEuler),
            "ImplicitEuler" => Ok(TimeScheme::ImplicitEuler),
            other => Err(HeatError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for TimeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeScheme::ExplicitEuler => write!(f, "ExplicitEuler"),
            TimeScheme::ImplicitEuler => write!(f, "ImplicitEuler"),
        }
    }
}

// ── Raw file layout ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConfigFile {
    grid: GridSection,
    physics: PhysicsSection,
    time: TimeSection,
    solver: SolverSection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Deserialize)]
struct GridSection {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    nx: usize,
    ny: usize,
}

#[derive(Debug, Deserialize)]
struct PhysicsSection {
    diffusion_coefficient: f64,
    problem: String,
}

#[derive(Debug, Deserialize)]
struct TimeSection {
    scheme: String,
    time_step: f64,
    #[serde(default)]
    initial_time: f64,
    final_time: f64,
}

#[derive(Debug, Deserialize)]
struct SolverSection {
    tolerance: f64,
    max_iterations: usize,
}

#[derive(Debug, Deserialize)]
struct OutputSection {
    #[serde(default = "default_results_dir")]
    results_dir: PathBuf,
    #[serde(default)]
    save_every: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            save_every: 0,
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

// ── Validated configuration ─────────────────────────────────────

/// Global grid extents and resolution (interior points only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub nx: usize,
    pub ny: usize,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub grid: GridConfig,
    pub diffusion_coefficient: f64,
    pub problem: ProblemKind,
    pub scheme: TimeScheme,
    pub time_step: f64,
    pub initial_time: f64,
    pub final_time: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub results_dir: PathBuf,
    /// Write a snapshot every `save_every` steps; 0 disables snapshots.
    pub save_every: usize,
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: ConfigFile = toml::from_str(content)?;

        let config = Config {
            grid: GridConfig {
                xmin: raw.grid.xmin,
                xmax: raw.grid.xmax,
                ymin: raw.grid.ymin,
                ymax: raw.grid.ymax,
                nx: raw.grid.nx,
                ny: raw.grid.ny,
            },
            diffusion_coefficient: raw.physics.diffusion_coefficient,
            problem: raw.physics.problem.parse()?,
            scheme: raw.time.scheme.parse()?,
            time_step: raw.time.time_step,
            initial_time: raw.time.initial_time,
            final_time: raw.time.final_time,
            tolerance: raw.solver.tolerance,
            max_iterations: raw.solver.max_iterations,
            results_dir: raw.output.results_dir,
            save_every: raw.output.save_every,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let g = &self.grid;
        if g.nx == 0 || g.ny == 0 {
            return Err(HeatError::Config(format!(
                "grid must have at least one interior point per axis, got {}x{}",
                g.nx, g.ny
            )));
        }
        if !(g.xmax > g.xmin) || !(g.ymax > g.ymin) {
            return Err(HeatError::Config(format!(
                "empty domain [{}, {}] x [{}, {}]",
                g.xmin, g.xmax, g.ymin, g.ymax
            )));
        }
        if !(self.diffusion_coefficient >= 0.0) {
            return Err(HeatError::Config(format!(
                "diffusion coefficient must be non-negative, got {}",
                self.diffusion_coefficient
            )));
        }
        if !(self.time_step > 0.0) || !self.time_step.is_finite() {
            return Err(HeatError::Config(format!(
                "time step must be positive and finite, got {}",
                self.time_step
            )));
        }
        if !self.initial_time.is_finite() || !self.final_time.is_finite() {
            return Err(HeatError::Config(format!(
                "time interval [{}, {}] must be finite",
                self.initial_time, self.final_time
            )));
        }
        if self.final_time < self.initial_time {
            return Err(HeatError::Config(format!(
                "final time {} precedes initial time {}",
                self.final_time, self.initial_time
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(HeatError::Config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Horizontal grid spacing.
    pub fn dx(&self) -> f64 {
        self.lx() / (self.grid.nx + 1) as f64
    }

    /// Vertical grid spacing.
    pub fn dy(&self) -> f64 {
        self.ly() / (self.grid.ny + 1) as f64
    }

    pub fn lx(&self) -> f64 {
        self.grid.xmax - self.grid.xmin
    }

    pub fn ly(&self) -> f64 {
        self.grid.ymax - self.grid.ymin
    }

    /// Number of time steps between `initial_time` and `final_time`.
    pub fn n_steps(&self) -> usize {
        ((self.final_time - self.initial_time) / self.time_step).round() as usize
    }

    /// Physical coordinates of interior point `(i, j)` in global indices.
    pub fn point(&self, i: usize, j: usize) -> (f64, f64) {
        (
            self.grid.xmin + (i + 1) as f64 * self.dx(),
            self.grid.ymin + (j + 1) as f64 * self.dy(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const BASE: &str = r#"
[grid]
xmin = 0.0
xmax = 1.0
ymin = 0.0
ymax = 2.0
nx = 4
ny = 9

[physics]
diffusion_coefficient = 1.0
problem = "polynomial"

[time]
scheme = "ImplicitEuler"
time_step = 0.1
final_time = 1.0

[solver]
tolerance = 1e-8
max_iterations = 200
"#;

    #[test]
    fn parses_and_derives_spacing() {
        let config = Config::from_toml_str(BASE).unwrap();
        assert_eq!(config.scheme, TimeScheme::ImplicitEuler);
        assert_eq!(config.problem, ProblemKind::Polynomial);
        assert_abs_diff_eq!(config.dx(), 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(config.dy(), 0.2, epsilon = 1e-15);
        assert_eq!(config.n_steps(), 10);
        assert_eq!(config.initial_time, 0.0);
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert_eq!(config.save_every, 0);
    }

    #[test]
    fn interior_points_skip_the_boundary() {
        let config = Config::from_toml_str(BASE).unwrap();
        let (x, y) = config.point(0, 0);
        assert_abs_diff_eq!(x, 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(y, 0.2, epsilon = 1e-15);
        let (x, y) = config.point(3, 8);
        assert_abs_diff_eq!(x, 0.8, epsilon = 1e-15);
        assert_abs_diff_eq!(y, 1.8, epsilon = 1e-12);
    }

    #[test]
    fn unsupported_scheme_fails_fast() {
        let text = BASE.replace("ImplicitEuler", "CrankNicolson");
        match Config::from_toml_str(&text) {
            Err(HeatError::UnsupportedScheme(tag)) => assert_eq!(tag, "CrankNicolson"),
            other => panic!("expected UnsupportedScheme, got {other:?}"),
        }
    }

    #[test]
    fn unknown_problem_is_rejected() {
        let text = BASE.replace("\"polynomial\"", "\"cubic\"");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(HeatError::UnknownProblem(_))
        ));
    }

    #[test]
    fn empty_grid_is_rejected() {
        let text = BASE.replace("nx = 4", "nx = 0");
        assert!(matches!(Config::from_toml_str(&text), Err(HeatError::Config(_))));
    }

    #[test]
    fn negative_time_step_is_rejected() {
        let text = BASE.replace("time_step = 0.1", "time_step = -0.1");
        assert!(matches!(Config::from_toml_str(&text), Err(HeatError::Config(_))));
    }

    #[test]
    fn non_finite_times_are_rejected() {
        for (from, to) in [
            ("final_time = 1.0", "final_time = inf"),
            ("final_time = 1.0", "final_time = nan"),
            ("final_time = 1.0", "final_time = 1.0\ninitial_time = -inf"),
            ("time_step = 0.1", "time_step = inf"),
        ] {
            let text = BASE.replace(from, to);
            assert!(
                matches!(Config::from_toml_str(&text), Err(HeatError::Config(_))),
                "accepted {to}"
            );
        }
    }

    #[test]
    fn output_section_overrides_defaults() {
        let text = format!("{BASE}\n[output]\nresults_dir = \"out\"\nsave_every = 5\n");
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.save_every, 5);
    }

    #[test]
    fn scheme_round_trips_through_display() {
        for scheme in [TimeScheme::ExplicitEuler, TimeScheme::ImplicitEuler] {
            assert_eq!(scheme.to_string().parse::<TimeScheme>().unwrap(), scheme);
        }
    }
}
