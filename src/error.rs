use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported time scheme: {0} (expected ExplicitEuler or ImplicitEuler)")]
    UnsupportedScheme(String),

    #[error("Unknown problem: {0} (expected polynomial, trigonometric or gaussian)")]
    UnknownProblem(String),

    #[error("Partition error: {0}")]
    Partition(String),

    #[error("Solve error: {0}")]
    Solve(String),

    #[error("CG breakdown at iteration {iteration}: z.p = {z_dot_p}")]
    SingularOrStagnant { iteration: usize, z_dot_p: f64 },

    #[error("Solver diverged: {0}")]
    Diverged(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HeatError>;
