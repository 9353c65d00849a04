use clap::Parser;
use heatcg::analysis::transient;
use heatcg::config::Config;
use heatcg::error::Result;
use heatcg::output::{self, ResidualLog};
use heatcg::problem::Problem;
use heatcg::solver::comm::CommunicationBackend;
use heatcg::solver::comm_local::run_local;
use heatcg::solver::partition::{BalancedRows, Subdomain};
use heatcg::stats::Stats;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Distributed matrix-free heat equation solver
#[derive(Parser)]
#[command(name = "heatcg", version)]
struct Cli {
    /// TOML configuration file
    config: PathBuf,

    /// Number of in-process ranks (one thread each)
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// Run on the MPI world communicator instead of in-process ranks
    #[cfg(feature = "distributed")]
    #[arg(long)]
    mpi: bool,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", cli.config.display(), e);
        std::process::exit(1);
    });

    #[cfg(feature = "distributed")]
    {
        if cli.mpi {
            let stats = run_mpi(&config, cli.stats).unwrap_or_else(|e| {
                eprintln!("Run error: {}", e);
                std::process::exit(1);
            });
            if let Some(ref stats) = stats {
                stats.display();
            }
            return;
        }
    }

    if cli.ranks == 0 || cli.ranks > config.grid.ny {
        eprintln!(
            "Error: --ranks must be between 1 and ny = {}, got {}",
            config.grid.ny, cli.ranks
        );
        std::process::exit(1);
    }

    tracing::info!(
        ranks = cli.ranks,
        nx = config.grid.nx,
        ny = config.grid.ny,
        scheme = %config.scheme,
        "starting run"
    );

    let results = run_local(cli.ranks, |comm| run_rank(&config, comm, cli.stats));
    let mut coordinator_stats = None;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(stats) => coordinator_stats = coordinator_stats.or(stats),
            Err(e) => {
                eprintln!("Run error on rank {}: {}", rank, e);
                std::process::exit(1);
            }
        }
    }

    if let Some(ref stats) = coordinator_stats {
        stats.display();
    }
}

#[cfg(feature = "distributed")]
fn run_mpi(config: &Config, collect_stats: bool) -> Result<Option<Stats>> {
    use heatcg::error::HeatError;
    use heatcg::solver::comm_mpi::MpiComm;

    let _universe = mpi::initialize()
        .ok_or_else(|| HeatError::Transport("MPI was already initialized".into()))?;
    let comm = MpiComm::new();
    run_rank(config, &comm, collect_stats)
}

/// Run one rank end to end. Returns the stats table on the coordinator.
fn run_rank(
    config: &Config,
    comm: &dyn CommunicationBackend,
    collect_stats: bool,
) -> Result<Option<Stats>> {
    let mut stats = collect_stats.then(Stats::new);
    let problem = Problem::from_config(config);
    fs::create_dir_all(&config.results_dir)?;

    let mut residual_log = if comm.is_coordinator() {
        let file = File::create(config.results_dir.join("residuals.dat"))?;
        ResidualLog::new(BufWriter::new(file), true)
    } else {
        ResidualLog::inactive()
    };

    let start = Instant::now();
    let result = transient::run(
        config,
        &problem,
        &BalancedRows,
        comm,
        &mut residual_log,
        stats.as_mut(),
    )?;
    if let Some(ref mut s) = stats { s.add_phase("Time integration", start.elapsed()); }

    let start = Instant::now();
    let subdomain = Subdomain::balanced(
        config.grid.nx,
        config.grid.ny,
        comm.rank(),
        comm.num_ranks(),
    )?;
    let t_final = result.times.last().copied().unwrap_or(config.initial_time);

    let path = config
        .results_dir
        .join(format!("solution_rank{}.dat", comm.rank()));
    let mut writer = BufWriter::new(File::create(path)?);
    output::write_solution(config, &subdomain, result.solution.as_slice(), &mut writer)?;
    writer.flush()?;

    if let Some(exact) = problem.build_exact_solution(config, &subdomain, t_final) {
        let path = config
            .results_dir
            .join(format!("exact_rank{}.dat", comm.rank()));
        let mut writer = BufWriter::new(File::create(path)?);
        output::write_solution(config, &subdomain, exact.as_slice(), &mut writer)?;
        writer.flush()?;
    }
    if let Some(ref mut s) = stats { s.add_phase("Result output", start.elapsed()); }

    // Every rank's files are on disk once the coordinator passes this.
    comm.barrier();
    if comm.is_coordinator() {
        tracing::info!(dir = %config.results_dir.display(), "results written");
    }

    Ok(stats.filter(|_| comm.is_coordinator()))
}
