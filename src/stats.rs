//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and solver counters.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
/// Zero cost when `None`: no timing calls, no counter increments.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub time_steps: u32,
    pub cg_iters_per_step: Vec<u32>,
    pub cg_exhausted: u32,
    // Sub-phase accumulators
    pub rhs_assembly: Duration,
    pub linear_solve: Duration,
    pub explicit_update: Duration,
    pub output: Duration,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            time_steps: 0,
            cg_iters_per_step: Vec::new(),
            cg_exhausted: 0,
            rhs_assembly: Duration::ZERO,
            linear_solve: Duration::ZERO,
            explicit_update: Duration::ZERO,
            output: Duration::ZERO,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Mean CG iterations per time step, if any CG solve ran.
    pub fn mean_cg_iterations(&self) -> Option<f64> {
        if self.cg_iters_per_step.is_empty() {
            return None;
        }
        let total: u32 = self.cg_iters_per_step.iter().sum();
        Some(total as f64 / self.cg_iters_per_step.len() as f64)
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== heatcg Performance Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        if self.time_steps > 0 {
            eprintln!("  Time steps:             {}", self.time_steps);
            eprintln!("    RHS assembly:         {:>8.3}s", self.rhs_assembly.as_secs_f64());
            eprintln!("    Explicit update:      {:>8.3}s", self.explicit_update.as_secs_f64());
            eprintln!("    Linear solve:         {:>8.3}s", self.linear_solve.as_secs_f64());
            if let Some(avg) = self.mean_cg_iterations() {
                let max = self.cg_iters_per_step.iter().max().copied().unwrap_or(0);
                eprintln!("      CG avg iters:       {:.1}", avg);
                eprintln!("      CG max iters:       {}", max);
                eprintln!("      CG exhausted:       {}", self.cg_exhausted);
            }
            eprintln!("    Output:               {:>8.3}s", self.output.as_secs_f64());
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_iterations_over_recorded_steps() {
        let mut stats = Stats::new();
        assert_eq!(stats.mean_cg_iterations(), None);
        stats.cg_iters_per_step.extend([4, 6, 8]);
        assert_eq!(stats.mean_cg_iterations(), Some(6.0));
    }
}
