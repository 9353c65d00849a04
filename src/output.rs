//! Results output: solution dumps and the residual log.

use crate::config::Config;
use crate::error::Result;
use crate::solver::partition::Subdomain;
use std::io::Write;

/// Write owned grid values as `x y value` triples.
///
/// One line per owned point, in local row-major order:
/// ```text
/// 0.2 0.2 2.5600000000e-2
/// 0.4 0.2 3.8400000000e-2
/// ```
pub fn write_solution<W: Write>(
    config: &Config,
    subdomain: &Subdomain,
    values: &[f64],
    writer: &mut W,
) -> Result<()> {
    for (k, value) in values.iter().enumerate() {
        let (i, j) = subdomain.local_coords(k);
        let (x, y) = config.point(i, subdomain.global_row(j));
        writeln!(writer, "{} {} {:.10e}", x, y, value)?;
    }
    Ok(())
}

/// Residual-norm trace of the CG solver.
///
/// Only the coordinator holds a writer; on every other rank recording is a
/// no-op. The coordinator flag is supplied by the caller.
pub struct ResidualLog<W: Write> {
    sink: Option<W>,
}

impl<W: Write> ResidualLog<W> {
    /// Log into `writer` if `is_coordinator`, otherwise drop it.
    pub fn new(writer: W, is_coordinator: bool) -> Self {
        Self {
            sink: is_coordinator.then_some(writer),
        }
    }

    /// A log that records nothing.
    pub fn inactive() -> Self {
        Self { sink: None }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Append one residual norm.
    pub fn record(&mut self, residual_norm: f64) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            writeln!(sink, "{:.12e}", residual_norm)?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Option<W> {
        self.sink
    }
}
