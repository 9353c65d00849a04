//! Row-block partitioning of the structured grid across ranks.
//!
//! Each rank owns a contiguous block of grid rows. The split itself is
//! delegated to a [`RowPartitioner`] so a different policy can be plugged in
//! without touching the operator.

use crate::error::{HeatError, Result};
use std::ops::Range;

/// A contiguous range of global grid rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBlock {
    /// First owned global row.
    pub start: usize,
    /// Number of owned rows.
    pub count: usize,
}

impl RowBlock {
    /// One past the last owned global row.
    pub fn end(&self) -> usize {
        self.start + self.count
    }
}

/// Row partitioner trait. Returns the block of rows owned by `rank`.
pub trait RowPartitioner {
    fn partition(&self, ny: usize, rank: usize, num_ranks: usize) -> Result<RowBlock>;
}

/// Splits rows as evenly as possible; the `ny % num_ranks` leftover rows go
/// one each to the lowest ranks.
pub struct BalancedRows;

impl RowPartitioner for BalancedRows {
    fn partition(&self, ny: usize, rank: usize, num_ranks: usize) -> Result<RowBlock> {
        if num_ranks == 0 {
            return Err(HeatError::Partition("rank count must be positive".into()));
        }
        if rank >= num_ranks {
            return Err(HeatError::Partition(format!(
                "rank {rank} out of range for {num_ranks} ranks"
            )));
        }
        if num_ranks > ny {
            return Err(HeatError::Partition(format!(
                "{num_ranks} ranks cannot share {ny} grid rows"
            )));
        }

        let base = ny / num_ranks;
        let remainder = ny % num_ranks;
        let count = base + usize::from(rank < remainder);
        let start = rank * base + rank.min(remainder);
        Ok(RowBlock { start, count })
    }
}

/// The part of the global grid owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subdomain {
    pub nx: usize,
    pub ny: usize,
    pub rows: RowBlock,
    pub rank: usize,
    pub num_ranks: usize,
}

impl Subdomain {
    /// Build the subdomain for `rank` using the given partitioner.
    pub fn new(
        nx: usize,
        ny: usize,
        rank: usize,
        num_ranks: usize,
        partitioner: &dyn RowPartitioner,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(HeatError::Partition(format!(
                "grid must be non-empty, got {nx}x{ny}"
            )));
        }
        let rows = partitioner.partition(ny, rank, num_ranks)?;
        Ok(Self {
            nx,
            ny,
            rows,
            rank,
            num_ranks,
        })
    }

    /// Subdomain with the default balanced row split.
    pub fn balanced(nx: usize, ny: usize, rank: usize, num_ranks: usize) -> Result<Self> {
        Self::new(nx, ny, rank, num_ranks, &BalancedRows)
    }

    /// Number of owned grid points.
    pub fn local_size(&self) -> usize {
        self.rows.count * self.nx
    }

    /// Whether a lower-ranked neighbor owns the rows below.
    pub fn has_prev(&self) -> bool {
        self.rank > 0
    }

    /// Whether a higher-ranked neighbor owns the rows above.
    pub fn has_next(&self) -> bool {
        self.rank + 1 < self.num_ranks
    }

    /// Global row of local row `j`.
    pub fn global_row(&self, j: usize) -> usize {
        self.rows.start + j
    }

    /// Local index `k` as `(column, local row)`.
    pub fn local_coords(&self, k: usize) -> (usize, usize) {
        (k % self.nx, k / self.nx)
    }

    /// Global vector indices owned by this rank.
    pub fn global_range(&self) -> Range<usize> {
        self.rows.start * self.nx..self.rows.end() * self.nx
    }
}
