//! Halo exchange of boundary rows between neighboring ranks.

use super::comm::CommunicationBackend;
use super::partition::Subdomain;
use crate::error::{HeatError, Result};

/// The rows owned by the neighbors that the stencil needs at this rank's
/// first and last row.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloRows {
    /// Last row of the previous rank (zero at the bottom of the domain).
    pub prev: Vec<f64>,
    /// First row of the next rank (zero at the top of the domain).
    pub next: Vec<f64>,
}

impl HaloRows {
    /// Zero halo, as seen by a rank with no neighbors.
    pub fn zeros(nx: usize) -> Self {
        Self {
            prev: vec![0.0; nx],
            next: vec![0.0; nx],
        }
    }
}

/// Exchange boundary rows of `local` with both neighbors.
///
/// The next neighbor is served first, then the previous one. Returns only
/// once both exchanges have completed.
pub fn exchange(
    comm: &dyn CommunicationBackend,
    subdomain: &Subdomain,
    local: &[f64],
) -> Result<HaloRows> {
    let nx = subdomain.nx;
    let size = subdomain.local_size();
    if local.len() != size {
        return Err(HeatError::Solve(format!(
            "halo exchange: local vector has {} entries, subdomain owns {size}",
            local.len()
        )));
    }

    let _span = tracing::trace_span!("halo_exchange", rank = subdomain.rank).entered();
    let mut halo = HaloRows::zeros(nx);

    if subdomain.has_next() {
        comm.exchange(subdomain.rank + 1, &local[size - nx..], &mut halo.next)?;
    }
    if subdomain.has_prev() {
        comm.exchange(subdomain.rank - 1, &local[..nx], &mut halo.prev)?;
    }
    Ok(halo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::comm::SingleProcessComm;
    use crate::solver::comm_local::run_local;

    #[test]
    fn single_rank_halo_is_zero() {
        let sub = Subdomain::balanced(3, 2, 0, 1).unwrap();
        let local = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let halo = exchange(&SingleProcessComm, &sub, &local).unwrap();
        assert_eq!(halo, HaloRows::zeros(3));
    }

    #[test]
    fn three_ranks_see_neighbor_rows() {
        // 2 columns, 6 rows over 3 ranks; entry value = global index.
        let halos = run_local(3, |comm| {
            let sub = Subdomain::balanced(2, 6, comm.rank(), 3).unwrap();
            let local: Vec<f64> = sub.global_range().map(|g| g as f64).collect();
            exchange(comm, &sub, &local).unwrap()
        });

        assert_eq!(halos[0].prev, vec![0.0, 0.0]);
        assert_eq!(halos[0].next, vec![4.0, 5.0]);
        assert_eq!(halos[1].prev, vec![2.0, 3.0]);
        assert_eq!(halos[1].next, vec![8.0, 9.0]);
        assert_eq!(halos[2].prev, vec![6.0, 7.0]);
        assert_eq!(halos[2].next, vec![0.0, 0.0]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let sub = Subdomain::balanced(3, 2, 0, 1).unwrap();
        assert!(matches!(
            exchange(&SingleProcessComm, &sub, &[1.0; 5]),
            Err(HeatError::Solve(_))
        ));
    }
}
