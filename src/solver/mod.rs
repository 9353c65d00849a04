//! Distributed linear algebra: partitioning, communication, the matrix-free
//! Laplacian and the CG solver.

pub mod comm;
pub mod comm_local;
#[cfg(feature = "distributed")]
pub mod comm_mpi;
pub mod conjugate_gradient;
pub mod halo;
pub mod laplacian;
pub mod partition;
