//! Distributed finite-difference solver for the 2D heat equation.
//!
//! The grid is split into contiguous row blocks, one per rank. The discrete
//! Laplacian is applied matrix-free with a halo exchange of the neighboring
//! rows, and implicit steps are solved with a distributed Conjugate Gradient
//! whose dot products are reduced across all ranks.

pub mod analysis;
pub mod config;
pub mod error;
pub mod output;
pub mod problem;
pub mod solver;
pub mod stats;
