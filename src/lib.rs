//! Reconstruction of slices from parallel-beam projections.
//!
//! The entry point is [`reconstruct`], which validates a request, builds the
//! projection operator once and dispatches every slice of the sinogram to the
//! selected [`Algorithm`].

pub mod error;
pub mod types;
pub mod algorithm;
pub mod config;
pub mod system_matrix;
pub mod projector;
pub mod subsets;
pub mod regularizer;
pub mod solver;
pub mod analytic;
pub mod recon;
pub mod phantom;
pub mod fom;
pub mod io;
pub mod utils;

pub use error::{ReconError, Result};
pub use algorithm::Algorithm;
pub use types::*;
pub use recon::{
    reconstruct, reconstruct_with, iterate_slice, simulate,
    Control, ConvergenceState, Phase, ReconParams,
};
