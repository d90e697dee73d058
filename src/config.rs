//! Configuration files for reconstruction runs.

pub mod recon;

pub use recon::{read_config_file, Config};
