//! Reading and writing volumes, sinograms and angle lists.

pub mod raw;

pub use raw::{read_angles, read_volume, write_volume};
