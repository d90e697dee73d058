//! Geometry of parallel-beam scans: the square pixel grid in which slices are
//! reconstructed, and the rays along which projections are measured.

mod grid;
mod ray;

pub use grid::{PixelGrid, index1_to_2, index2_to_1};
pub use ray::{Ray, PixelsAlongRay};

/// Lengths are measured in units of the pixel (and detector element) size.
pub type Length = f64;

pub type Point  = nalgebra::Point2 <Length>;
pub type Vector = nalgebra::Vector2<Length>;

/// `[row, col]`
pub type Index2 = [usize; 2];
pub type Index1 = usize;
