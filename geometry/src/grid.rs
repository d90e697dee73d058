//! The size and granularity of the square region in which slices are
//! reconstructed.
//!
//! Pixels have unit size and the grid is centred on the rotation axis, so it
//! spans `[-n/2, n/2]` along both axes. Columns run along `x`, rows along `y`.

use crate::{Index1, Index2, Length, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    pub n: usize,
}

impl PixelGrid {

    pub fn new(n: usize) -> Self { Self { n } }

    pub fn half_width(&self) -> Length { self.n as Length / 2.0 }

    /// Total number of pixels in the grid
    pub fn len(&self) -> usize { self.n * self.n }

    pub fn is_empty(&self) -> bool { self.n == 0 }

    /// Find centre of pixel with given 2D index
    pub fn pixel_centre(&self, [row, col]: Index2) -> Point {
        let h = self.half_width();
        Point::new(col as Length + 0.5 - h,
                   row as Length + 0.5 - h)
    }

    /// Find centre of pixel with given 1D index
    pub fn pixel_centre1(&self, i: Index1) -> Point {
        self.pixel_centre(index1_to_2(i, self.n))
    }

}

// --------------------------------------------------------------------------------
//                  Conversion between 1d and 2d indices (row-major)

#[inline]
pub fn index2_to_1([row, col]: Index2, n: usize) -> Index1 {
    row * n + col
}

#[inline]
pub fn index1_to_2(i: Index1, n: usize) -> Index2 {
    [i / n, i % n]
}
