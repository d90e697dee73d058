//! Calculation and storage of system matrix elements: the weight with which
//! each pixel of a slice contributes to each ray of the sinogram.
//!
//! The weight of a pixel is the length of the ray inside it. Weights depend only
//! on the scan geometry (angles, detector width, centre of rotation), so they
//! are calculated once per reconstruction and shared, read-only, by every slice
//! and every iteration.

// ----- Storage of system matrix elements for a single ray -----------------------------------
pub type SystemMatrixElement = (Index1, Weight);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemMatrixRow(pub Vec<SystemMatrixElement>);

impl SystemMatrixRow {
    pub fn iter(&self) -> std::slice::Iter<SystemMatrixElement> { self.0.iter() }
    pub fn clear(&mut self) { self.0.clear(); }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Total length of the ray inside the grid
    pub fn sum(&self) -> Weight { self.iter().map(|(_, w)| w).sum() }

    pub fn norm_sq(&self) -> Weight { self.iter().map(|(_, w)| w * w).sum() }
}

impl IntoIterator for SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::vec::IntoIter<Self::Item>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::iter::Cloned<std::slice::Iter<'a, Self::Item>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().cloned()
    }
}

/// Sparse weights of the ray at `angle`, passing at signed distance `offset`
/// from the rotation axis, through `grid`. Rays which miss the grid have no
/// elements.
pub fn ray_weights(grid: PixelGrid, angle: Angle, offset: Length) -> SystemMatrixRow {
    let mut row = SystemMatrixRow(Vec::with_capacity(2 * grid.n));
    update_system_matrix_row(&mut row, grid, angle, offset);
    row
}

/// Place the weights of one ray in the output parameter `row`, after discarding
/// its previous contents.
pub fn update_system_matrix_row(row: &mut SystemMatrixRow, grid: PixelGrid, angle: Angle, offset: Length) {
    row.clear();
    for (index, length) in Ray::new(angle, offset).pixels(grid) {
        row.0.push((index2_to_1(index, grid.n), length));
    }
}

// ----- The full, cached operator ----------------------------------------------------------

/// The discretized projection operator of one scan geometry, in compressed
/// sparse row form: one row per ray, ordered by angle, then detector pixel.
#[derive(Clone, Debug)]
pub struct GeometryWeights {
    grid: PixelGrid,
    n_angles: usize,
    center: Length,
    // Elements of ray `r` live in `offsets[r]..offsets[r+1]`
    offsets: Vec<usize>,
    pixels: Vec<Index1>,
    weights: Vec<Weight>,
    row_sums: Vec<Weight>,
    row_norms_sq: Vec<Weight>,
}

/// The non-zero elements of a single row of `GeometryWeights`
#[derive(Clone, Copy, Debug)]
pub struct RayView<'a> {
    pub pixels: &'a [Index1],
    pub weights: &'a [Weight],
}

impl<'a> RayView<'a> {
    pub fn iter(&self) -> impl Iterator<Item = SystemMatrixElement> + 'a {
        self.pixels.iter().copied().zip(self.weights.iter().copied())
    }
    pub fn is_empty(&self) -> bool { self.pixels.is_empty() }
}

impl GeometryWeights {

    /// Calculate the weights of every ray of a detector with `n_pixels`
    /// elements, at each of `angles`, through an `n_pixels x n_pixels` grid.
    /// `center` is the detector coordinate of the rotation axis.
    pub fn new(angles: &[Angle], n_pixels: usize, center: Length) -> Self {
        let grid = PixelGrid::new(n_pixels);
        let n_rays = angles.len() * n_pixels;

        let rows: Vec<SystemMatrixRow> = (0..n_rays)
            .into_par_iter()
            .map(|r| {
                let (angle, pixel) = (r / n_pixels, r % n_pixels);
                ray_weights(grid, angles[angle], pixel as Length + 0.5 - center)
            })
            .collect();

        let weights = Self::from_rows(grid, angles.len(), center, rows);
        debug!(n_angles = angles.len(), n_pixels, center, nnz = weights.nnz(), "built geometry weights");
        weights
    }

    /// Pack per-ray `rows`, ordered by angle then detector pixel, into
    /// compressed form
    pub fn from_rows(grid: PixelGrid, n_angles: usize, center: Length, rows: Vec<SystemMatrixRow>) -> Self {
        debug_assert_eq!(rows.len(), n_angles * grid.n);
        let nnz = rows.iter().map(SystemMatrixRow::len).sum();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut pixels  = Vec::with_capacity(nnz);
        let mut weights = Vec::with_capacity(nnz);
        let row_sums     = rows.iter().map(SystemMatrixRow::sum    ).collect();
        let row_norms_sq = rows.iter().map(SystemMatrixRow::norm_sq).collect();
        offsets.push(0);
        for row in rows {
            for (j, w) in row {
                pixels.push(j);
                weights.push(w);
            }
            offsets.push(pixels.len());
        }
        Self { grid, n_angles, center, offsets, pixels, weights, row_sums, row_norms_sq }
    }

    pub fn grid    (&self) -> PixelGrid { self.grid }
    pub fn n_angles(&self) -> usize     { self.n_angles }
    /// Number of detector pixels, which is also the width of the grid
    pub fn n_pixels(&self) -> usize     { self.grid.n }
    pub fn n_rays  (&self) -> usize     { self.n_angles * self.grid.n }
    pub fn center  (&self) -> Length    { self.center }
    /// Number of stored (non-zero) weights
    pub fn nnz     (&self) -> usize     { self.weights.len() }

    /// Signed distance of the ray through the centre of detector pixel `pixel`
    /// from the rotation axis
    pub fn detector_offset(&self, pixel: usize) -> Length { pixel as Length + 0.5 - self.center }

    #[inline]
    pub fn ray_index(&self, angle: usize, pixel: usize) -> usize { angle * self.grid.n + pixel }

    #[inline]
    pub fn ray(&self, angle: usize, pixel: usize) -> RayView<'_> {
        self.row(self.ray_index(angle, pixel))
    }

    #[inline]
    pub fn row(&self, r: usize) -> RayView<'_> {
        let range = self.offsets[r]..self.offsets[r + 1];
        RayView { pixels: &self.pixels[range.clone()], weights: &self.weights[range] }
    }

    /// Sum of the weights of ray `r`: its length inside the grid
    pub fn row_sum(&self, r: usize) -> Weight { self.row_sums[r] }

    /// Sum of the squared weights of ray `r`
    pub fn row_norm_sq(&self, r: usize) -> Weight { self.row_norms_sq[r] }
}

// ----- Imports ------------------------------------------------------------------------------------------
use geometry::{index2_to_1, PixelGrid, Ray};
use rayon::prelude::*;
use tracing::debug;

use crate::{Angle, Index1, Length, Weight};

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use std::f64::consts::PI;

    fn angles(n: usize) -> Vec<Angle> { (0..n).map(|k| k as Angle * PI / n as Angle).collect() }

    #[test]
    fn cached_rows_match_freshly_calculated_rays() {
        let n = 9;
        let angles = angles(7);
        let center = 4.2;
        let weights = GeometryWeights::new(&angles, n, center);
        for (a, &angle) in angles.iter().enumerate() {
            for d in 0..n {
                let fresh = ray_weights(weights.grid(), angle, weights.detector_offset(d));
                let cached: Vec<_> = weights.ray(a, d).iter().collect();
                assert_eq!(cached, fresh.0);
                let r = weights.ray_index(a, d);
                assert_float_eq!(weights.row_sum(r), fresh.sum(), ulps <= 4);
                assert_float_eq!(weights.row_norm_sq(r), fresh.norm_sq(), ulps <= 4);
            }
        }
    }

    #[test]
    fn vertical_rays_have_unit_weights_along_columns() {
        let n = 5;
        let weights = GeometryWeights::new(&[0.0], n, n as Length / 2.0);
        for d in 0..n {
            let ray = weights.ray(0, d);
            let pixels: Vec<_> = ray.iter().map(|(j, _)| j).collect();
            let expected: Vec<_> = (0..n).map(|row| row * n + d).collect();
            assert_eq!(pixels, expected);
            for (_, w) in ray.iter() { assert_float_eq!(w, 1.0, abs <= 1e-12); }
        }
    }

    #[test]
    fn rays_beyond_shifted_centre_miss_the_grid() {
        // Shifting the centre by the full detector width pushes half of the
        // rays outside of the grid.
        let n = 6;
        let weights = GeometryWeights::new(&[0.0], n, 0.0);
        let hits: Vec<_> = (0..n).map(|d| !weights.ray(0, d).is_empty()).collect();
        assert_eq!(hits, vec![true, true, true, false, false, false]);
    }

    #[test]
    fn row_sums_are_chord_lengths() {
        // The central ray at 45 degrees is the diagonal of the grid
        let n = 8;
        let row = ray_weights(PixelGrid::new(n), PI / 4.0, 0.0);
        assert_float_eq!(row.sum(), n as Length * std::f64::consts::SQRT_2, abs <= 1e-9);
    }

    #[test]
    fn pixel_indices_beyond_u32_are_kept() {
        // The last pixel of a 70000-wide grid has a flat index above u32::MAX
        let n = 70_000;
        let last = n * n - 1;
        assert!(last > u32::MAX as usize);
        let mut rows = vec![SystemMatrixRow::default(); n];
        rows[n - 1] = SystemMatrixRow(vec![(last - 1, 0.5), (last, 0.25)]);
        let weights = GeometryWeights::from_rows(PixelGrid::new(n), 1, n as Length / 2.0, rows);
        let stored: Vec<_> = weights.ray(0, n - 1).iter().collect();
        assert_eq!(stored, vec![(last - 1, 0.5), (last, 0.25)]);
        assert_eq!(weights.nnz(), 2);
        assert!(weights.ray(0, 0).is_empty());
    }
}
