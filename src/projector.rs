//! Forward and backward projections of single slices.
//!
//! Both directions are driven by the same cached `GeometryWeights`, which makes
//! them exact adjoints of each other.
//!
//! + `project`: slice -> selected sinogram rows. Every angle writes its own
//!   output row, so angles are processed in parallel with no sharing.
//!
//! + `backproject`: sinogram rows -> slice. Many rays hit the same pixel, so
//!   each chunk of angles accumulates into its own buffer, and the buffers are
//!   summed in chunk order. The result does not depend on thread scheduling.
//!
//! The public `forward_project` and `back_project` wrap these for `ndarray`
//! users who just want to apply the operator once.

/// Forward project `image` along every ray of each of the `angles` (indices
/// into the angle set of `weights`). The output holds one row of `n_pixels`
/// values per entry of `angles`, in the same order.
pub fn project(weights: &GeometryWeights, image: &[Intensity], angles: &[usize]) -> SinogramData {
    let n = weights.n_pixels();
    let mut rows = vec![0.0; angles.len() * n];
    rows.par_chunks_mut(n.max(1))
        .zip(angles.par_iter())
        .for_each(|(row, &a)| {
            for (d, out) in row.iter_mut().enumerate() {
                *out = project_ray(weights.ray(a, d), image);
            }
        });
    rows
}

/// Smear `rows` (laid out as returned by `project`) back along the rays of
/// `angles`, accumulating into a fresh slice.
pub fn backproject(weights: &GeometryWeights, rows: &[Intensity], angles: &[usize]) -> ImageData {
    let n = weights.n_pixels();
    let size = weights.grid().len();

    // Closure preparing the state needed by `fold_chunks`: called at the start
    // of every chunk.
    let initial_chunk_state = || vec![0.0; size];

    // Rayon is too eager in spawning small jobs, each of which requires the
    // construction and subsequent combination of expensive accumulators
    // (whole slices). So here we try to limit it to one job per thread.
    let job_size = angles.len().div_ceil(rayon::current_num_threads()).max(1);

    let partial_sums: Vec<ImageData> = angles
        .par_iter()
        .enumerate()
        .fold_chunks(job_size, initial_chunk_state, |mut acc, (k, &a)| {
            let row = &rows[k * n..(k + 1) * n];
            for (d, &value) in row.iter().enumerate() {
                smear_ray(&mut acc, weights.ray(a, d), value);
            }
            acc
        })
        .collect();

    // Combine in chunk order, so that the result is reproducible
    let mut partial_sums = partial_sums.into_iter();
    let mut total = partial_sums.next().unwrap_or_else(|| vec![0.0; size]);
    for partial in partial_sums {
        elementwise_add(&mut total, &partial);
    }
    total
}

/// Backprojection of ones over `angles`: the total weight with which each pixel
/// contributes to those angles.
pub fn column_sums(weights: &GeometryWeights, angles: &[usize]) -> ImageData {
    let ones = vec![1.0; angles.len() * weights.n_pixels()];
    backproject(weights, &ones, angles)
}

/// Sum product of the ray's weights and the values of the pixels it crosses
#[inline]
pub fn project_ray(ray: RayView, image: &[Intensity]) -> Intensity {
    let mut projection = 0.0;
    for (j, w) in ray.iter() {
        projection += w * image[j];
    }
    projection
}

/// Backprojection of a single value along a single ray
#[inline]
pub fn smear_ray(backprojection: &mut [Intensity], ray: RayView, value: Intensity) {
    if value == 0.0 { return }
    for (j, w) in ray.iter() {
        backprojection[j] += w * value;
    }
}

pub(crate) fn elementwise_add(a: &mut [Intensity], b: &[Intensity]) {
    a.iter_mut().zip(b).for_each(|(l, r)| *l += r);
}

/// Indices of every angle in a geometry, in acquisition order
pub fn all_angles(weights: &GeometryWeights) -> Vec<usize> { (0..weights.n_angles()).collect() }

// ----- Convenience wrappers over ndarray ---------------------------------------------------

/// Forward project a square `slice` at each of `angles` (radians). The result
/// has one row per angle and one column per detector pixel. `center` defaults
/// to the middle of the detector.
pub fn forward_project(slice: ArrayView2<Intensity>, angles: &[Angle], center: Option<Length>) -> Result<Array2<Intensity>> {
    let n = square_side(slice)?;
    let weights = GeometryWeights::new(angles, n, center.unwrap_or(n as Length / 2.0));
    let rows = project(&weights, &as_flat(slice.view()), &all_angles(&weights));
    Ok(array2_from_vec(angles.len(), n, &rows))
}

/// The adjoint of `forward_project`: smear each row of `sinogram` back across a
/// square slice as wide as the detector.
pub fn back_project(sinogram: ArrayView2<Intensity>, angles: &[Angle], center: Option<Length>) -> Result<Array2<Intensity>> {
    let (n_angles, n) = sinogram.dim();
    if n_angles != angles.len() {
        return Err(ReconError::ShapeMismatch {
            what: "angles", expected: vec![n_angles], got: vec![angles.len()],
        })
    }
    let weights = GeometryWeights::new(angles, n, center.unwrap_or(n as Length / 2.0));
    let image = backproject(&weights, &as_flat(sinogram.view()), &all_angles(&weights));
    Ok(array2_from_vec(n, n, &image))
}

fn square_side(slice: ArrayView2<Intensity>) -> Result<usize> {
    let (rows, cols) = slice.dim();
    if rows != cols {
        return Err(ReconError::ShapeMismatch {
            what: "slice", expected: vec![cols, cols], got: vec![rows, cols],
        })
    }
    Ok(cols)
}

// ----- Imports ------------------------------------------------------------------------------------------
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::{
    Angle, ImageData, Intensity, Length, ReconError, Result, SinogramData,
    system_matrix::{GeometryWeights, RayView},
    utils::{array2_from_vec, as_flat},
};
