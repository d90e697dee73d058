//! Figures of merit for judging reconstructed slices.
//!
//! Positions are in pixel units, in the frame the projector uses: the centre
//! of pixel `[i, j]` of an `n x n` slice lies at `(j + 0.5 - n/2, i + 0.5 - n/2)`.

use ndarray::{s, ArrayView2, Zip};

use crate::{Intensity, Length};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Roi {
    /// Centre and radius
    Disk((Length, Length), Length),
    /// Centre, inner and outer radius
    Annulus((Length, Length), Length, Length),
}

impl Roi {
    pub fn contains(&self, x: Length, y: Length) -> bool {
        let r2 = |(cx, cy): (Length, Length)| (x - cx).powi(2) + (y - cy).powi(2);
        match *self {
            Roi::Disk(centre, r) => r2(centre) < r * r,
            Roi::Annulus(centre, r_in, r_out) => {
                let d2 = r2(centre);
                r_in * r_in <= d2 && d2 < r_out * r_out
            }
        }
    }
}

/// Values of the pixels whose centres lie inside `roi`, in row-major order
pub fn values_inside_roi(image: ArrayView2<Intensity>, roi: Roi) -> Vec<Intensity> {
    let (rows, cols) = image.dim();
    image.indexed_iter()
        .filter(|((i, j), _)| {
            let x = *j as Length + 0.5 - cols as Length / 2.0;
            let y = *i as Length + 0.5 - rows as Length / 2.0;
            roi.contains(x, y)
        })
        .map(|(_, &v)| v)
        .collect()
}

fn mean(data: &[Intensity]) -> Option<Intensity> {
    if data.is_empty() { return None }
    Some(data.iter().sum::<Intensity>() / data.len() as Intensity)
}

/// Mean of the pixels inside `roi`; NaN if no pixel centre falls inside it
pub fn region_mean(image: ArrayView2<Intensity>, roi: Roi) -> Intensity {
    mean(&values_inside_roi(image, roi)).unwrap_or(Intensity::NAN)
}

/// Contrast recovery coefficient of each of `rois` against the mean of the
/// `background_rois`: 1 is perfect recovery, 0 no contrast at all.
///
/// `None` if any region is empty.
pub fn contrast_recovery(
    image          : ArrayView2<Intensity>,
    rois           : &[Roi],        roi_values: &[Intensity],
    background_rois: &[Roi], background_value:   Intensity,
) -> Option<Vec<f64>> {
    let backgrounds = background_rois.iter()
        .map(|&roi| mean(&values_inside_roi(image, roi)))
        .collect::<Option<Vec<_>>>()?;
    let background = mean(&backgrounds)?;
    rois.iter().zip(roi_values)
        .map(|(&roi, &expected)| {
            let measured = mean(&values_inside_roi(image, roi))?;
            Some((measured / background - 1.0) / (expected / background_value - 1.0))
        })
        .collect()
}

/// Isotropic total variation, with forward differences which vanish beyond the
/// last row and column
pub fn total_variation(image: ArrayView2<Intensity>) -> Intensity {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 { return 0.0 }
    let mut total = 0.0;
    for i in 0..rows {
        for j in 0..cols {
            let here = image[[i, j]];
            let dx = if j + 1 < cols { image[[i, j + 1]] - here } else { 0.0 };
            let dy = if i + 1 < rows { image[[i + 1, j]] - here } else { 0.0 };
            total += dx.hypot(dy);
        }
    }
    total
}

/// `Σ (predicted - measured)²`
pub fn sum_of_squared_residuals(predicted: &[Intensity], measured: &[Intensity]) -> Intensity {
    debug_assert_eq!(predicted.len(), measured.len());
    predicted.iter().zip(measured)
        .map(|(p, m)| (p - m).powi(2))
        .sum()
}

/// Root mean square difference between two equally shaped slices
pub fn rms_difference(a: ArrayView2<Intensity>, b: ArrayView2<Intensity>) -> Intensity {
    if a.is_empty() { return 0.0 }
    let mut sum = 0.0;
    Zip::from(a).and(b).for_each(|x, y| sum += (x - y).powi(2));
    (sum / a.len() as Intensity).sqrt()
}

/// The central `size x size` pixels of `image`
pub fn central_square(image: ArrayView2<Intensity>, size: usize) -> ArrayView2<Intensity> {
    let (rows, cols) = image.dim();
    let (r0, c0) = (rows.saturating_sub(size) / 2, cols.saturating_sub(size) / 2);
    image.slice_move(s![r0..(r0 + size).min(rows), c0..(c0 + size).min(cols)])
}
