//! Multiplicative expectation-maximization updates: MLEM, OSEM and their
//! penalized variants.
//!
//! With a single subset covering all angles this is MLEM (or PML, if a penalty
//! is present); with several subsets it is OSEM (or OSPML).
//!
//! The penalized update minimizes, pixel by pixel, the EM surrogate of the
//! likelihood plus β times the separable surrogate of the penalty (see
//! `regularizer`). Setting its derivative to zero gives
//!
//! ```text
//! 2βW x² + (s - βM) x - x₀b = 0
//! ```
//!
//! where `x₀` is the current value, `s` the subset sensitivity, `b` the
//! backprojected ratios and `W`, `M` the surrogate coefficients. The new value
//! is the non-negative root, so it stays finite for any β ≥ 0.

use std::sync::Arc;

use ndarray::azip;

use crate::{
    ImageData, Intensity,
    projector::{backproject, column_sums, project},
    regularizer::{surrogate_into, Penalty},
    subsets::Subsets,
    system_matrix::GeometryWeights,
};
use super::IterativeSolver;

pub struct Em {
    weights: Arc<GeometryWeights>,
    subsets: Subsets,
    // Backprojection of ones over each subset
    sensitivities: Vec<ImageData>,
    // Penalty and its weight β
    penalty: Option<(Penalty, Intensity)>,
}

impl Em {
    pub fn new(weights: Arc<GeometryWeights>, subsets: Subsets, penalty: Option<(Penalty, Intensity)>) -> Self {
        let sensitivities = subsets.iter().map(|angles| column_sums(&weights, angles)).collect();
        Self { weights, subsets, sensitivities, penalty }
    }
}

impl IterativeSolver for Em {

    fn geometry(&self) -> &GeometryWeights { &self.weights }

    fn units(&self) -> usize { self.subsets.len() }

    fn step(&self, measured: &[Intensity], image: &mut [Intensity], subset: usize) {
        let angles = self.subsets.get(subset);
        if angles.is_empty() { return }
        let weights = &*self.weights;
        let n = weights.n_pixels();

        // Ratio of measured to predicted, for every ray of this subset
        let mut ratios = project(weights, image, angles);
        for (k, &a) in angles.iter().enumerate() {
            for d in 0..n {
                let y = measured[weights.ray_index(a, d)];
                let p = &mut ratios[k * n + d];
                *p = ratio(y, *p);
            }
        }
        let backprojection = backproject(weights, &ratios, angles);

        let sensitivity = &self.sensitivities[subset];
        match self.penalty {
            Some((penalty, beta)) => {
                let mut curvature = vec![0.0; image.len()];
                let mut midpoint  = vec![0.0; image.len()];
                surrogate_into(image, [n, n], penalty, &mut curvature, &mut midpoint);
                azip!((pixel in image, &b in &backprojection, &s in sensitivity, &w in &curvature, &m in &midpoint) {
                    if s > 0.0 {
                        *pixel = non_negative_root(2.0 * beta * w, s - beta * m, *pixel * b);
                    }
                })
            }
            None => {
                azip!((pixel in image, &b in &backprojection, &s in sensitivity) {
                    if s > 0.0 { *pixel *= b / s }
                })
            }
        }
    }
}

/// The non-negative root of `a x² + b x - c = 0`, for `a, c ≥ 0`
#[inline]
fn non_negative_root(a: Intensity, b: Intensity, c: Intensity) -> Intensity {
    let c = c.max(0.0);
    let discriminant = (b * b + 4.0 * a * c).sqrt();
    if b >= 0.0 {
        // Avoids cancellation when `a x²` is small
        let denominator = b + discriminant;
        if denominator > 0.0 { 2.0 * c / denominator } else { 0.0 }
    } else if a > 0.0 {
        (discriminant - b) / (2.0 * a)
    } else {
        0.0
    }
}

/// `y / p`, where an empty prediction explains nothing and gets no correction
#[inline]
fn ratio(y: Intensity, p: Intensity) -> Intensity {
    if p > 0.0 { y / p } else { 0.0 }
}
