use std::sync::Arc;

use crate::{
    ImageData, Intensity,
    projector::{all_angles, backproject, column_sums},
    system_matrix::GeometryWeights,
};
use super::{apply_additive_update, normalized_residuals, IterativeSolver};

/// Simultaneous iterative reconstruction: each iteration is a single sweep
///
/// ```text
/// x += λ · Aᵀ((y - Ax) / row_sum) / col_sum
/// ```
pub struct Sirt {
    weights: Arc<GeometryWeights>,
    angles: Vec<usize>,
    column_sums: ImageData,
    relaxation: Intensity,
}

impl Sirt {
    pub fn new(weights: Arc<GeometryWeights>, relaxation: Intensity) -> Self {
        let angles = all_angles(&weights);
        let column_sums = column_sums(&weights, &angles);
        Self { weights, angles, column_sums, relaxation }
    }
}

impl IterativeSolver for Sirt {

    fn geometry(&self) -> &GeometryWeights { &self.weights }

    fn units(&self) -> usize { 1 }

    fn step(&self, measured: &[Intensity], image: &mut [Intensity], _: usize) {
        let weights = &*self.weights;
        let residuals = normalized_residuals(weights, measured, image, &self.angles, |r| weights.row_sum(r));
        let update = backproject(weights, &residuals, &self.angles);
        apply_additive_update(image, &update, &self.column_sums, self.relaxation);
    }
}
