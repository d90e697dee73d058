use std::f64::consts::PI;
use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    ImageData, Intensity,
    projector::{all_angles, backproject},
    solver::AnalyticSolver,
    system_matrix::GeometryWeights,
};
use super::RowFilter;

/// Filtered backprojection: filter every row, smear it back along the same
/// rays the iterative solvers use, and scale by the angular step `π / n_angles`.
pub struct Fbp {
    weights: Arc<GeometryWeights>,
    filter: RowFilter,
}

impl Fbp {
    pub fn new(weights: Arc<GeometryWeights>, filter: RowFilter) -> Self { Self { weights, filter } }
}

impl AnalyticSolver for Fbp {
    fn solve(&self, measured: &[Intensity]) -> ImageData {
        let n = self.weights.n_pixels();
        let filtered: Vec<Intensity> = measured
            .par_chunks(n)
            .flat_map_iter(|row| self.filter.apply(row))
            .collect();
        let mut image = backproject(&self.weights, &filtered, &all_angles(&self.weights));
        let scale = PI / self.weights.n_angles() as f64;
        image.iter_mut().for_each(|x| *x *= scale);
        image
    }
}
