//! Algebraic reconstruction: corrections driven by individual rays (`Art`) or
//! by blocks of angles (`Bart`).

use std::sync::Arc;

use crate::{
    ImageData, Intensity,
    projector::{backproject, column_sums, project_ray, smear_ray},
    subsets::Subsets,
    system_matrix::GeometryWeights,
};
use super::{apply_additive_update, normalized_residuals, IterativeSolver};

/// Kaczmarz sweeps: every ray, in acquisition order, immediately corrects the
/// estimate along its own path.
pub struct Art {
    weights: Arc<GeometryWeights>,
    relaxation: Intensity,
}

impl Art {
    pub fn new(weights: Arc<GeometryWeights>, relaxation: Intensity) -> Self {
        Self { weights, relaxation }
    }
}

impl IterativeSolver for Art {

    fn geometry(&self) -> &GeometryWeights { &self.weights }

    fn units(&self) -> usize { self.weights.n_rays() }

    fn step(&self, measured: &[Intensity], image: &mut [Intensity], ray: usize) {
        let norm = self.weights.row_norm_sq(ray);
        if norm <= 0.0 { return }
        let weights = self.weights.row(ray);
        let correction = self.relaxation * (measured[ray] - project_ray(weights, image)) / norm;
        smear_ray(image, weights, correction);
    }
}

/// Block ART: all rays of a block of angles are compared against the estimate
/// as it was at the start of the block, and their combined correction is
/// applied at once.
pub struct Bart {
    weights: Arc<GeometryWeights>,
    blocks: Subsets,
    column_sums: Vec<ImageData>,
    relaxation: Intensity,
}

impl Bart {
    pub fn new(weights: Arc<GeometryWeights>, blocks: Subsets, relaxation: Intensity) -> Self {
        let column_sums = blocks.iter().map(|angles| column_sums(&weights, angles)).collect();
        Self { weights, blocks, column_sums, relaxation }
    }
}

impl IterativeSolver for Bart {

    fn geometry(&self) -> &GeometryWeights { &self.weights }

    fn units(&self) -> usize { self.blocks.len() }

    fn step(&self, measured: &[Intensity], image: &mut [Intensity], block: usize) {
        let angles = self.blocks.get(block);
        if angles.is_empty() { return }
        let weights = &*self.weights;
        let corrections = normalized_residuals(weights, measured, image, angles, |r| weights.row_norm_sq(r));
        let smeared = backproject(weights, &corrections, angles);
        apply_additive_update(image, &smeared, &self.column_sums[block], self.relaxation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::{all_angles, project};
    use crate::subsets::SubsetOrdering;
    use float_eq::assert_float_eq;
    use std::f64::consts::PI;

    fn setup(n: usize, n_angles: usize) -> (Arc<GeometryWeights>, Vec<f64>, Vec<f64>) {
        let angles: Vec<_> = (0..n_angles).map(|k| k as f64 * PI / n_angles as f64).collect();
        let weights = Arc::new(GeometryWeights::new(&angles, n, n as f64 / 2.0));
        let truth: Vec<_> = (0..n * n).map(|j| ((j * 7) % 5) as f64).collect();
        let measured = project(&weights, &truth, &all_angles(&weights));
        (weights, truth, measured)
    }

    #[test]
    fn art_step_satisfies_its_ray_exactly() {
        let (weights, _, measured) = setup(8, 5);
        let art = Art::new(weights.clone(), 1.0);
        let mut image = vec![0.0; 64];
        let ray = weights.ray_index(2, 3);
        art.step(&measured, &mut image, ray);
        assert_float_eq!(project_ray(weights.row(ray), &image), measured[ray], rmax <= 1e-12);
    }

    #[test]
    fn art_leaves_consistent_estimate_alone() {
        let (weights, truth, measured) = setup(8, 5);
        let art = Art::new(weights, 1.0);
        let mut image = truth.clone();
        art.iterate(&measured, &mut image);
        for (x, t) in image.iter().zip(&truth) {
            assert_float_eq!(*x, *t, abs <= 1e-9);
        }
    }

    #[test]
    fn bart_with_empty_blocks_is_a_no_op_for_them() {
        let (weights, _, measured) = setup(6, 2);
        let bart = Bart::new(weights, Subsets::new(2, 4, SubsetOrdering::Interleaved), 1.0);
        assert_eq!(bart.units(), 4);
        let mut image = vec![1.0; 36];
        bart.step(&measured, &mut image, 3);
        assert!(image.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn bart_reduces_residual() {
        let (weights, _, measured) = setup(12, 18);
        let bart = Bart::new(weights.clone(), Subsets::new(18, 3, SubsetOrdering::Interleaved), 1.0);
        let residual = |image: &[f64]| -> f64 {
            project(&weights, image, &all_angles(&weights)).iter().zip(&measured)
                .map(|(p, y)| (p - y).powi(2)).sum()
        };
        let mut image = vec![0.0; 144];
        let before = residual(&image);
        bart.iterate(&measured, &mut image);
        assert!(residual(&image) < 0.5 * before);
    }
}
