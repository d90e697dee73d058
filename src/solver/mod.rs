//! The reconstruction algorithms, behind two interfaces:
//!
//! + `IterativeSolver`: an explicit state-transition function, which refines a
//!   slice estimate one unit of work (a ray, a block, a subset, a sweep) at a
//!   time. The caller owns the loop.
//!
//! + `AnalyticSolver`: produces a slice directly from its measurements.
//!
//! Solvers hold only read-only state (geometry weights, subsets, normalization
//! images) so a single instance is shared by all slice workers.

pub mod art;
pub mod sirt;
pub mod em;

pub use art::{Art, Bart};
pub use sirt::Sirt;
pub use em::Em;

pub trait IterativeSolver: Send + Sync {

    /// The projection operator the solver works with
    fn geometry(&self) -> &GeometryWeights;

    /// Number of units of work making up one iteration
    fn units(&self) -> usize;

    /// Apply the update of unit `unit` to `image`, in place. `measured` holds
    /// the angle-major sinogram of the slice.
    fn step(&self, measured: &[Intensity], image: &mut [Intensity], unit: usize);

    /// One full pass over all units, in order
    fn iterate(&self, measured: &[Intensity], image: &mut [Intensity]) {
        for unit in 0..self.units() {
            self.step(measured, image, unit);
        }
    }
}

pub trait AnalyticSolver: Send + Sync {
    fn solve(&self, measured: &[Intensity]) -> ImageData;
}

pub enum Solver {
    Iterative(Box<dyn IterativeSolver>),
    Analytic (Box<dyn AnalyticSolver>),
}

impl Solver {

    /// Prepare everything `algorithm` needs to reconstruct slices of `n_pixels`
    /// wide projections taken at `angles`. `params` must already have been
    /// validated for `algorithm`.
    pub fn new(algorithm: Algorithm, angles: &[Angle], n_pixels: usize, center: Length, params: &ReconParams) -> Self {
        // Gridrec works in frequency space and never needs the system matrix
        let weights = || Arc::new(GeometryWeights::new(angles, n_pixels, center));
        let subsets = |k| Subsets::new(angles.len(), k, params.subset_ordering);
        let penalty = if algorithm.uses_hybrid_penalty() { Penalty::Hybrid { delta: params.reg_delta } }
                      else                               { Penalty::Quadratic };
        let penalized = Some((penalty, params.reg_par));
        match algorithm {
            Algorithm::Art  => Self::Iterative(Box::new(Art::new(weights(), params.relaxation))),
            Algorithm::Bart => Self::Iterative(Box::new(Bart::new(weights(), subsets(params.num_subset), params.relaxation))),
            Algorithm::Sirt => Self::Iterative(Box::new(Sirt::new(weights(), params.relaxation))),
            Algorithm::Mlem => Self::Iterative(Box::new(Em::new(weights(), subsets(1), None))),
            Algorithm::Osem => Self::Iterative(Box::new(Em::new(weights(), subsets(params.num_subset), None))),
            Algorithm::PmlQuad | Algorithm::PmlHybrid =>
                Self::Iterative(Box::new(Em::new(weights(), subsets(1), penalized))),
            Algorithm::OspmlQuad | Algorithm::OspmlHybrid =>
                Self::Iterative(Box::new(Em::new(weights(), subsets(params.num_subset), penalized))),
            Algorithm::Fbp =>
                Self::Analytic(Box::new(Fbp::new(weights(), RowFilter::new(n_pixels, params.filter, params.filter_par)))),
            Algorithm::Gridrec =>
                Self::Analytic(Box::new(Gridrec::new(angles, n_pixels, center, params.filter, params.filter_par, params.kernel_width))),
        }
    }
}

// ----- Helpers shared by the additive solvers ---------------------------------------------

/// `(measured - projected) / norm(r)` for every ray `r` of `angles`, laid out as
/// `projector::project` lays out its rows. Rays with no weight contribute
/// nothing.
pub(crate) fn normalized_residuals(
    weights : &GeometryWeights,
    measured: &[Intensity],
    image   : &[Intensity],
    angles  : &[usize],
    norm    : impl Fn(usize) -> Weight,
) -> SinogramData {
    let n = weights.n_pixels();
    let mut rows = project(weights, image, angles);
    for (k, &a) in angles.iter().enumerate() {
        for d in 0..n {
            let r = weights.ray_index(a, d);
            let norm = norm(r);
            let value = &mut rows[k * n + d];
            *value = if norm > 0.0 { (measured[r] - *value) / norm } else { 0.0 };
        }
    }
    rows
}

/// `image += relaxation * update / column_sums`, leaving pixels which no ray
/// reaches untouched.
pub(crate) fn apply_additive_update(image: &mut [Intensity], update: &[Intensity], column_sums: &[Weight], relaxation: Intensity) {
    azip!((pixel in image, &u in update, &c in column_sums) {
        if c > 0.0 { *pixel += relaxation * u / c }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::f64::consts::PI;

    #[rstest]
    #[case(Algorithm::Art        , 12 * 6)]
    #[case(Algorithm::Bart       , 3)]
    #[case(Algorithm::Sirt       , 1)]
    #[case(Algorithm::Mlem       , 1)]
    #[case(Algorithm::Osem       , 3)]
    #[case(Algorithm::PmlQuad    , 1)]
    #[case(Algorithm::PmlHybrid  , 1)]
    #[case(Algorithm::OspmlQuad  , 3)]
    #[case(Algorithm::OspmlHybrid, 3)]
    fn iterative_algorithms_get_iterative_solvers(#[case] algorithm: Algorithm, #[case] units: usize) {
        let angles: Vec<_> = (0..12).map(|k| k as f64 * PI / 12.0).collect();
        let params = ReconParams { num_subset: 3, ..Default::default() };
        match Solver::new(algorithm, &angles, 6, 3.0, &params) {
            Solver::Iterative(solver) => assert_eq!(solver.units(), units),
            Solver::Analytic(_) => panic!("{algorithm} should be iterative"),
        }
    }

    #[rstest]
    #[case(Algorithm::Fbp)]
    #[case(Algorithm::Gridrec)]
    fn analytic_algorithms_get_analytic_solvers(#[case] algorithm: Algorithm) {
        let angles: Vec<_> = (0..12).map(|k| k as f64 * PI / 12.0).collect();
        let solver = Solver::new(algorithm, &angles, 6, 3.0, &ReconParams::default());
        let Solver::Analytic(solver) = solver else { panic!("{algorithm} should be analytic") };
        assert_eq!(solver.solve(&[0.0; 12 * 6]).len(), 36);
    }
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::sync::Arc;

use ndarray::azip;

use crate::{
    Algorithm, Angle, ImageData, Intensity, Length, SinogramData, Weight,
    analytic::{Fbp, Gridrec, RowFilter},
    projector::project,
    recon::ReconParams,
    regularizer::Penalty,
    subsets::Subsets,
    system_matrix::GeometryWeights,
};
