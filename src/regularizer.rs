//! Gradients of the smoothness penalties used by the penalized-likelihood
//! solvers.
//!
//! The penalty couples every pixel to its 8 neighbours: edge neighbours with
//! weight 1, diagonal ones with weight 1/√2, all normalized so that the weights
//! of an interior pixel sum to 1. The gradient at pixel `j` is
//!
//! ```text
//! g_j = Σ_k w_jk ψ'(x_j - x_k)
//! ```
//!
//! with ψ' depending on the `Penalty`. Neighbours beyond the edge of the slice
//! are ignored.
//!
//! The penalized EM update does not use the gradient directly. It minimizes
//! De Pierro's separable surrogate instead: each pair term `ψ(x_j - x_k)` is
//! bounded by a quadratic of curvature `ψ'(t)/t` taken at the current
//! estimate, and split into halves which depend on `x_j` or `x_k` alone.

use itertools::iproduct;
use ndarray::{Array2, ArrayView2};

use crate::{Intensity, utils::{array2_from_vec, as_flat}};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Penalty {
    /// ψ(t) = t²/2: penalizes all differences in proportion to their size
    Quadratic,
    /// Quadratic for |t| ≪ δ, linear for |t| ≫ δ: edges are penalized less
    Hybrid { delta: Intensity },
}

impl Penalty {
    /// ψ'(t)
    #[inline]
    pub fn derivative(self, t: Intensity) -> Intensity {
        match self {
            Penalty::Quadratic => t,
            Penalty::Hybrid { delta } => t / (1.0 + (t / delta).powi(2)).sqrt(),
        }
    }

    /// ψ'(t)/t: the curvature of the tightest quadratic which lies above ψ and
    /// touches it at `t`. Never exceeds 1, and equals 1 at `t = 0`.
    #[inline]
    pub fn curvature(self, t: Intensity) -> Intensity {
        match self {
            Penalty::Quadratic => 1.0,
            Penalty::Hybrid { delta } => 1.0 / (1.0 + (t / delta).powi(2)).sqrt(),
        }
    }
}

/// Offsets to the 8 neighbours of a pixel and their un-normalized weights
fn neighbours() -> impl Iterator<Item = (isize, isize, Intensity)> {
    iproduct!(-1..=1_isize, -1..=1_isize)
        .filter(|&(di, dj)| (di, dj) != (0, 0))
        .map(|(di, dj)| {
            let w = if di == 0 || dj == 0 { 1.0 } else { std::f64::consts::FRAC_1_SQRT_2 };
            (di, dj, w)
        })
}

fn normalization() -> Intensity { neighbours().map(|(_, _, w)| w).sum() }

/// Call `visit(j, x_j, x_k, w_jk)` for every in-bounds neighbour `k` of every
/// pixel `j` of a `[rows, cols]` row-major slice
fn for_each_neighbour(image: &[Intensity], [rows, cols]: [usize; 2], mut visit: impl FnMut(usize, Intensity, Intensity, Intensity)) {
    let norm = normalization();
    let stencil: Vec<_> = neighbours().map(|(di, dj, w)| (di, dj, w / norm)).collect();
    for (i, j) in iproduct!(0..rows, 0..cols) {
        let here = i * cols + j;
        for &(di, dj, w) in &stencil {
            let (Some(k), Some(l)) = (i.checked_add_signed(di), j.checked_add_signed(dj)) else { continue };
            if k >= rows || l >= cols { continue }
            visit(here, image[here], image[k * cols + l], w);
        }
    }
}

/// Penalty gradient of a `[rows, cols]` row-major slice, written into `gradient`
pub fn gradient_into(image: &[Intensity], dims: [usize; 2], penalty: Penalty, gradient: &mut [Intensity]) {
    gradient.iter_mut().for_each(|g| *g = 0.0);
    for_each_neighbour(image, dims, |j, here, there, w| {
        gradient[j] += w * penalty.derivative(here - there);
    });
}

/// Coefficients of the separable surrogate of the penalty around `image`.
///
/// For every pixel `j`, `curvature[j] = Σ_k w_jk c_jk` and
/// `midpoint[j] = Σ_k w_jk c_jk (x_j + x_k)`, with `c_jk = ψ'(x_j - x_k) / (x_j - x_k)`.
/// The surrogate's derivative at a new value `x` of pixel `j` is then
/// `2 curvature[j] x - midpoint[j]`, which matches the penalty gradient at the
/// current estimate.
pub fn surrogate_into(
    image    : &[Intensity],
    dims     : [usize; 2],
    penalty  : Penalty,
    curvature: &mut [Intensity],
    midpoint : &mut [Intensity],
) {
    curvature.iter_mut().for_each(|c| *c = 0.0);
    midpoint .iter_mut().for_each(|m| *m = 0.0);
    for_each_neighbour(image, dims, |j, here, there, w| {
        let wc = w * penalty.curvature(here - there);
        curvature[j] += wc;
        midpoint [j] += wc * (here + there);
    });
}

pub fn penalty_gradient(slice: ArrayView2<Intensity>, penalty: Penalty) -> Array2<Intensity> {
    let (rows, cols) = slice.dim();
    let mut gradient = vec![0.0; rows * cols];
    gradient_into(&as_flat(slice), [rows, cols], penalty, &mut gradient);
    array2_from_vec(rows, cols, &gradient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;
    use proptest::prelude::*;

    const HYBRID: Penalty = Penalty::Hybrid { delta: 0.1 };

    #[rstest]
    #[case(Penalty::Quadratic)]
    #[case(HYBRID)]
    fn constant_image_has_no_gradient(#[case] penalty: Penalty) {
        let image = Array2::from_elem((7, 7), 3.5);
        let g = penalty_gradient(image.view(), penalty);
        assert!(g.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn interior_weights_sum_to_one() {
        // An isolated bright pixel differs by 1 from all of its neighbours
        let mut image = Array2::zeros((5, 5));
        image[[2, 2]] = 1.0;
        let g = penalty_gradient(image.view(), Penalty::Quadratic);
        assert_float_eq!(g[[2, 2]], 1.0, ulps <= 4);
        let norm = 4.0 + 4.0 * std::f64::consts::FRAC_1_SQRT_2;
        assert_float_eq!(g[[1, 2]], -1.0 / norm, ulps <= 4);
        assert_float_eq!(g[[1, 1]], -std::f64::consts::FRAC_1_SQRT_2 / norm, ulps <= 4);
        assert_float_eq!(g[[0, 0]], 0.0, ulps <= 4);
    }

    #[test]
    fn gradient_points_uphill() {
        // Linear ramp along columns: left edge below neighbours, right edge above
        let image = Array2::from_shape_fn((6, 6), |(_, j)| j as f64);
        let g = penalty_gradient(image.view(), Penalty::Quadratic);
        assert!(g[[3, 0]] < 0.0);
        assert!(g[[3, 5]] > 0.0);
        assert_float_eq!(g[[3, 2]], 0.0, abs <= 1e-12);
    }

    proptest! {
        // The surrogate touches the penalty: its slope at the current estimate
        // is the penalty gradient.
        #[test]
        fn surrogate_slope_matches_gradient(
            values in proptest::collection::vec(0.0..5.0_f64, 36),
            delta  in 1e-2..2.0_f64,
            hybrid in proptest::bool::ANY,
        ) {
            let penalty = if hybrid { Penalty::Hybrid { delta } } else { Penalty::Quadratic };
            let mut gradient  = vec![0.0; 36];
            let mut curvature = vec![0.0; 36];
            let mut midpoint  = vec![0.0; 36];
            gradient_into (&values, [6, 6], penalty, &mut gradient);
            surrogate_into(&values, [6, 6], penalty, &mut curvature, &mut midpoint);
            for j in 0..36 {
                let slope = 2.0 * curvature[j] * values[j] - midpoint[j];
                prop_assert!((slope - gradient[j]).abs() <= 1e-9 * (1.0 + gradient[j].abs()));
                prop_assert!(curvature[j] >= 0.0 && curvature[j] <= 1.0 + 1e-12);
            }
        }

        // The hybrid derivative never exceeds the threshold, so neither does
        // the gradient, however large the jumps.
        #[test]
        fn hybrid_gradient_is_bounded_by_delta(
            values in proptest::collection::vec(-1e3..1e3_f64, 64),
            delta  in 1e-3..10.0_f64,
        ) {
            let image = Array2::from_shape_vec((8, 8), values).unwrap();
            let g = penalty_gradient(image.view(), Penalty::Hybrid { delta });
            prop_assert!(g.iter().all(|v| v.abs() <= delta * (1.0 + 1e-12)));
        }

        #[test]
        fn hybrid_matches_quadratic_for_small_differences(t in -1e-4..1e-4_f64) {
            let delta = 10.0;
            assert_float_eq!(Penalty::Hybrid { delta }.derivative(t), t, rmax <= 1e-9);
        }
    }
}
