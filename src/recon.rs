//! The reconstruction orchestrator.
//!
//! A request is validated completely before any work is done: either a full
//! volume comes back, or an error and nothing else. The geometry weights (and
//! everything else a solver precomputes) are built once per call and shared by
//! all slices, which are reconstructed independently and in parallel.

/// Tuning parameters of a reconstruction. Each algorithm reads only the ones
/// that concern it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconParams {
    /// Passes over the data made by iterative algorithms
    pub num_iter: usize,
    /// Number of ordered subsets (OS variants) or blocks (BART)
    pub num_subset: usize,
    /// Detector coordinate of the rotation axis; `None` is the detector's middle
    pub center: Option<Length>,
    /// Penalty weight β of the penalized algorithms
    pub reg_par: f64,
    /// Threshold of the hybrid penalty
    pub reg_delta: f64,
    pub filter: FilterName,
    /// Filter cutoff (cycles per pixel) and Butterworth order
    pub filter_par: [f64; 2],
    /// Scaling of the additive corrections of ART, BART and SIRT
    pub relaxation: f64,
    pub subset_ordering: SubsetOrdering,
    /// Support of the gridrec interpolation kernel, in grid cells
    pub kernel_width: f64,
}

impl Default for ReconParams {
    fn default() -> Self {
        Self {
            num_iter: 1,
            num_subset: 1,
            center: None,
            reg_par: 0.1,
            reg_delta: 0.1,
            filter: FilterName::Shepp,
            filter_par: [0.5, 2.0],
            relaxation: 1.0,
            subset_ordering: SubsetOrdering::Interleaved,
            kernel_width: 4.0,
        }
    }
}

impl ReconParams {

    /// Check the parameters used by `algorithm`
    pub fn validate(&self, algorithm: Algorithm) -> Result<()> {
        let check = |ok: bool, name, reason: &str| {
            if ok { Ok(()) } else { Err(ReconError::invalid(name, reason)) }
        };
        check(self.num_subset >= 1, "num_subset", "must be at least 1")?;
        if let Some(center) = self.center {
            check(center.is_finite(), "center", "must be finite")?;
        }
        if algorithm.is_penalized() {
            check(self.reg_par >= 0.0 && self.reg_par.is_finite(), "reg_par", "must be finite and non-negative")?;
        }
        if algorithm.uses_hybrid_penalty() {
            check(self.reg_delta > 0.0 && self.reg_delta.is_finite(), "reg_delta", "must be finite and positive")?;
        }
        if algorithm.uses_relaxation() {
            check(self.relaxation > 0.0 && self.relaxation.is_finite(), "relaxation", "must be finite and positive")?;
        }
        if algorithm.uses_filter() {
            let [cutoff, order] = self.filter_par;
            if self.filter.uses_cutoff() {
                check(cutoff > 0.0 && cutoff <= 0.5, "filter_par", "cutoff must lie in (0, 0.5]")?;
            }
            if self.filter.uses_order() {
                check(order > 0.0 && order.is_finite(), "filter_par", "order must be finite and positive")?;
            }
        }
        if algorithm == Algorithm::Gridrec {
            check(self.kernel_width >= 2.0 && self.kernel_width.is_finite(), "kernel_width", "must be at least 2")?;
        }
        Ok(())
    }
}

/// Caller-level control of a reconstruction call.
#[derive(Default)]
pub struct Control<'a> {
    /// Checked before each slice is started, never in the middle of one
    pub deadline: Option<Instant>,
    /// Called with the index of every slice as soon as it is finished. Slices
    /// finish in no particular order.
    pub progress: Option<Box<dyn Fn(usize) + Send + Sync + 'a>>,
}

impl<'a> Control<'a> {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(usize) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ReconError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    fn report(&self, slice: usize) {
        if let Some(progress) = &self.progress { progress(slice) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    /// Performing iteration `k` (counting from 0)
    Iterating(usize),
    MaxIterReached,
}

/// Bookkeeping of one slice's iterative solve
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceState {
    pub phase: Phase,
    /// Completed iterations
    pub iteration: usize,
    /// Units of work (rays, blocks or subsets) in each iteration
    pub units: usize,
    /// Sum of squared residuals `|y - Ax|²` after each iteration, if tracked
    pub residuals: Vec<f64>,
}

impl ConvergenceState {
    fn new(units: usize) -> Self {
        Self { phase: Phase::Initialized, iteration: 0, units, residuals: vec![] }
    }
}

/// Drive `solver` for `num_iter` iterations, starting from `image`.
fn run_iterations(
    solver: &dyn IterativeSolver,
    measured: &[Intensity],
    image: &mut [Intensity],
    num_iter: usize,
    track_residuals: bool,
) -> ConvergenceState {
    let mut state = ConvergenceState::new(solver.units());
    for k in 0..num_iter {
        state.phase = Phase::Iterating(k);
        solver.iterate(measured, image);
        state.iteration = k + 1;
        if track_residuals {
            let geometry = solver.geometry();
            let predicted = project(geometry, image, &all_angles(geometry));
            let residual = sum_of_squared_residuals(&predicted, measured);
            debug!(iteration = k, residual, "iteration done");
            state.residuals.push(residual);
        } else {
            trace!(iteration = k, "iteration done");
        }
    }
    state.phase = Phase::MaxIterReached;
    state
}

fn check_geometry(n_angles: usize, n_pixels: usize, angles: &[Angle]) -> Result<()> {
    if n_angles == 0 { return Err(ReconError::invalid("sinogram", "contains no angles")) }
    if n_pixels == 0 { return Err(ReconError::invalid("sinogram", "contains no detector pixels")) }
    if angles.len() != n_angles {
        return Err(ReconError::ShapeMismatch { what: "angles", expected: vec![n_angles], got: vec![angles.len()] })
    }
    Ok(())
}

/// Reconstruct every slice of `sinogram` (shape `[angles, slices, pixels]`)
/// into a volume of shape `[slices, pixels, pixels]`.
///
/// Iterative algorithms start from `init_volume` or, if it is absent, from a
/// uniform `DEFAULT_INIT`. Analytic algorithms ignore both it and `num_iter`.
pub fn reconstruct(
    sinogram: ArrayView3<Intensity>,
    angles: &[Angle],
    algorithm: Algorithm,
    params: &ReconParams,
    init_volume: Option<ArrayView3<Intensity>>,
) -> Result<Array3<Intensity>> {
    reconstruct_with(sinogram, angles, algorithm, params, init_volume, &Control::default())
}

/// `reconstruct`, with a deadline and progress reporting
pub fn reconstruct_with(
    sinogram: ArrayView3<Intensity>,
    angles: &[Angle],
    algorithm: Algorithm,
    params: &ReconParams,
    init_volume: Option<ArrayView3<Intensity>>,
    control: &Control,
) -> Result<Array3<Intensity>> {
    let (n_angles, n_slices, n) = sinogram.dim();
    check_geometry(n_angles, n, angles)?;
    if let Some(init) = &init_volume {
        if init.dim() != (n_slices, n, n) {
            let (a, b, c) = init.dim();
            return Err(ReconError::ShapeMismatch {
                what: "init_volume", expected: vec![n_slices, n, n], got: vec![a, b, c],
            })
        }
    }
    params.validate(algorithm)?;
    control.check_deadline()?;

    let center = params.center.unwrap_or(n as Length / 2.0);
    info!(%algorithm, n_angles, n_slices, n_pixels = n, center, "reconstruction started");
    let mut timer = Progress::new();
    let solver = Solver::new(algorithm, angles, n, center, params);
    timer.done_with_message("Prepared solver");

    let slices: Vec<ImageData> = (0..n_slices)
        .into_par_iter()
        .map(|slice| {
            control.check_deadline()?;
            let measured = as_flat(sinogram.slice(s![.., slice, ..]));
            let image = match &solver {
                Solver::Analytic(solver) => solver.solve(&measured),
                Solver::Iterative(solver) => {
                    let mut image = match &init_volume {
                        Some(init) => as_flat(init.slice(s![slice, .., ..])).into_owned(),
                        None       => vec![DEFAULT_INIT; n * n],
                    };
                    run_iterations(&**solver, &measured, &mut image, params.num_iter, false);
                    image
                }
            };
            debug!(slice, "slice reconstructed");
            control.report(slice);
            Ok(image)
        })
        .collect::<Result<_>>()?;

    let mut volume = Array3::zeros((n_slices, n, n));
    for (mut out, data) in volume.outer_iter_mut().zip(slices) {
        out.iter_mut().zip(data).for_each(|(o, v)| *o = v);
    }
    timer.done_with_message("Reconstructed all slices");
    info!(%algorithm, "reconstruction finished");
    Ok(volume)
}

/// Run an iterative algorithm on a single slice (`sinogram` has shape
/// `[angles, pixels]`), reporting the residual after every iteration.
pub fn iterate_slice(
    sinogram: ArrayView2<Intensity>,
    angles: &[Angle],
    algorithm: Algorithm,
    params: &ReconParams,
    init: Option<ArrayView2<Intensity>>,
) -> Result<(Array2<Intensity>, ConvergenceState)> {
    let (n_angles, n) = sinogram.dim();
    check_geometry(n_angles, n, angles)?;
    if let Some(init) = &init {
        if init.dim() != (n, n) {
            let (a, b) = init.dim();
            return Err(ReconError::ShapeMismatch { what: "init", expected: vec![n, n], got: vec![a, b] })
        }
    }
    params.validate(algorithm)?;
    if !algorithm.is_iterative() {
        return Err(ReconError::invalid("algorithm", format!("`{algorithm}` is not iterative")))
    }

    let center = params.center.unwrap_or(n as Length / 2.0);
    let Solver::Iterative(solver) = Solver::new(algorithm, angles, n, center, params) else {
        return Err(ReconError::invalid("algorithm", format!("`{algorithm}` is not iterative")))
    };
    let measured = as_flat(sinogram);
    let mut image = match init {
        Some(init) => as_flat(init).into_owned(),
        None       => vec![DEFAULT_INIT; n * n],
    };
    let state = run_iterations(&*solver, &measured, &mut image, params.num_iter, true);
    Ok((array2_from_vec(n, n, &image), state))
}

/// Forward project every slice of `volume` (shape `[slices, n, n]`) into a
/// sinogram of shape `[angles, slices, n]`, with the same operator the
/// reconstructions use.
pub fn simulate(volume: ArrayView3<Intensity>, angles: &[Angle], center: Option<Length>) -> Result<Array3<Intensity>> {
    let (n_slices, rows, n) = volume.dim();
    if rows != n {
        return Err(ReconError::ShapeMismatch { what: "volume", expected: vec![n_slices, n, n], got: vec![n_slices, rows, n] })
    }
    check_geometry(angles.len(), n, angles)?;
    let weights = GeometryWeights::new(angles, n, center.unwrap_or(n as Length / 2.0));
    let all = all_angles(&weights);
    let projected: Vec<SinogramData> = (0..n_slices)
        .into_par_iter()
        .map(|slice| project(&weights, &as_flat(volume.slice(s![slice, .., ..])), &all))
        .collect();
    let mut sinogram = Array3::zeros((angles.len(), n_slices, n));
    for (slice, rows) in projected.iter().enumerate() {
        for (a, row) in rows.chunks(n).enumerate() {
            for (d, &value) in row.iter().enumerate() {
                sinogram[[a, slice, d]] = value;
            }
        }
    }
    Ok(sinogram)
}

// ----- Imports ------------------------------------------------------------------------------------------
use std::time::Instant;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::{
    Algorithm, Angle, ImageData, Intensity, Length, ReconError, Result, SinogramData, DEFAULT_INIT,
    analytic::FilterName,
    fom::sum_of_squared_residuals,
    projector::{all_angles, project},
    solver::{IterativeSolver, Solver},
    subsets::SubsetOrdering,
    system_matrix::GeometryWeights,
    utils::{array2_from_vec, as_flat, timing::Progress},
};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn invalid_name(result: Result<()>) -> &'static str {
        match result {
            Err(ReconError::InvalidParameter { name, .. }) => name,
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[rstest]
    #[case(Algorithm::Osem      , ReconParams { num_subset: 0, ..Default::default() }, "num_subset")]
    #[case(Algorithm::Sirt      , ReconParams { num_subset: 0, ..Default::default() }, "num_subset")]
    #[case(Algorithm::PmlQuad   , ReconParams { reg_par: -0.1, ..Default::default() }, "reg_par"   )]
    #[case(Algorithm::OspmlHybrid, ReconParams { reg_delta: 0.0, ..Default::default() }, "reg_delta" )]
    #[case(Algorithm::Art       , ReconParams { relaxation: 0.0, ..Default::default() }, "relaxation")]
    #[case(Algorithm::Fbp       , ReconParams { filter: FilterName::Hann, filter_par: [0.7, 2.0], ..Default::default() }, "filter_par")]
    #[case(Algorithm::Gridrec   , ReconParams { kernel_width: 1.0, ..Default::default() }, "kernel_width")]
    #[case(Algorithm::Mlem      , ReconParams { center: Some(f64::NAN), ..Default::default() }, "center")]
    fn invalid_parameters_are_rejected(#[case] algorithm: Algorithm, #[case] params: ReconParams, #[case] name: &str) {
        assert_eq!(invalid_name(params.validate(algorithm)), name);
    }

    #[test]
    fn irrelevant_parameters_are_ignored() {
        let params = ReconParams { reg_par: -1.0, relaxation: -1.0, kernel_width: 0.0, ..Default::default() };
        assert!(params.validate(Algorithm::Mlem).is_ok());
        let params = ReconParams { filter: FilterName::Shepp, filter_par: [9.0, -1.0], ..Default::default() };
        assert!(params.validate(Algorithm::Fbp).is_ok());
    }

    #[test]
    fn defaults_are_valid_for_every_algorithm() {
        for algorithm in Algorithm::ALL {
            assert!(ReconParams::default().validate(algorithm).is_ok(), "{algorithm}");
        }
    }

    #[test]
    fn progress_is_reported_for_every_slice() {
        use std::sync::Mutex;
        let n = 8;
        let sinogram = Array3::from_elem((6, 3, n), 1.0);
        let angles: Vec<_> = (0..6).map(|k| k as f64 * 0.5).collect();
        let seen = Mutex::new(vec![]);
        let control = Control::default().with_progress(|slice| seen.lock().unwrap().push(slice));
        reconstruct_with(sinogram.view(), &angles, Algorithm::Sirt, &ReconParams::default(), None, &control).unwrap();
        drop(control);
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
