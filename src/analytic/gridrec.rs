//! Direct Fourier reconstruction by gridding.
//!
//! By the Fourier slice theorem, the 1D transform of the projection at angle θ
//! samples the 2D transform of the slice along the line through the origin at
//! angle θ. Gridrec
//!
//! 1. transforms each (filtered, zero-padded) row,
//!
//! 2. spreads every polar sample onto a Cartesian frequency grid, twice as fine
//!    as the slice, by convolution with a Kaiser-Bessel kernel,
//!
//! 3. inverse transforms the grid, and
//!
//! 4. divides out the kernel's own transform (deapodization), which the
//!    convolution of step 2 multiplied into the slice.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use crate::{Angle, ImageData, Intensity, Length, solver::AnalyticSolver};
use super::{filter::signed_index, FilterName, RowFilter};

/// Oversampling factor of the Cartesian grid, relative to the slice
const OVERSAMPLING: f64 = 2.0;

/// Samples of the tabulated kernel per grid cell
const TABLE_DENSITY: usize = 1024;

/// Modified Bessel function of the first kind, order zero, by its power series.
pub fn bessel_i0(x: f64) -> f64 {
    let q = 0.25 * x * x;
    let mut term = 1.0;
    let mut sum  = 1.0;
    let mut k = 0.0;
    loop {
        k += 1.0;
        term *= q / (k * k);
        sum += term;
        if term < sum * 1e-17 { return sum }
    }
}

/// Separable gridding kernel `I0(β √(1 - (2u/L)²))` with support `|u| ≤ L/2`
#[derive(Clone, Debug)]
pub struct KaiserBessel {
    width: f64,
    beta: f64,
    table: Vec<f64>,
}

impl KaiserBessel {

    /// `β` of Beatty et al., which minimizes aliasing for the given `width` and
    /// the grid's oversampling.
    pub fn new(width: f64) -> Self {
        let alpha = OVERSAMPLING;
        let beta = PI * ((width / alpha).powi(2) * (alpha - 0.5).powi(2) - 0.8).sqrt();
        let half = width / 2.0;
        let size = (TABLE_DENSITY as f64 * half).ceil() as usize + 2;
        let table = (0..size)
            .map(|i| {
                let u = i as f64 / TABLE_DENSITY as f64;
                Self::exact(width, beta, u)
            })
            .collect();
        Self { width, beta, table }
    }

    fn exact(width: f64, beta: f64, u: f64) -> f64 {
        let r = 2.0 * u / width;
        if r.abs() > 1.0 { 0.0 } else { bessel_i0(beta * (1.0 - r * r).sqrt()) }
    }

    pub fn width(&self) -> f64 { self.width }
    pub fn beta (&self) -> f64 { self.beta  }

    /// Kernel value at distance `u` (grid cells), linearly interpolated from
    /// the table
    pub fn value(&self, u: f64) -> f64 {
        let u = u.abs();
        if u > self.width / 2.0 { return 0.0 }
        let x = u * TABLE_DENSITY as f64;
        let i = x.floor() as usize;
        let f = x - i as f64;
        self.table[i] * (1.0 - f) + self.table[i + 1] * f
    }

    /// Continuous Fourier transform of the kernel at frequency `xi` (cycles per
    /// grid cell)
    pub fn transform(&self, xi: f64) -> f64 {
        let a = self.beta * self.beta - (PI * self.width * xi).powi(2);
        if a > 0.0 {
            let s = a.sqrt();
            self.width * s.sinh() / s
        } else if a < 0.0 {
            let s = (-a).sqrt();
            self.width * s.sin() / s
        } else {
            self.width
        }
    }
}

pub struct Gridrec {
    n: usize,
    // Cosines and sines of the projection angles
    directions: Vec<(f64, f64)>,
    filter: RowFilter,
    kernel: KaiserBessel,
    // Per FFT bin: moves the origin of each row from detector pixel 0 to the
    // rotation axis
    detector_shift: Vec<Complex64>,
    // Pixel centres lie at integer positions `j + offset` of the inverse
    // transform, plus `fraction`, which is applied to the samples instead
    offset: i64,
    fraction: f64,
    // Kernel transform at each pixel's position in the inverse transform
    deapodization: Vec<f64>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Gridrec {
    pub fn new(angles: &[Angle], n: usize, center: Length, filter: FilterName, filter_par: [f64; 2], kernel_width: f64) -> Self {
        let filter = RowFilter::new(n, filter, filter_par);
        let padded = filter.padded_len();
        let p = padded as f64;
        let kernel = KaiserBessel::new(kernel_width);

        let directions = angles.iter().map(|a| (a.cos(), a.sin())).collect();

        let phase = |k: usize, shift: f64| {
            let ks = signed_index(k, padded) as f64;
            Complex64::from_polar(1.0, 2.0 * PI * ks * shift / p)
        };
        let detector_shift = (0..padded).map(|k| phase(k, -(0.5 - center))).collect();

        // Coordinate of the centre of pixel 0
        let origin = 0.5 - n as f64 / 2.0;
        let offset = origin.floor();
        let fraction = origin - offset;
        let offset = offset as i64;
        let deapodization = (0..n).map(|j| kernel.transform((j as i64 + offset) as f64 / p)).collect();

        let inverse = FftPlanner::new().plan_fft_inverse(padded);
        Self { n, directions, filter, kernel, detector_shift, offset, fraction, deapodization, inverse }
    }

    /// Spread `value`, located at fractional grid coordinates `(u, v)`, onto
    /// the periodic `padded x padded` grid (row index `v`).
    fn spread(&self, grid: &mut [Complex64], padded: usize, u: f64, v: f64, value: Complex64) {
        let half = self.kernel.width() / 2.0;
        let p = padded as i64;
        let (u0, u1) = ((u - half).ceil() as i64, (u + half).floor() as i64);
        let (v0, v1) = ((v - half).ceil() as i64, (v + half).floor() as i64);
        for b in v0..=v1 {
            let wv = self.kernel.value(v - b as f64);
            if wv == 0.0 { continue }
            let row = b.rem_euclid(p) as usize * padded;
            for a in u0..=u1 {
                let w = wv * self.kernel.value(u - a as f64);
                grid[row + a.rem_euclid(p) as usize] += value * w;
            }
        }
    }
}

impl AnalyticSolver for Gridrec {
    fn solve(&self, measured: &[Intensity]) -> ImageData {
        let n = self.n;
        let padded = self.filter.padded_len();
        let response = self.filter.response();
        let scale = PI / self.directions.len() as f64 / padded as f64;

        // ----- Polar samples -> Cartesian grid --------------------------------
        let mut grid = vec![Complex64::new(0.0, 0.0); padded * padded];
        for (row, &(cos, sin)) in measured.chunks(n).zip(&self.directions) {
            let spectrum = self.filter.spectrum(row);
            for (k, value) in spectrum.into_iter().enumerate() {
                let weight = response[k] * scale;
                if weight == 0.0 { continue }
                let ks = signed_index(k, padded) as f64;
                let (u, v) = (ks * cos, ks * sin);
                let subpixel = Complex64::from_polar(1.0, 2.0 * PI * (u + v) * self.fraction / padded as f64);
                let value = value * self.detector_shift[k] * subpixel * weight;
                self.spread(&mut grid, padded, u, v, value);
            }
        }

        // ----- Inverse transform ---------------------------------------------
        // Along u (columns) ...
        self.inverse.process(&mut grid);
        // ... then along v, on the transposed grid: transposed[x][y]
        let mut transposed = vec![Complex64::new(0.0, 0.0); padded * padded];
        for (b, row) in grid.chunks(padded).enumerate() {
            for (a, g) in row.iter().enumerate() {
                transposed[a * padded + b] = *g;
            }
        }
        self.inverse.process(&mut transposed);

        // ----- Keep the slice, divide out the kernel --------------------------
        let p = padded as i64;
        let position = |j: usize| (j as i64 + self.offset).rem_euclid(p) as usize;
        let mut image = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                let value = transposed[position(j) * padded + position(i)].re;
                image[i * n + j] = value / (self.deapodization[i] * self.deapodization[j]);
            }
        }
        image
    }
}
