//! Frequency-domain filtering of projection rows.
//!
//! The ramp is the band-limited one of Kak & Slaney: spatial taps
//!
//! ```text
//! h[0] = 1/4,   h[m] = -1/(π m)² for odd m,   h[m] = 0 for even m ≠ 0
//! ```
//!
//! transformed to the frequency domain once, and multiplied by an apodizing
//! window. Rows are zero-padded to at least twice their length, so the circular
//! convolution performed by the FFT does not wrap around.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serde::Deserialize;

use crate::{Intensity, ReconError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum FilterName {
    /// No filtering at all: plain backprojection
    None,
    Ramlak,
    #[default]
    Shepp,
    Cosine,
    Hann,
    Hamming,
    Parzen,
    Butterworth,
}

impl FilterName {

    pub const ALL: [FilterName; 8] = [
        FilterName::None, FilterName::Ramlak, FilterName::Shepp, FilterName::Cosine,
        FilterName::Hann, FilterName::Hamming, FilterName::Parzen, FilterName::Butterworth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterName::None        => "none",
            FilterName::Ramlak      => "ramlak",
            FilterName::Shepp       => "shepp",
            FilterName::Cosine      => "cosine",
            FilterName::Hann        => "hann",
            FilterName::Hamming     => "hamming",
            FilterName::Parzen      => "parzen",
            FilterName::Butterworth => "butterworth",
        }
    }

    /// Whether `filter_par[0]` (cutoff) is used
    pub fn uses_cutoff(self) -> bool {
        matches!(self, FilterName::Hann | FilterName::Hamming | FilterName::Parzen | FilterName::Butterworth)
    }

    /// Whether `filter_par[1]` (order) is used
    pub fn uses_order(self) -> bool { self == FilterName::Butterworth }

    /// Apodizing window at signed frequency `nu` (cycles per pixel, within
    /// ±0.5). `cutoff` and `order` are ignored by windows which do not use
    /// them.
    pub fn window(self, nu: f64, cutoff: f64, order: f64) -> f64 {
        let q = nu.abs() / cutoff;
        match self {
            FilterName::None | FilterName::Ramlak => 1.0,
            FilterName::Shepp => sinc(nu),
            FilterName::Cosine => (PI * nu).cos(),
            FilterName::Hann    => if q <= 1.0 { 0.5  + 0.5  * (PI * q).cos() } else { 0.0 },
            FilterName::Hamming => if q <= 1.0 { 0.54 + 0.46 * (PI * q).cos() } else { 0.0 },
            FilterName::Parzen =>
                if      q <= 0.5 { 1.0 - 6.0 * q * q * (1.0 - q) }
                else if q <= 1.0 { 2.0 * (1.0 - q).powi(3) }
                else             { 0.0 },
            FilterName::Butterworth => 1.0 / (1.0 + q.powf(2.0 * order)),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 { 1.0 } else { (PI * x).sin() / (PI * x) }
}

impl FromStr for FilterName {
    type Err = ReconError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| ReconError::UnknownFilter(s.to_string()))
    }
}

impl TryFrom<String> for FilterName {
    type Error = ReconError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl fmt::Display for FilterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Length to which rows of `n` samples are zero-padded before filtering
pub fn padded_len(n: usize) -> usize { (2 * n).next_power_of_two().max(2) }

/// Signed frequency index of FFT bin `k` of a length-`padded` transform
#[inline]
pub fn signed_index(k: usize, padded: usize) -> i64 {
    if 2 * k < padded { k as i64 } else { k as i64 - padded as i64 }
}

/// Circularly arranged spatial ramp taps, `padded` long
pub fn ramp_taps(padded: usize) -> Vec<f64> {
    let mut taps = vec![0.0; padded];
    taps[0] = 0.25;
    for m in (1..=padded / 2).step_by(2) {
        let h = -1.0 / (PI * m as f64).powi(2);
        taps[m] = h;
        taps[(padded - m) % padded] = h;
    }
    taps
}

/// Windowed ramp, sampled at the bins of a length-`padded` FFT
pub fn filter_response(padded: usize, name: FilterName, [cutoff, order]: [f64; 2]) -> Vec<f64> {
    if name == FilterName::None { return vec![1.0; padded] }
    let mut ramp: Vec<Complex64> = ramp_taps(padded).into_iter().map(|h| Complex64::new(h, 0.0)).collect();
    FftPlanner::new().plan_fft_forward(padded).process(&mut ramp);
    ramp.iter()
        .enumerate()
        .map(|(k, h)| {
            let nu = signed_index(k, padded) as f64 / padded as f64;
            h.re * name.window(nu, cutoff, order)
        })
        .collect()
}

/// Applies one filter to many rows of the same length
pub struct RowFilter {
    n: usize,
    padded: usize,
    response: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl RowFilter {

    pub fn new(n: usize, name: FilterName, filter_par: [f64; 2]) -> Self {
        let padded = padded_len(n);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(padded);
        let inverse = planner.plan_fft_inverse(padded);
        let response = filter_response(padded, name, filter_par);
        Self { n, padded, response, forward, inverse }
    }

    pub fn padded_len(&self) -> usize { self.padded }

    /// The filter's frequency response, one value per FFT bin
    pub fn response(&self) -> &[f64] { &self.response }

    /// Forward transform of `row`, zero-padded to the filter's length
    pub fn spectrum(&self, row: &[Intensity]) -> Vec<Complex64> {
        let mut buffer = vec![Complex64::new(0.0, 0.0); self.padded];
        for (b, &x) in buffer.iter_mut().zip(row) { b.re = x }
        self.forward.process(&mut buffer);
        buffer
    }

    /// Filtered copy of `row`, which must be `n` long
    pub fn apply(&self, row: &[Intensity]) -> Vec<Intensity> {
        let mut buffer = self.spectrum(row);
        for (b, &h) in buffer.iter_mut().zip(&self.response) { *b *= h }
        self.inverse.process(&mut buffer);
        let scale = 1.0 / self.padded as f64;
        buffer[..self.n].iter().map(|c| c.re * scale).collect()
    }
}
