use std::borrow::Cow;

use ndarray::{Array2, ArrayView, Dimension};

use crate::{Intensity, ReconError, Result};

/// The elements of `array` in logical (row-major) order, borrowed when the
/// array is already laid out that way.
pub fn as_flat<'a, D: Dimension>(array: ArrayView<'a, Intensity, D>) -> Cow<'a, [Intensity]> {
    match array.to_slice() {
        Some(data) => Cow::Borrowed(data),
        None       => Cow::Owned(array.iter().copied().collect()),
    }
}

/// Row-major `data` as a `rows x cols` array
pub fn array2_from_vec(rows: usize, cols: usize, data: &[Intensity]) -> Array2<Intensity> {
    Array2::from_shape_fn((rows, cols), |(i, j)| data[i * cols + j])
}

pub fn parse_triplet<T: std::str::FromStr>(s: &str) -> Result<(T, T, T)> {
    let bad = || ReconError::invalid("triplet", format!("expected three comma-separated numbers, got `{s}`"));
    let v = s.split(',').map(str::trim).collect::<Vec<_>>();
    if v.len() != 3 { return Err(bad()) }
    let parse = |x: &str| x.parse::<T>().map_err(|_| bad());
    Ok((parse(v[0])?, parse(v[1])?, parse(v[2])?))
}

pub mod timing {

    use std::time::Instant;
    use tracing::info;

    /// Log how long each stage of a program took
    pub struct Progress {
        previous: Instant,
    }

    impl Progress {

        #[allow(clippy::new_without_default)]
        pub fn new() -> Self { Self { previous: Instant::now() } }

        // Log message followed by time elapsed since creation or last call
        pub fn done_with_message(&mut self, message: &str) {
            info!("{message}: {} ms", self.previous.elapsed().as_millis());
            self.previous = Instant::now();
        }
    }
}
