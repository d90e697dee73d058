//! Synthetic slices and acquisition geometries, for tests and demonstrations.

use std::f64::consts::PI;

use ndarray::{Array2, Array3, ArrayView2};

use crate::{Angle, Intensity, Length};

/// An `n x n` slice holding `value` inside a centred disk of `radius` pixels
pub fn disk(n: usize, radius: Length, value: Intensity) -> Array2<Intensity> {
    ellipses(n, &[Ellipse { value, centre: (0.0, 0.0), axes: (radius, radius), rotation: 0.0 }])
}

/// An ellipse in the slice frame, with centre and semi-axes in pixels
#[derive(Clone, Copy, Debug)]
pub struct Ellipse {
    pub value: Intensity,
    pub centre: (Length, Length),
    pub axes: (Length, Length),
    /// Rotation of the first axis, anticlockwise
    pub rotation: Angle,
}

impl Ellipse {
    fn contains(&self, x: Length, y: Length) -> bool {
        let (dx, dy) = (x - self.centre.0, y - self.centre.1);
        let (s, c) = self.rotation.sin_cos();
        let u = ( dx * c + dy * s) / self.axes.0;
        let v = (-dx * s + dy * c) / self.axes.1;
        u * u + v * v <= 1.0
    }
}

/// The (modified, higher contrast) Shepp-Logan head phantom
pub fn shepp_logan(n: usize) -> Array2<Intensity> {
    let half = n as Length / 2.0;
    let deg = PI / 180.0;
    let scaled = |value, (x, y), (a, b), rotation: f64| Ellipse {
        value,
        centre: (x * half, y * half),
        axes: (a * half, b * half),
        rotation: rotation * deg,
    };
    ellipses(n, &[
        scaled( 1.0, ( 0.0 ,  0.0   ), (0.69 , 0.92 ),   0.0),
        scaled(-0.8, ( 0.0 , -0.0184), (0.6624, 0.874),  0.0),
        scaled(-0.2, ( 0.22,  0.0   ), (0.11 , 0.31 ), -18.0),
        scaled(-0.2, (-0.22,  0.0   ), (0.16 , 0.41 ),  18.0),
        scaled( 0.1, ( 0.0 ,  0.35  ), (0.21 , 0.25 ),   0.0),
        scaled( 0.1, ( 0.0 ,  0.1   ), (0.046, 0.046),   0.0),
        scaled( 0.1, ( 0.0 , -0.1   ), (0.046, 0.046),   0.0),
        scaled( 0.1, (-0.08, -0.605 ), (0.046, 0.023),   0.0),
        scaled( 0.1, ( 0.0 , -0.606 ), (0.023, 0.023),   0.0),
        scaled( 0.1, ( 0.06, -0.605 ), (0.023, 0.046),   0.0),
    ])
}

/// Sum of the values of all `ellipses` containing each pixel centre
pub fn ellipses(n: usize, ellipses: &[Ellipse]) -> Array2<Intensity> {
    let half = n as Length / 2.0;
    Array2::from_shape_fn((n, n), |(i, j)| {
        let x = j as Length + 0.5 - half;
        let y = i as Length + 0.5 - half;
        ellipses.iter()
            .filter(|e| e.contains(x, y))
            .map(|e| e.value)
            .sum()
    })
}

/// `n` equally spaced angles covering `[0, range)`
pub fn uniform_angles(n: usize, range: Angle) -> Vec<Angle> {
    (0..n).map(|k| k as Angle * range / n as Angle).collect()
}

/// A volume of `n_slices` copies of `slice`
pub fn stack(slice: ArrayView2<Intensity>, n_slices: usize) -> Array3<Intensity> {
    let (rows, cols) = slice.dim();
    Array3::from_shape_fn((n_slices, rows, cols), |(_, i, j)| slice[[i, j]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn disk_area_is_close_to_pi_r_squared() {
        let image = disk(64, 20.0, 1.0);
        let area = image.sum();
        assert_float_eq!(area, PI * 400.0, rmax <= 0.02);
        assert_eq!(image[[0, 0]], 0.0);
        assert_eq!(image[[32, 32]], 1.0);
    }

    #[test]
    fn shepp_logan_has_expected_values() {
        let image = shepp_logan(128);
        // Outside the skull
        assert_eq!(image[[0, 0]], 0.0);
        // Skull rim, on the vertical axis, lies in only the outer ellipse
        assert_float_eq!(image[[5, 64]], 1.0, abs <= 1e-12);
        // Brain matter in the middle
        assert_float_eq!(image[[64, 64]], 0.2, abs <= 1e-12);
        assert!(image.iter().all(|&x| x >= -1e-12));
    }

    #[test]
    fn angles_exclude_endpoint() {
        let angles = uniform_angles(4, PI);
        assert_eq!(angles, vec![0.0, PI / 4.0, PI / 2.0, 3.0 * PI / 4.0]);
        assert!(uniform_angles(0, PI).is_empty());
    }

    #[test]
    fn stack_repeats_slice() {
        let volume = stack(disk(8, 3.0, 2.0).view(), 3);
        assert_eq!(volume.dim(), (3, 8, 8));
        assert_eq!(volume.index_axis(ndarray::Axis(0), 2), disk(8, 3.0, 2.0));
    }
}
