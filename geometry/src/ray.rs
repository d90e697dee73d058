//! Find the pixels crossed by a single parallel-beam ray, and the length of the
//! ray inside each of them.
//!
//! The algorithm is centred around two key simplifications:
//!
//! 1. Express the pixel size in terms of the components of the ray's direction
//!    vector. This allows trivial calculation of how far we must move along the
//!    ray before reaching a pixel boundary, in either dimension.
//!
//! 2. Exploit symmetry to simplify dealing with directions: flip axes so that
//!    the direction of the ray has non-negative components. The algorithm can
//!    then assume that all progress is in the positive direction. Any pixel
//!    indices calculated by the algorithm, must be flipped back to the original
//!    coordinate system.

use crate::{Index2, Length, PixelGrid, Point, Vector};

/// Direction components smaller than this are treated as zero: the ray is
/// parallel to that axis and never crosses its pixel boundaries.
const PARALLEL: Length = 1e-12;

/// Distances shorter than this (in pixel units) are rounding noise.
const EPS: Length = 1e-9;

/// A line in the scan plane, in the parallel-beam parametrization: all points
/// `p` satisfying `p · (cos θ, sin θ) = offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub angle: Length,
    pub offset: Length,
}

impl Ray {

    pub fn new(angle: Length, offset: Length) -> Self { Self { angle, offset } }

    /// Unit vector perpendicular to the ray: the detector axis
    pub fn normal(&self) -> Vector {
        let (s, c) = self.angle.sin_cos();
        Vector::new(c, s)
    }

    /// Unit vector along the ray
    pub fn direction(&self) -> Vector {
        let (s, c) = self.angle.sin_cos();
        Vector::new(-s, c)
    }

    /// The point on the ray closest to the rotation axis
    pub fn foot(&self) -> Point {
        Point::from(self.normal() * self.offset)
    }

    /// Parameter interval (distance along `direction` from `foot`) over which
    /// the ray lies inside `grid`. `None` if the ray misses the grid.
    pub fn clip(&self, grid: PixelGrid) -> Option<(Length, Length)> {
        let h = grid.half_width();
        let origin = self.foot();
        let direction = self.direction();
        let mut enter = Length::NEG_INFINITY;
        let mut exit  = Length::INFINITY;
        for d in 0..2 {
            if direction[d].abs() > PARALLEL {
                let a = (-h - origin[d]) / direction[d];
                let b = ( h - origin[d]) / direction[d];
                enter = enter.max(a.min(b));
                exit  = exit .min(a.max(b));
            } else if origin[d] < -h || origin[d] >= h {
                return None;
            }
        }
        if exit - enter > EPS { Some((enter, exit)) } else { None }
    }

    /// Iterate over the pixels of `grid` crossed by this ray
    pub fn pixels(&self, grid: PixelGrid) -> PixelsAlongRay {
        PixelsAlongRay::new(self, grid)
    }

}

/// An iterator which yields the `[row, col]` indices of pixels which have been
/// traversed by a ray, along with the distance the ray covered inside that
/// pixel.
pub enum PixelsAlongRay {

    // We are at a point outside of the grid: no bookkeeping to be done.
    Outside,

    // We are traversing the grid:
    Inside {

        // How many ray distance units must be travelled before reaching the
        // next pixel boundary in either dimension.
        to_boundary: Vector,

        // Dimensions of the pixels expressed in ray distance units. Used to
        // reset components of `to_boundary` when they reach 0.
        pixel_size: Vector,

        // The flipped `[x, y]` index of the pixel we have just entered. Must be
        // flipped back before yielding to client.
        index: [usize; 2],

        // Which axes have been flipped and must be adjusted when calculating
        // indices to be yielded.
        flipped: [bool; 2],

        // Pixels per side of the grid
        n: usize,

        // Length of ray still inside the grid
        remaining: Length,
    }
}

impl PixelsAlongRay {
    pub fn new(ray: &Ray, grid: PixelGrid) -> Self {
        if grid.is_empty() { return Self::Outside }

        // Find if and where the ray enters the grid. If it misses, immediately
        // return an iterator which will generate no hits.
        let (enter, exit) = match ray.clip(grid) {
            None => return Self::Outside,
            Some(interval) => interval,
        };

        // Simplify expression of the algorithm by flipping axes so that the
        // direction of the ray is non-negative along both axes. Remember which
        // directions have been flipped, to recover correct pixel indices. The
        // grid is symmetric about the origin, so flipping leaves it unchanged.
        let mut direction = ray.direction();
        let mut entry_point = ray.foot() + direction * enter;
        let mut flipped = [false; 2];
        for d in 0..2 {
            if direction[d] < 0.0 {
                direction[d]   = -direction[d];
                entry_point[d] = -entry_point[d];
                flipped[d] = true;
            }
        }

        // Transform coordinates to align grid with axes, making the lower
        // boundaries lie on the zero-lines; with unit pixels this expresses the
        // entry point in pixel coordinates: floor(position) = index of pixel.
        let h = grid.half_width();
        let mut entry_point: Vector = entry_point.coords + Vector::repeat(h);

        // Floating-point subtractions which should give zero, usually miss very
        // slightly: if this error is negative, the next step (which uses floor)
        // will pick the wrong pixel. Work around this problem by assuming that
        // anything very close to zero is exactly zero.
        entry_point.iter_mut().for_each(|x| if x.abs() < EPS { *x = 0.0 });

        let n = grid.n;
        let last = (n - 1) as Length;
        let index = [entry_point.x.floor().clamp(0.0, last) as usize,
                     entry_point.y.floor().clamp(0.0, last) as usize];

        // Pixel size in ray length units: how far must we move along the ray to
        // traverse one pixel, in either dimension.
        let pixel_size = direction.map(|c| if c > PARALLEL { 1.0 / c } else { Length::INFINITY });

        // What fraction of the pixel has already been traversed at the entry
        // point, along either axis.
        let done = entry_point - entry_point.map(Length::floor);

        // How far we must travel along the ray before hitting the next pixel
        // boundary, in either dimension.
        let to_boundary = Vector::new((1.0 - done.x) * pixel_size.x,
                                      (1.0 - done.y) * pixel_size.y);

        Self::Inside { to_boundary, pixel_size, index, flipped, n, remaining: exit - enter }
    }
}

impl Iterator for PixelsAlongRay {

    // One item for each pixel crossed by the ray: the `[row, col]` index of the
    // pixel, and the length of the ray within that pixel.
    type Item = (Index2, Length);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self {
                // Either the ray completely missed the grid, or we have
                // traversed it and come out of the other side.
                Self::Outside => return None,

                Self::Inside { to_boundary, pixel_size, index, flipped, n, remaining } => {

                    // Remember index of the pixel we are about to cross, flipped
                    // back to the client's coordinate system.
                    let unflip = |d: usize| if flipped[d] { *n - 1 - index[d] } else { index[d] };
                    let (col, row) = (unflip(0), unflip(1));

                    // Which boundary will be hit next, and how soon. Never go
                    // beyond the exit point.
                    let distance = to_boundary.min().min(*remaining);

                    // Move along ray until we hit pixel boundary
                    *to_boundary -= Vector::repeat(distance);
                    *remaining -= distance;

                    let mut finished = *remaining <= EPS;

                    // For any dimension in which we have reached a pixel boundary
                    for d in 0..2 {
                        if to_boundary[d] <= EPS {
                            to_boundary[d] = pixel_size[d];
                            index[d] += 1;
                            if index[d] >= *n { finished = true; }
                        }
                    }

                    if finished { *self = Self::Outside }

                    // Corners crossed exactly produce zero-length steps
                    if distance > EPS {
                        return Some(([row, col], distance));
                    }
                }
            }
        }
    }
}
