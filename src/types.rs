pub type Length    = geometry::Length;
pub type Angle     = f64;
pub type Weight    = f64;
pub type Intensity = f64;

pub type Index1 = geometry::Index1;
pub type Index2 = geometry::Index2;

/// Row-major pixel values of one `n x n` slice
pub type ImageData = Vec<Intensity>;

/// Angle-major measurements of one slice: `n_angles` rows of `n_pixels`
pub type SinogramData = Vec<Intensity>;

/// Value of every pixel of the default starting estimate of iterative solvers
pub const DEFAULT_INIT: Intensity = 1e-6;
