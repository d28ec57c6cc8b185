pub mod gaussian;
pub mod pyramid;
pub mod resample;

pub use gaussian::GaussianFilter;
pub use pyramid::{downscale, ScalePyramid};
pub use resample::ResampleImageFilter;
