use burn::tensor::backend::Backend;
use crate::image::Image;
use crate::interpolation::LinearInterpolator;
use crate::spatial::{Spacing, Vector};
use crate::transform::AffineTransform;
use super::gaussian::GaussianFilter;
use super::resample::ResampleImageFilter;

/// Coarse copy of `image` with voxels `factor` times larger.
///
/// Smooths with a Gaussian of `0.5 · factor` input voxels, then resamples
/// onto a `ceil(n / factor)` grid sharing the input's centre. Samples outside
/// the input take the value 0.
pub fn downscale<B: Backend>(image: &Image<B>, factor: usize) -> Image<B> {
    if factor <= 1 {
        return image.clone();
    }

    let f = factor as f64;
    let spacing = image.spacing();
    let sigmas = [0.5 * f * spacing[0], 0.5 * f * spacing[1], 0.5 * f * spacing[2]];
    let smoothed = GaussianFilter::new(sigmas).apply(image);

    let size = image.size().map(|n| n.div_ceil(factor));
    let target_spacing: Spacing<3> = *spacing * f;
    let mut half_extent = Vector::zeros();
    for axis in 0..3 {
        half_extent[axis] = (size[axis] as f64 - 1.0) / 2.0 * target_spacing[axis];
    }
    let origin = image.center() + (-half_extent);

    let device = image.data().device();
    ResampleImageFilter::new(
        [size[2], size[1], size[0]],
        origin,
        target_spacing,
        AffineTransform::identity(&device),
        LinearInterpolator::with_fill(0.0),
    )
    .apply(&smoothed)
}

/// Coarse-to-fine image levels with power-of-two shrink factors.
///
/// Level 0 is the coarsest; the last level is the input itself.
pub struct ScalePyramid<B: Backend> {
    images: Vec<Image<B>>,
    factors: Vec<usize>,
}

impl<B: Backend> ScalePyramid<B> {
    /// Build levels `coarsest, coarsest / 2, …, 1`. `coarsest` should be a power of two.
    pub fn new(input: &Image<B>, coarsest: usize) -> Self {
        let factors = Self::schedule(coarsest);
        let images = factors.iter().map(|&f| downscale(input, f)).collect();
        Self { images, factors }
    }

    /// Shrink factors from coarsest to finest, e.g. 4 -> [4, 2, 1].
    pub fn schedule(coarsest: usize) -> Vec<usize> {
        let mut factors = Vec::new();
        let mut f = coarsest.max(1);
        while f > 1 {
            factors.push(f);
            f /= 2;
        }
        factors.push(1);
        factors
    }

    pub fn level(&self, level: usize) -> &Image<B> {
        &self.images[level]
    }

    pub fn factor(&self, level: usize) -> usize {
        self.factors[level]
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }

    pub fn into_finest(mut self) -> Option<Image<B>> {
        self.images.pop()
    }
}
