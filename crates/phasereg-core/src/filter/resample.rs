//! Resample image filter.
//!
//! Resamples an image onto a new grid by mapping each output voxel through a
//! transform into the input's physical space and interpolating there.

use std::marker::PhantomData;
use burn::tensor::backend::Backend;
use crate::image::{generate_grid_3d, Image};
use crate::interpolation::Interpolator;
use crate::spatial::{Point, Spacing};
use crate::transform::Transform;

/// Pull-back resampler.
///
/// The transform maps output physical space to input physical space. What
/// happens outside the input's field of view is decided by the interpolator
/// (clamp-to-edge or a fill value).
pub struct ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    shape: [usize; 3],
    origin: Point<3>,
    spacing: Spacing<3>,
    transform: T,
    interpolator: I,
    _phantom: PhantomData<B>,
}

impl<B, T, I> ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    /// # Arguments
    /// * `shape` - Output tensor shape `[Z, Y, X]`
    /// * `origin` - Output origin (mm)
    /// * `spacing` - Output spacing (mm)
    /// * `transform` - Output space to input space
    /// * `interpolator` - Input sampler
    pub fn new(shape: [usize; 3], origin: Point<3>, spacing: Spacing<3>, transform: T, interpolator: I) -> Self {
        Self {
            shape,
            origin,
            spacing,
            transform,
            interpolator,
            _phantom: PhantomData,
        }
    }

    /// Output grid taken from `reference`.
    pub fn new_from_reference(reference: &Image<B>, transform: T, interpolator: I) -> Self {
        Self::new(reference.shape(), *reference.origin(), *reference.spacing(), transform, interpolator)
    }

    pub fn apply(&self, input: &Image<B>) -> Image<B> {
        let device = input.data().device();
        let output_indices = generate_grid_3d::<B>(self.shape, &device);
        let output_grid = Image::new(input.data().clone(), self.origin, self.spacing);
        let output_points = output_grid.index_to_world_tensor(output_indices);

        let input_points = self.transform.transform_points(output_points);
        let input_indices = input.world_to_index_tensor(input_points);

        let values = self.interpolator.interpolate(input.data(), input_indices);
        Image::new(values.reshape(self.shape), self.origin, self.spacing)
    }
}
