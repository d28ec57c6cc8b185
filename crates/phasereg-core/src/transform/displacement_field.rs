//! Dense displacement field transform.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::image::Image;
use crate::interpolation::{Interpolator, LinearInterpolator};
use crate::spatial::{Point, Spacing};
use super::trait_::Transform;

/// Dense displacement field on a regular grid: `T(p) = p + u(p)`.
///
/// The field has shape `[3, Z, Y, X]`; component 0 is the x displacement.
/// Displacements are in mm and are sampled trilinearly, clamped at the
/// grid edges.
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend> {
    field: Tensor<B, 4>,
    origin: Point<3>,
    spacing: Spacing<3>,
}

impl<B: Backend> DisplacementField<B> {
    pub fn new(field: Tensor<B, 4>, origin: Point<3>, spacing: Spacing<3>) -> Self {
        Self { field, origin, spacing }
    }

    /// Field assembled from x, y and z components on the grid of `image`.
    pub fn from_components(components: [Tensor<B, 3>; 3], image: &Image<B>) -> Self {
        let field = Tensor::stack(components.to_vec(), 0);
        Self::new(field, *image.origin(), *image.spacing())
    }

    pub fn field(&self) -> &Tensor<B, 4> {
        &self.field
    }

    pub fn component(&self, axis: usize) -> Tensor<B, 3> {
        let [_, d, h, w] = self.field.dims();
        self.field.clone().narrow(0, axis, 1).reshape([d, h, w])
    }

    pub fn components(&self) -> [Tensor<B, 3>; 3] {
        [self.component(0), self.component(1), self.component(2)]
    }

    pub fn origin(&self) -> &Point<3> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<3> {
        &self.spacing
    }
}

impl<B: Backend> Transform<B> for DisplacementField<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let grid = Image::new(self.component(0), self.origin, self.spacing);
        let indices = grid.world_to_index_tensor(points.clone());
        let interpolator = LinearInterpolator::new();

        let displacement: Vec<Tensor<B, 2>> = self
            .components()
            .iter()
            .map(|c| interpolator.interpolate(c, indices.clone()).unsqueeze_dim(1))
            .collect();
        points + Tensor::cat(displacement, 1)
    }
}
