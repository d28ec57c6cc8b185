//! Transform trait for spatial coordinate transformations.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Maps points from one physical space to another.
pub trait Transform<B: Backend> {
    /// Apply the transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[N, 3]` in `(x, y, z)` column order
    ///
    /// # Returns
    /// Tensor of shape `[N, 3]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
