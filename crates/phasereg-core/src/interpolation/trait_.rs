//! Interpolator trait for sampling values at continuous coordinates.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Samples a `[Z, Y, X]` volume at continuous voxel indices.
pub trait Interpolator<B: Backend> {
    /// Interpolate `data` at `indices`.
    ///
    /// # Arguments
    /// * `data` - Volume tensor `[Z, Y, X]`
    /// * `indices` - Continuous indices `[N, 3]` in `(x, y, z)` column order
    ///
    /// # Returns
    /// Sampled values `[N]`
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
