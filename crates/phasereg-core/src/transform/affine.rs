//! Affine transform with a fixed center.

use burn::tensor::{Shape, Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::spatial::{Point, Spacing};
use super::parameters::AffineParameters;
use super::trait_::Transform;

/// Affine transform `T(x) = A(x - c) + c + t` in physical space.
///
/// * `A` is the 3×3 linear part
/// * `t` the translation in mm
/// * `c` the fixed center
#[derive(Debug, Clone)]
pub struct AffineTransform<B: Backend> {
    matrix: Tensor<B, 2>,
    translation: Tensor<B, 1>,
    center: Tensor<B, 1>,
}

impl<B: Backend> AffineTransform<B> {
    /// # Arguments
    /// * `matrix` - `[3, 3]` linear part
    /// * `translation` - `[3]` translation
    /// * `center` - `[3]` fixed center
    pub fn new(matrix: Tensor<B, 2>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self { matrix, translation, center }
    }

    pub fn identity(device: &B::Device) -> Self {
        Self::new(
            Tensor::<B, 2>::eye(3, device),
            Tensor::<B, 1>::zeros([3], device),
            Tensor::<B, 1>::zeros([3], device),
        )
    }

    /// Physical transform for voxel-unit parameters estimated on a grid with
    /// the given voxel size and physical center.
    pub fn from_parameters(
        params: &AffineParameters,
        voxel_size: &Spacing<3>,
        center: &Point<3>,
        device: &B::Device,
    ) -> Self {
        let h = params.to_physical(voxel_size);
        let mut matrix = Vec::with_capacity(9);
        for r in 0..3 {
            for c in 0..3 {
                matrix.push(h[(r, c)] as f32);
            }
        }
        let translation: Vec<f32> = (0..3).map(|r| h[(r, 3)] as f32).collect();
        let center: Vec<f32> = center.to_array().iter().map(|&v| v as f32).collect();

        Self::new(
            Tensor::<B, 1>::from_data(TensorData::new(matrix, Shape::new([9])), device).reshape([3, 3]),
            Tensor::<B, 1>::from_data(TensorData::new(translation, Shape::new([3])), device),
            Tensor::<B, 1>::from_data(TensorData::new(center, Shape::new([3])), device),
        )
    }

    pub fn matrix(&self) -> Tensor<B, 2> {
        self.matrix.clone()
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.clone()
    }

    pub fn center(&self) -> Tensor<B, 1> {
        self.center.clone()
    }
}

impl<B: Backend> Transform<B> for AffineTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // Row vectors: y = (x - c) A^T + c + t
        let c = self.center.clone().reshape([1, 3]);
        let t = self.translation.clone().reshape([1, 3]);
        let centered = points - c.clone();
        centered.matmul(self.matrix.clone().transpose()) + c + t
    }
}
