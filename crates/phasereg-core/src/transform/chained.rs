//! Composition of two transforms: `T(x) = second(first(x))`.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use super::trait_::Transform;
use std::marker::PhantomData;

/// Applies `first`, then `second`.
///
/// A displacement field followed by an affine gives the deformable warp
/// `x ↦ A(x + u(x))`.
#[derive(Debug, Clone)]
pub struct ChainedTransform<B: Backend, T1, T2> {
    pub first: T1,
    pub second: T2,
    _phantom: PhantomData<B>,
}

impl<B: Backend, T1, T2> ChainedTransform<B, T1, T2> {
    pub fn new(first: T1, second: T2) -> Self {
        Self { first, second, _phantom: PhantomData }
    }
}

impl<B: Backend, T1, T2> Transform<B> for ChainedTransform<B, T1, T2>
where
    T1: Transform<B>,
    T2: Transform<B>,
{
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let intermediate = self.first.transform_points(points);
        self.second.transform_points(intermediate)
    }
}
