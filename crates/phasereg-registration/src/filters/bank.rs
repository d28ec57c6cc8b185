//! Multi-channel convolution of a volume with a set of quadrature filters.

use burn::tensor::backend::Backend;
use burn::tensor::module::conv3d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor, TensorData};
use phasereg_core::image::tensor_to_vec;
use phasereg_core::Image;
use crate::error::{RegistrationError, Result};
use super::kernel::QuadratureFilter;

/// How samples outside the volume are treated during filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Samples outside the grid are zero.
    ZeroExtension,
}

/// Boundary rule used by every filter on every call.
pub const BOUNDARY_POLICY: BoundaryPolicy = BoundaryPolicy::ZeroExtension;

/// Complex response of one filter on one volume, x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResponse {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl FilterResponse {
    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    pub fn magnitude(&self, index: usize) -> f32 {
        self.real[index].hypot(self.imag[index])
    }
}

/// A fixed set of quadrature filters uploaded once as a single
/// `[2K, 1, k, k, k]` convolution weight (real, imaginary per filter).
#[derive(Debug, Clone)]
pub struct QuadratureFilterBank<B: Backend> {
    weight: Tensor<B, 5>,
    filters: usize,
    size: usize,
}

impl<B: Backend> QuadratureFilterBank<B> {
    pub fn new(filters: &[QuadratureFilter], device: &B::Device) -> Result<Self> {
        let size = filters
            .first()
            .map(|f| f.size())
            .ok_or_else(|| RegistrationError::configuration("filter bank needs at least one filter"))?;
        if filters.iter().any(|f| f.size() != size) {
            return Err(RegistrationError::configuration("filters in a bank must share one size"));
        }

        let count = size * size * size;
        let mut coefficients: Vec<f32> = Vec::with_capacity(2 * filters.len() * count);
        for filter in filters {
            // Reversing the flat kernel mirrors it about its centre, turning
            // the backend's cross-correlation into a convolution.
            coefficients.extend(filter.real().iter().rev().copied());
            coefficients.extend(filter.imag().iter().rev().copied());
        }
        let weight = Tensor::<B, 1>::from_data(
            TensorData::new(coefficients, Shape::new([2 * filters.len() * count])),
            device,
        )
        .reshape([2 * filters.len(), 1, size, size, size]);

        Ok(Self {
            weight,
            filters: filters.len(),
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters == 0
    }

    pub fn kernel_size(&self) -> usize {
        self.size
    }

    /// Filter `image`, returning one response per filter in filter order.
    pub fn apply(&self, image: &Image<B>) -> Result<Vec<FilterResponse>> {
        let [nz, ny, nx] = image.shape();
        let voxels = nx * ny * nz;
        let r = (self.size - 1) / 2;

        let padding = match BOUNDARY_POLICY {
            BoundaryPolicy::ZeroExtension => [r, r, r],
        };
        let options = ConvOptions::new([1, 1, 1], padding, [1, 1, 1], 1);
        let input = image.data().clone().reshape([1, 1, nz, ny, nx]);
        let output = conv3d(input, self.weight.clone(), None, options);

        let values = tensor_to_vec(output)?;
        if values.len() != 2 * self.filters * voxels {
            return Err(RegistrationError::device(format!(
                "filter output has {} values, expected {}",
                values.len(),
                2 * self.filters * voxels
            )));
        }

        Ok(values
            .chunks_exact(2 * voxels)
            .map(|pair| FilterResponse {
                real: pair[..voxels].to_vec(),
                imag: pair[voxels..].to_vec(),
            })
            .collect())
    }
}
