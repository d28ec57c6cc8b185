//! Host-side scalar volume.

use burn::tensor::{Shape, Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::error::VolumeError;
use crate::spatial::Spacing;
use super::Image;

/// A 3-D scalar volume held in host memory.
///
/// Samples are stored x fastest, then y, then z, so the sample at
/// `(x, y, z)` lives at `x + y·nx + z·nx·ny`. Grid dimensions are `(nx, ny, nz)`
/// and voxel size is in millimetres in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    samples: Vec<f32>,
    dims: [usize; 3],
    voxel_size: Spacing<3>,
}

impl Volume {
    /// Build a volume, validating shape and voxel size.
    pub fn new(samples: Vec<f32>, dims: [usize; 3], voxel_size: [f64; 3]) -> Result<Self, VolumeError> {
        if dims.iter().any(|&n| n == 0) {
            return Err(VolumeError::EmptyGrid(dims));
        }
        let expected = dims[0] * dims[1] * dims[2];
        if samples.len() != expected {
            return Err(VolumeError::SampleCount {
                dims,
                expected,
                actual: samples.len(),
            });
        }
        let voxel_size = Spacing::new(voxel_size);
        if !voxel_size.is_valid() {
            return Err(VolumeError::InvalidVoxelSize(voxel_size.to_array()));
        }
        Ok(Self { samples, dims, voxel_size })
    }

    /// Like [`Volume::new`] but for sources where the voxel size may be absent.
    pub fn from_parts(
        samples: Vec<f32>,
        dims: [usize; 3],
        voxel_size: Option<[f64; 3]>,
    ) -> Result<Self, VolumeError> {
        let voxel_size = voxel_size.ok_or(VolumeError::MissingVoxelSize)?;
        Self::new(samples, dims, voxel_size)
    }

    /// Volume whose sample at `(x, y, z)` is `f(x, y, z)`.
    pub fn from_fn<F>(dims: [usize; 3], voxel_size: [f64; 3], f: F) -> Result<Self, VolumeError>
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let [nx, ny, nz] = dims;
        let mut samples = Vec::with_capacity(nx * ny * nz);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    samples.push(f(x, y, z));
                }
            }
        }
        Self::new(samples, dims, voxel_size)
    }

    pub fn zeros(dims: [usize; 3], voxel_size: [f64; 3]) -> Result<Self, VolumeError> {
        Self::new(vec![0.0; dims.iter().product()], dims, voxel_size)
    }

    /// Grid size `(nx, ny, nz)`.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn voxel_size(&self) -> &Spacing<3> {
        &self.voxel_size
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: a volume has at least one voxel.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.linear_index(x, y, z)]
    }

    pub fn max(&self) -> f32 {
        self.samples.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Physical extent `n · voxel_size` per axis.
    pub fn extent(&self) -> [f64; 3] {
        [
            self.dims[0] as f64 * self.voxel_size[0],
            self.dims[1] as f64 * self.voxel_size[1],
            self.dims[2] as f64 * self.voxel_size[2],
        ]
    }

    /// Upload to a backend as a center-aligned [`Image`].
    pub fn to_image<B: Backend>(&self, device: &B::Device) -> Image<B> {
        let [nx, ny, nz] = self.dims;
        let data = Tensor::<B, 1>::from_data(
            TensorData::new(self.samples.clone(), Shape::new([self.samples.len()])),
            device,
        )
        .reshape([nz, ny, nx]);
        Image::centered(data, self.voxel_size)
    }

    /// Read an image back into host memory.
    pub fn from_image<B: Backend>(image: &Image<B>) -> Result<Self, VolumeError> {
        let samples = tensor_to_vec(image.data().clone())?;
        Self::new(samples, image.size(), image.spacing().to_array())
    }
}

/// Read any tensor back to the host as a flat `f32` vector.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, VolumeError> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| VolumeError::TensorData(format!("{e:?}")))
}
