//! Error type for volume construction and conversion.

use thiserror::Error;

/// Errors raised while building or converting a [`Volume`](crate::image::Volume).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolumeError {
    /// No voxel size was supplied with the samples.
    #[error("volume has no voxel size")]
    MissingVoxelSize,

    /// A voxel size component is zero, negative or not finite.
    #[error("invalid voxel size {0:?}: every component must be finite and > 0")]
    InvalidVoxelSize([f64; 3]),

    /// The number of samples does not match the grid shape.
    #[error("expected {expected} samples for grid {dims:?}, got {actual}")]
    SampleCount {
        dims: [usize; 3],
        expected: usize,
        actual: usize,
    },

    /// One of the grid dimensions is zero.
    #[error("grid {0:?} has an empty axis")]
    EmptyGrid([usize; 3]),

    /// Tensor data could not be read back as `f32`.
    #[error("tensor data conversion failed: {0}")]
    TensorData(String),
}
