//! Values handed back to the caller after a run.

use std::time::Duration;
use nalgebra::Matrix4;
use phasereg_core::transform::AffineParameters;
use phasereg_core::Volume;

/// Displacement field components in millimetres on the reference grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementVolume {
    pub x: Volume,
    pub y: Volume,
    pub z: Volume,
}

impl DisplacementVolume {
    /// Largest displacement length over all voxels.
    pub fn max_magnitude(&self) -> f32 {
        self.x
            .samples()
            .iter()
            .zip(self.y.samples())
            .zip(self.z.samples())
            .map(|((x, y), z)| (x * x + y * y + z * z).sqrt())
            .fold(0.0, f32::max)
    }

    pub fn components(&self) -> [&Volume; 3] {
        [&self.x, &self.y, &self.z]
    }
}

/// Outcome of a registration run. Optional fields are present according to
/// the requested [`OutputLevel`](crate::config::OutputLevel).
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Source warped through the affine and the displacement field.
    pub nonlinear_warped: Volume,
    /// Source warped through the affine only.
    pub affine_warped: Option<Volume>,
    /// Affine in millimetres, centred on the reference grid.
    pub affine_matrix: Option<Matrix4<f64>>,
    /// Affine in voxels of the reference grid.
    pub affine_parameters: Option<AffineParameters>,
    /// Source after crop, resampling and rescaling.
    pub resampled_source: Option<Volume>,
    pub reference: Option<Volume>,
    pub displacement: Option<DisplacementVolume>,
    /// Wall time of the run.
    pub elapsed: Duration,
}
