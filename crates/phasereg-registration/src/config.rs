//! Run configuration and output selection.

use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::validation::{
    validate_iterations, validate_lanes, validate_non_negative_finite, validate_positive_finite,
    validate_scale,
};

/// Parameters of a registration run.
///
/// All values are validated by [`RegistrationConfig::validate`] before any
/// work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Affine iterations per scale level.
    pub iterations_linear: usize,
    /// Non-linear iterations.
    pub iterations_nonlinear: usize,
    /// Millimetres removed from the low-z end of the source before resampling.
    pub z_crop_mm: f64,
    /// Gaussian sigma (mm) applied to the displacement field each iteration.
    pub smoothing_sigma: f64,
    pub platform_index: usize,
    pub device_index: usize,
    /// Worker threads for host kernels; `None` uses every core.
    pub lanes: Option<usize>,
    /// Shrink factor of the coarsest affine level: 1, 2, 4 or 8.
    pub coarsest_scale: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            iterations_linear: 10,
            iterations_nonlinear: 10,
            z_crop_mm: 0.0,
            smoothing_sigma: 5.0,
            platform_index: 0,
            device_index: 0,
            lanes: None,
            coarsest_scale: 1,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations_linear(mut self, n: usize) -> Self {
        self.iterations_linear = n;
        self
    }

    pub fn with_iterations_nonlinear(mut self, n: usize) -> Self {
        self.iterations_nonlinear = n;
        self
    }

    pub fn with_z_crop_mm(mut self, mm: f64) -> Self {
        self.z_crop_mm = mm;
        self
    }

    pub fn with_smoothing_sigma(mut self, sigma_mm: f64) -> Self {
        self.smoothing_sigma = sigma_mm;
        self
    }

    pub fn with_platform(mut self, platform_index: usize, device_index: usize) -> Self {
        self.platform_index = platform_index;
        self.device_index = device_index;
        self
    }

    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = Some(lanes);
        self
    }

    pub fn with_coarsest_scale(mut self, scale: usize) -> Self {
        self.coarsest_scale = scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_iterations(self.iterations_linear, "iterations_linear")?;
        validate_iterations(self.iterations_nonlinear, "iterations_nonlinear")?;
        validate_non_negative_finite(self.z_crop_mm, "z_crop_mm")?;
        validate_positive_finite(self.smoothing_sigma, "smoothing_sigma")?;
        validate_lanes(self.lanes)?;
        validate_scale(self.coarsest_scale)
    }

    /// Pyramid levels used by the affine stage.
    pub fn scale_levels(&self) -> usize {
        self.coarsest_scale.max(1).trailing_zeros() as usize + 1
    }

    /// Total affine iterations across all levels.
    pub fn total_affine_iterations(&self) -> usize {
        self.iterations_linear * self.scale_levels()
    }
}

/// Which optional outputs a run returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputLevel {
    /// Only the non-linearly warped source.
    #[default]
    Minimal,
    /// Adds the affine-warped source, the affine matrix and parameters.
    Affine,
    /// Adds the resampled source, the reference and the displacement field.
    Full,
}

impl OutputLevel {
    pub fn includes_affine(self) -> bool {
        self >= OutputLevel::Affine
    }

    pub fn includes_full(self) -> bool {
        self >= OutputLevel::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegistrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iterations_linear, 10);
        assert_eq!(config.smoothing_sigma, 5.0);
        assert_eq!(config.scale_levels(), 1);
    }

    #[test]
    fn test_builder_and_validation() {
        let config = RegistrationConfig::new().with_iterations_linear(0);
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);

        let config = RegistrationConfig::new().with_z_crop_mm(-1.0);
        assert!(config.validate().is_err());

        let config = RegistrationConfig::new().with_smoothing_sigma(0.0);
        assert!(config.validate().is_err());

        let config = RegistrationConfig::new().with_coarsest_scale(4).with_iterations_linear(3);
        assert!(config.validate().is_ok());
        assert_eq!(config.scale_levels(), 3);
        assert_eq!(config.total_affine_iterations(), 9);
    }

    #[test]
    fn test_output_level_ordering() {
        assert!(!OutputLevel::Minimal.includes_affine());
        assert!(OutputLevel::Affine.includes_affine());
        assert!(!OutputLevel::Affine.includes_full());
        assert!(OutputLevel::Full.includes_affine() && OutputLevel::Full.includes_full());
    }
}
