//! Validation helpers for configuration values and inputs.

use phasereg_core::Volume;
use crate::error::{RegistrationError, Result};

/// Scale factors accepted for the coarsest pyramid level.
pub const SUPPORTED_SCALES: [usize; 4] = [1, 2, 4, 8];

pub fn validate_iterations(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        return Err(RegistrationError::configuration(format!("{name} must be > 0")));
    }
    Ok(())
}

pub fn validate_positive_finite(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RegistrationError::configuration(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_non_negative_finite(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RegistrationError::configuration(format!(
            "{name} must be finite and >= 0, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_lanes(lanes: Option<usize>) -> Result<()> {
    match lanes {
        Some(0) => Err(RegistrationError::configuration("lanes must be > 0")),
        _ => Ok(()),
    }
}

pub fn validate_scale(scale: usize) -> Result<()> {
    if !SUPPORTED_SCALES.contains(&scale) {
        return Err(RegistrationError::configuration(format!(
            "coarsest_scale must be one of {SUPPORTED_SCALES:?}, got {scale}"
        )));
    }
    Ok(())
}

/// Check that a volume is large enough to be filtered with `kernel_size`.
///
/// Each axis needs more voxels than the excluded border on both sides.
pub fn validate_volume_for_kernel(volume: &Volume, kernel_size: usize, name: &str) -> Result<()> {
    validate_grid_for_kernel(volume.dims(), kernel_size, name)
}

/// Same check on a bare `(nx, ny, nz)` grid size.
pub fn validate_grid_for_kernel(dims: [usize; 3], kernel_size: usize, name: &str) -> Result<()> {
    let margin = (kernel_size.saturating_sub(1)) / 2;
    if dims.iter().any(|&n| n <= 2 * margin) {
        return Err(RegistrationError::shape(format!(
            "{name} grid {dims:?} is too small for filters of size {kernel_size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_iterations() {
        assert!(validate_iterations(1, "iterations_linear").is_ok());
        let err = validate_iterations(0, "iterations_linear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("iterations_linear"));
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_positive_finite(5.0, "sigma").is_ok());
        assert!(validate_positive_finite(0.0, "sigma").is_err());
        assert!(validate_positive_finite(f64::NAN, "sigma").is_err());
        assert!(validate_non_negative_finite(0.0, "crop").is_ok());
        assert!(validate_non_negative_finite(-1.0, "crop").is_err());
        assert!(validate_non_negative_finite(f64::INFINITY, "crop").is_err());
    }

    #[test]
    fn test_validate_scale_and_lanes() {
        for s in SUPPORTED_SCALES {
            assert!(validate_scale(s).is_ok());
        }
        assert!(validate_scale(3).is_err());
        assert!(validate_lanes(None).is_ok());
        assert!(validate_lanes(Some(4)).is_ok());
        assert!(validate_lanes(Some(0)).is_err());
    }

    #[test]
    fn test_validate_volume_for_kernel() {
        let small = Volume::zeros([6, 6, 6], [1.0; 3]).unwrap();
        assert_eq!(validate_volume_for_kernel(&small, 7, "reference").unwrap_err().kind(), ErrorKind::Shape);
        let ok = Volume::zeros([7, 8, 9], [1.0; 3]).unwrap();
        assert!(validate_volume_for_kernel(&ok, 7, "reference").is_ok());
    }
}
