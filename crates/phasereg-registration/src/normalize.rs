//! Bringing the source onto the reference grid: crop, resample, rescale.

use burn::tensor::backend::Backend;
use phasereg_core::filter::ResampleImageFilter;
use phasereg_core::interpolation::LinearInterpolator;
use phasereg_core::transform::AffineTransform;
use phasereg_core::{Image, Spacing, Volume};
use crate::error::{RegistrationError, Result};
use crate::validation::validate_non_negative_finite;

/// Remove `round(z_crop_mm / voxel_z)` slices from the low-z end.
pub fn crop_z(volume: &Volume, z_crop_mm: f64) -> Result<Volume> {
    validate_non_negative_finite(z_crop_mm, "z_crop_mm")?;
    let [nx, ny, nz] = volume.dims();
    let voxel = volume.voxel_size().to_array();

    if z_crop_mm > volume.extent()[2] {
        return Err(RegistrationError::shape(format!(
            "z crop of {z_crop_mm} mm exceeds the volume's z extent of {} mm",
            volume.extent()[2]
        )));
    }
    let slices = (z_crop_mm / voxel[2]).round() as usize;
    if slices == 0 {
        return Ok(volume.clone());
    }
    if slices >= nz {
        return Err(RegistrationError::shape(format!(
            "z crop of {z_crop_mm} mm removes all {nz} slices"
        )));
    }

    tracing::debug!("Cropping {} of {} z slices", slices, nz);
    let kept = volume.samples()[slices * nx * ny..].to_vec();
    Ok(Volume::new(kept, [nx, ny, nz - slices], voxel)?)
}

/// Center-aligned trilinear resampling onto a `dims` grid with `voxel_size`.
/// Points outside the input take the value 0.
pub fn resample_to_grid<B: Backend>(
    volume: &Volume,
    dims: [usize; 3],
    voxel_size: [f64; 3],
    device: &B::Device,
) -> Result<Volume> {
    let spacing = Spacing::new(voxel_size);
    if !spacing.is_valid() {
        return Err(RegistrationError::configuration(format!(
            "target voxel size {voxel_size:?} must be positive and finite"
        )));
    }
    if dims == volume.dims() && spacing == *volume.voxel_size() {
        return Ok(volume.clone());
    }

    let input = volume.to_image::<B>(device);
    let filter = ResampleImageFilter::new(
        [dims[2], dims[1], dims[0]],
        Image::<B>::centered_origin(dims, &spacing),
        spacing,
        AffineTransform::identity(device),
        LinearInterpolator::with_fill(0.0),
    );
    Ok(Volume::from_image(&filter.apply(&input))?)
}

/// Scale `source` so that its maximum equals the maximum of `reference`.
///
/// Left unchanged when either maximum is not positive.
pub fn rescale_intensity(source: &Volume, reference: &Volume) -> Result<Volume> {
    let source_max = source.max();
    let reference_max = reference.max();
    if !(source_max > 0.0) || !(reference_max > 0.0) {
        tracing::warn!(
            "Skipping intensity rescale: source max {}, reference max {}",
            source_max,
            reference_max
        );
        return Ok(source.clone());
    }

    let factor = reference_max / source_max;
    let samples = source.samples().iter().map(|&v| v * factor).collect();
    Ok(Volume::new(samples, source.dims(), source.voxel_size().to_array())?)
}

/// Crop, resample onto the reference grid, then rescale.
pub fn normalize<B: Backend>(
    source: &Volume,
    reference: &Volume,
    z_crop_mm: f64,
    device: &B::Device,
) -> Result<Volume> {
    let cropped = crop_z(source, z_crop_mm)?;
    let resampled = resample_to_grid::<B>(
        &cropped,
        reference.dims(),
        reference.voxel_size().to_array(),
        device,
    )?;
    rescale_intensity(&resampled, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use burn_ndarray::NdArray;
    use proptest::prelude::*;

    type TestBackend = NdArray<f32>;

    fn ramp(dims: [usize; 3], voxel: [f64; 3]) -> Volume {
        Volume::from_fn(dims, voxel, |x, y, z| (x + 2 * y + 3 * z) as f32).unwrap()
    }

    #[test]
    fn test_crop_z_removes_low_slices() {
        let v = ramp([4, 3, 10], [1.0, 1.0, 2.0]);
        let cropped = crop_z(&v, 5.0).unwrap();
        // round(5 / 2) = 3 slices
        assert_eq!(cropped.dims(), [4, 3, 7]);
        assert_eq!(cropped.get(1, 1, 0), v.get(1, 1, 3));

        assert_eq!(crop_z(&v, 0.0).unwrap(), v);
    }

    #[test]
    fn test_crop_z_rejections() {
        let v = ramp([4, 3, 10], [1.0, 1.0, 2.0]);
        assert_eq!(crop_z(&v, 19.0).unwrap_err().kind(), ErrorKind::Shape);
        assert_eq!(crop_z(&v, 25.0).unwrap_err().kind(), ErrorKind::Shape);
        assert_eq!(crop_z(&v, -1.0).unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(crop_z(&v, f64::NAN).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_resample_onto_own_grid_is_noop() {
        let device = Default::default();
        let v = ramp([6, 5, 4], [1.0, 2.0, 1.5]);
        let out = resample_to_grid::<TestBackend>(&v, v.dims(), [1.0, 2.0, 1.5], &device).unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn test_resample_through_interpolation_keeps_samples() {
        let device = Default::default();
        let v = ramp([6, 5, 4], [1.0, 2.0, 1.5]);
        // Not bitwise the source grid, so the interpolating path runs.
        let voxel = [1.0, 2.0, 1.5].map(|s: f64| s * (1.0 - 1e-7));
        let out = resample_to_grid::<TestBackend>(&v, v.dims(), voxel, &device).unwrap();

        assert_eq!(out.dims(), v.dims());
        assert_eq!(out.voxel_size().to_array(), voxel);
        for (a, b) in out.samples().iter().zip(v.samples()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_resample_to_finer_grid_is_center_aligned() {
        let device = Default::default();
        let v = Volume::from_fn([4, 4, 4], [2.0; 3], |x, _, _| x as f32).unwrap();
        let out = resample_to_grid::<TestBackend>(&v, [7, 7, 7], [1.0; 3], &device).unwrap();

        // Centres coincide: output voxel 3 sits on input index 1.5.
        assert!((out.get(3, 3, 3) - 1.5).abs() < 1e-5);
        // Output voxel 0 is at -3 mm, input index 0 at -3 mm.
        assert!(out.get(0, 3, 3).abs() < 1e-5);
    }

    #[test]
    fn test_resample_outside_fov_is_zero() {
        let device = Default::default();
        let v = Volume::from_fn([4, 4, 4], [1.0; 3], |_, _, _| 5.0).unwrap();
        let out = resample_to_grid::<TestBackend>(&v, [10, 4, 4], [1.0; 3], &device).unwrap();
        assert_eq!(out.get(0, 1, 1), 0.0);
        assert_eq!(out.get(9, 1, 1), 0.0);
        assert!((out.get(5, 1, 1) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_rescale_intensity() {
        let source = Volume::from_fn([2, 2, 2], [1.0; 3], |x, _, _| x as f32 * 2.0).unwrap();
        let reference = Volume::from_fn([2, 2, 2], [1.0; 3], |_, y, _| y as f32 * 10.0).unwrap();
        let out = rescale_intensity(&source, &reference).unwrap();
        assert_eq!(out.max(), 10.0);

        let dark = Volume::zeros([2, 2, 2], [1.0; 3]).unwrap();
        assert_eq!(rescale_intensity(&dark, &reference).unwrap(), dark);
    }

    #[test]
    fn test_normalize_matches_reference_grid() {
        let device = Default::default();
        let source = ramp([10, 10, 12], [1.0, 1.0, 1.0]);
        let reference = Volume::from_fn([5, 5, 5], [2.0; 3], |_, _, _| 100.0).unwrap();
        let out = normalize::<TestBackend>(&source, &reference, 2.0, &device).unwrap();
        assert_eq!(out.dims(), [5, 5, 5]);
        assert_eq!(out.voxel_size().to_array(), [2.0; 3]);
        assert!((out.max() - 100.0).abs() < 1e-3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_crop_z_keeps_high_slices(nz in 2usize..12, vz in 0.5f64..3.0, fraction in 0.0f64..1.0) {
            let v = ramp([3, 2, nz], [1.0, 1.0, vz]);
            let crop = fraction * (nz - 1) as f64 * vz;
            let removed = (crop / vz).round() as usize;

            let cropped = crop_z(&v, crop).unwrap();
            prop_assert_eq!(cropped.dims(), [3, 2, nz - removed]);
            prop_assert_eq!(cropped.get(2, 1, 0), v.get(2, 1, removed));
        }
    }
}
