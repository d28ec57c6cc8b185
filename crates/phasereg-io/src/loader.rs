//! Collaborators that plug NIfTI files into a registration run.

use anyhow::Result;
use phasereg_core::Volume;
use phasereg_registration::{RegistrationError, RegistrationResult, VolumeLoader};
use std::path::{Path, PathBuf};
use crate::nifti_io::{read_nifti, write_nifti};

/// Loads one volume from a NIfTI file when asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiftiVolumeLoader {
    path: PathBuf,
}

impl NiftiVolumeLoader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VolumeLoader for NiftiVolumeLoader {
    fn load(&self) -> phasereg_registration::Result<Volume> {
        read_nifti(&self.path).map_err(|e| RegistrationError::load(format!("{e:#}")))
    }
}

/// Write every output present in `result` to `dir` as `<stem>_<name>.nii`.
///
/// Returns the written paths in a fixed order: non-linear warp, affine warp,
/// resampled source, reference, then the x, y and z displacement.
pub fn write_registration_result(dir: &Path, stem: &str, result: &RegistrationResult) -> Result<Vec<PathBuf>> {
    let mut outputs: Vec<(&str, &Volume)> = vec![("nonlinear", &result.nonlinear_warped)];
    if let Some(v) = &result.affine_warped {
        outputs.push(("affine", v));
    }
    if let Some(v) = &result.resampled_source {
        outputs.push(("resampled", v));
    }
    if let Some(v) = &result.reference {
        outputs.push(("reference", v));
    }
    if let Some(field) = &result.displacement {
        outputs.push(("displacement_x", &field.x));
        outputs.push(("displacement_y", &field.y));
        outputs.push(("displacement_z", &field.z));
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (name, volume) in outputs {
        let path = dir.join(format!("{stem}_{name}.nii"));
        write_nifti(&path, volume)?;
        written.push(path);
    }
    tracing::info!("Wrote {} output volume(s) to {}", written.len(), dir.display());
    Ok(written)
}
