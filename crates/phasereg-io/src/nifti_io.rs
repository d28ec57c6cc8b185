use anyhow::{bail, Context, Result};
use ndarray::{Array3, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use phasereg_core::Volume;
use std::path::Path;

/// NIfTI `xyzt_units` code for millimetres.
const UNITS_MM: u8 = 2;

/// Read a 3-D NIfTI file into a host volume.
///
/// The voxel size is taken from `pixdim[1..4]`; a file without a usable
/// voxel size is rejected rather than assumed isotropic.
pub fn read_nifti<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let header = obj.header();
    let voxel_size = voxel_size_from_header(header);

    let array = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert NIfTI volume to an array")?;
    if array.ndim() != 3 {
        bail!("Expected a 3-D NIfTI volume, found {} dimensions", array.ndim());
    }
    let array = array
        .into_dimensionality::<Ix3>()
        .context("Failed to view NIfTI volume as 3-D")?;

    let (nx, ny, nz) = array.dim();
    let mut samples = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                samples.push(array[[x, y, z]]);
            }
        }
    }

    tracing::debug!("Read {} with grid {:?} and voxel size {:?}", path.display(), [nx, ny, nz], voxel_size);
    Volume::from_parts(samples, [nx, ny, nz], voxel_size)
        .with_context(|| format!("Invalid volume in {}", path.display()))
}

fn voxel_size_from_header(header: &NiftiHeader) -> Option<[f64; 3]> {
    let size = [
        header.pixdim[1].abs() as f64,
        header.pixdim[2].abs() as f64,
        header.pixdim[3].abs() as f64,
    ];
    size.iter().all(|&v| v.is_finite() && v > 0.0).then_some(size)
}

/// Write a volume to a NIfTI file, recording its voxel size in millimetres.
pub fn write_nifti<P: AsRef<Path>>(path: P, volume: &Volume) -> Result<()> {
    let path = path.as_ref();
    let [nx, ny, nz] = volume.dims();
    let array = Array3::from_shape_fn((nx, ny, nz), |(x, y, z)| volume.get(x, y, z));

    let voxel = volume.voxel_size().to_array();
    let header = NiftiHeader {
        pixdim: [1.0, voxel[0] as f32, voxel[1] as f32, voxel[2] as f32, 1.0, 1.0, 1.0, 1.0],
        xyzt_units: UNITS_MM,
        ..NiftiHeader::default()
    };

    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&array)
        .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;
    Ok(())
}
