//! NIfTI input and output for phasereg.

pub mod nifti_io;
pub mod loader;

pub use nifti_io::{read_nifti, write_nifti};
pub use loader::{write_registration_result, NiftiVolumeLoader};
