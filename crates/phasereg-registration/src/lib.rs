//! Phase-based affine and non-linear registration of 3-D volumes.
//!
//! A source volume is resampled onto the reference grid, aligned with a
//! twelve-parameter affine estimated from quadrature-filter phase
//! differences, then refined with a dense, Gaussian-regularised
//! displacement field.
//!
//! ```no_run
//! use phasereg_core::Volume;
//! use phasereg_registration::{register, FilterSets, OutputLevel, RegistrationConfig, RegistrationInputs};
//!
//! # fn main() -> phasereg_registration::Result<()> {
//! let source = Volume::zeros([64, 64, 64], [2.0; 3])?;
//! let reference = Volume::zeros([64, 64, 64], [2.0; 3])?;
//! let inputs = RegistrationInputs::new(source, reference);
//!
//! let config = RegistrationConfig::default().with_lanes(4);
//! let result = register(&inputs, &FilterSets::standard()?, &config, OutputLevel::Affine)?;
//! println!("affine: {:?}", result.affine_matrix);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod validation;
pub mod config;
pub mod progress;
pub mod compute;
pub mod filters;
pub mod phase;
pub mod normalize;
pub mod linear;
pub mod nonlinear;
pub mod engine;
pub mod result;
pub mod api;

pub use error::{ErrorKind, RegistrationError, Result, Stage, StageContext};
pub use config::{OutputLevel, RegistrationConfig};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo};
pub use compute::{available_platforms, ComputeContext, DeviceSelection, PlatformInfo};
pub use filters::{FilterDesign, FilterSets, LinearFilterSet, NonlinearFilterSet, QuadratureFilter};
pub use engine::{FailureReason, RegistrationEngine, RegistrationState};
pub use result::{DisplacementVolume, RegistrationResult};
pub use api::{register, register_with_progress, FilterSetLoader, RegistrationInputs, VolumeLoader};
