//! Error types for registration runs.
//!
//! Every failure aborts the run. Errors raised inside a pipeline stage are
//! wrapped in [`RegistrationError::Stage`] so callers can tell where it
//! happened as well as what went wrong.

use phasereg_core::VolumeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    DeviceSetup,
    Resample,
    AffineSolve,
    NonlinearSolve,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::DeviceSetup => "device setup",
            Stage::Resample => "resample",
            Stage::AffineSolve => "affine solve",
            Stage::NonlinearSolve => "non-linear solve",
        };
        f.write_str(name)
    }
}

/// Error category, independent of the stage it was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Load,
    Shape,
    Device,
    Numeric,
}

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid parameter or missing input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator could not supply a volume or filter set.
    #[error("Load error: {0}")]
    Load(String),

    /// Dimensions, sample counts or crops that cannot be honoured.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Unknown platform or device, or device initialisation failure.
    #[error("Device error: {0}")]
    Device(String),

    /// Singular systems, non-finite updates or empty certainty.
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// An error raised while running `stage`.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<RegistrationError>,
    },
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    pub fn numeric(msg: impl Into<String>) -> Self {
        Self::Numeric(msg.into())
    }

    /// Attach `stage` unless the error already carries one.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Load(_) => ErrorKind::Load,
            Self::Shape(_) => ErrorKind::Shape,
            Self::Device(_) => ErrorKind::Device,
            Self::Numeric(_) => ErrorKind::Numeric,
            Self::Stage { source, .. } => source.kind(),
        }
    }
}

impl From<VolumeError> for RegistrationError {
    fn from(err: VolumeError) -> Self {
        match err {
            VolumeError::MissingVoxelSize | VolumeError::InvalidVoxelSize(_) => {
                Self::Configuration(err.to_string())
            }
            VolumeError::SampleCount { .. } | VolumeError::EmptyGrid(_) => Self::Shape(err.to_string()),
            VolumeError::TensorData(_) => Self::Device(err.to_string()),
        }
    }
}

/// Extension for tagging results with the stage they came from.
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}
