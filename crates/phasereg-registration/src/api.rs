//! Public entry points and collaborator boundaries.

use burn_ndarray::NdArray;
use phasereg_core::Volume;
use crate::compute::{ComputeContext, ComputeDevice, DeviceSelection};
use crate::config::{OutputLevel, RegistrationConfig};
use crate::engine::RegistrationEngine;
use crate::error::{Result, Stage, StageContext};
use crate::filters::{FilterDesign, FilterSets, LinearFilterSet, NonlinearFilterSet};
use crate::progress::ProgressCallback;
use crate::result::RegistrationResult;

/// Supplies a volume, for example by reading a file.
///
/// Implementations report failures as [`RegistrationError::Load`](crate::RegistrationError::Load).
pub trait VolumeLoader {
    fn load(&self) -> Result<Volume>;
}

/// Supplies the filter sets of a run.
pub trait FilterSetLoader {
    fn load(&self) -> Result<FilterSets>;
}

impl VolumeLoader for Volume {
    fn load(&self) -> Result<Volume> {
        Ok(self.clone())
    }
}

impl FilterSetLoader for FilterSets {
    fn load(&self) -> Result<FilterSets> {
        Ok(self.clone())
    }
}

/// Builds both sets from a design, with constraints derived from the
/// filter directions.
impl FilterSetLoader for FilterDesign {
    fn load(&self) -> Result<FilterSets> {
        Ok(FilterSets::new(
            LinearFilterSet::new(self.linear_set()?, None)?,
            NonlinearFilterSet::new(self.nonlinear_set()?)?,
        ))
    }
}

/// The two volumes of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationInputs {
    /// Volume to be aligned.
    pub source: Volume,
    /// Volume defining the target grid.
    pub reference: Volume,
}

impl RegistrationInputs {
    pub fn new(source: Volume, reference: Volume) -> Self {
        Self { source, reference }
    }

    pub fn load(source: &dyn VolumeLoader, reference: &dyn VolumeLoader) -> Result<Self> {
        Ok(Self::new(source.load()?, reference.load()?))
    }
}

/// Register `inputs.source` onto `inputs.reference`.
///
/// Runs device setup, resampling, the affine stage and the non-linear stage
/// on the platform and device named in `config`, inside a dedicated worker
/// pool of `config.lanes` threads.
pub fn register(
    inputs: &RegistrationInputs,
    filters: &FilterSets,
    config: &RegistrationConfig,
    output_level: OutputLevel,
) -> Result<RegistrationResult> {
    register_with_progress(inputs, filters, config, output_level, None)
}

/// [`register`] with a progress observer.
pub fn register_with_progress(
    inputs: &RegistrationInputs,
    filters: &FilterSets,
    config: &RegistrationConfig,
    output_level: OutputLevel,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RegistrationResult> {
    let context = config
        .validate()
        .and_then(|()| {
            let selection = DeviceSelection::new(config.platform_index, config.device_index);
            ComputeContext::open(selection, config.lanes)
        })
        .in_stage(Stage::DeviceSetup);
    let context = match context {
        Ok(context) => context,
        Err(error) => {
            tracing::error!("Registration could not start: {}", error);
            if let Some(progress) = progress {
                progress.on_error(&error);
            }
            return Err(error);
        }
    };

    tracing::info!(
        "Registering {:?} onto {:?} with {} lanes",
        inputs.source.dims(),
        inputs.reference.dims(),
        context.lanes()
    );
    context.install(|| match context.device() {
        ComputeDevice::Host(device) => {
            run::<NdArray<f32>>(inputs, filters, config, output_level, device.clone(), progress)
        }
        #[cfg(feature = "wgpu")]
        ComputeDevice::Wgpu(device) => {
            run::<burn::backend::Wgpu>(inputs, filters, config, output_level, device.clone(), progress)
        }
    })
}

fn run<B: burn::tensor::backend::Backend>(
    inputs: &RegistrationInputs,
    filters: &FilterSets,
    config: &RegistrationConfig,
    output_level: OutputLevel,
    device: B::Device,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RegistrationResult> {
    let mut engine = RegistrationEngine::<B>::new(inputs, filters, config.clone(), output_level, device)?;
    if let Some(progress) = progress {
        engine = engine.with_progress(progress);
    }
    engine.run()
}
