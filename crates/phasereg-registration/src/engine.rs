//! The registration state machine.
//!
//! ```text
//! Resample ─► AffineIterate(0) ─► … ─► AffineIterate(L·n - 1)
//!          ─► NonlinearIterate(0) ─► … ─► NonlinearIterate(m - 1) ─► Done
//! ```
//!
//! Any error moves the engine to `Failed` and is returned tagged with the
//! stage it happened in. Each call to [`RegistrationEngine::step`] performs
//! exactly one transition, so callers can inspect the estimate between
//! iterations.

use std::time::Instant;
use burn::tensor::backend::Backend;
use nalgebra::Matrix4;
use phasereg_core::filter::ScalePyramid;
use phasereg_core::transform::AffineParameters;
use phasereg_core::Volume;
use crate::api::RegistrationInputs;
use crate::config::{OutputLevel, RegistrationConfig};
use crate::error::{ErrorKind, RegistrationError, Result, Stage, StageContext};
use crate::filters::{FilterResponse, FilterSets};
use crate::linear::AffineSolver;
use crate::nonlinear::{field_to_host, DisplacementSolver, DisplacementState};
use crate::normalize::normalize;
use crate::progress::{ProgressCallback, ProgressInfo};
use crate::result::{DisplacementVolume, RegistrationResult};
use crate::validation::{validate_grid_for_kernel, validate_volume_for_kernel};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureReason {
    fn from_error(stage: Stage, error: &RegistrationError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Rebuild an error of the recorded kind.
    pub fn to_error(&self) -> RegistrationError {
        let message = self.message.clone();
        let error = match self.kind {
            ErrorKind::Configuration => RegistrationError::Configuration(message),
            ErrorKind::Load => RegistrationError::Load(message),
            ErrorKind::Shape => RegistrationError::Shape(message),
            ErrorKind::Device => RegistrationError::Device(message),
            ErrorKind::Numeric => RegistrationError::Numeric(message),
        };
        error.in_stage(self.stage)
    }
}

/// Position of the engine in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Resample,
    /// Global affine iteration index across all scale levels.
    AffineIterate(usize),
    NonlinearIterate(usize),
    Done,
    Failed(FailureReason),
}

impl RegistrationState {
    /// Stage of the next transition, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Resample => Some(Stage::Resample),
            Self::AffineIterate(_) => Some(Stage::AffineSolve),
            Self::NonlinearIterate(_) => Some(Stage::NonlinearSolve),
            Self::Done | Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Buffers owned by a run once the inputs are on the working grid.
struct Working<B: Backend> {
    resampled: Volume,
    source: ScalePyramid<B>,
    reference: ScalePyramid<B>,
    level: usize,
    parameters: AffineParameters,
    affine_responses: Vec<FilterResponse>,
    nonlinear_responses: Vec<FilterResponse>,
    displacement: Option<DisplacementState<B>>,
}

impl<B: Backend> Working<B> {
    fn finest(&self) -> usize {
        self.reference.levels() - 1
    }
}

fn not_prepared() -> RegistrationError {
    RegistrationError::configuration("registration engine stepped before its inputs were resampled")
}

/// Drives one registration run on backend `B`.
pub struct RegistrationEngine<'a, B: Backend> {
    inputs: &'a RegistrationInputs,
    config: RegistrationConfig,
    output_level: OutputLevel,
    device: B::Device,
    affine: AffineSolver<B>,
    nonlinear: DisplacementSolver<B>,
    progress: Option<&'a dyn ProgressCallback>,
    state: RegistrationState,
    started: Instant,
    affine_matrix: Matrix4<f64>,
    work: Option<Working<B>>,
    result: Option<RegistrationResult>,
}

impl<'a, B: Backend> RegistrationEngine<'a, B> {
    /// Validate the configuration and upload the filter sets.
    pub fn new(
        inputs: &'a RegistrationInputs,
        filters: &FilterSets,
        config: RegistrationConfig,
        output_level: OutputLevel,
        device: B::Device,
    ) -> Result<Self> {
        config.validate().in_stage(Stage::DeviceSetup)?;
        let affine = AffineSolver::new(&filters.linear, &device).in_stage(Stage::AffineSolve)?;
        let nonlinear = DisplacementSolver::new(&filters.nonlinear, config.smoothing_sigma, &device)
            .in_stage(Stage::NonlinearSolve)?;

        Ok(Self {
            inputs,
            config,
            output_level,
            device,
            affine,
            nonlinear,
            progress: None,
            state: RegistrationState::Resample,
            started: Instant::now(),
            affine_matrix: Matrix4::identity(),
            work: None,
            result: None,
        })
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    /// Current affine estimate in millimetres about the reference centre.
    /// Independent of the scale level being worked on.
    pub fn affine_matrix(&self) -> Matrix4<f64> {
        self.affine_matrix
    }

    /// Current affine estimate in voxels of the level being worked on.
    pub fn affine_parameters(&self) -> Option<AffineParameters> {
        self.work.as_ref().map(|w| w.parameters)
    }

    pub fn result(&self) -> Option<&RegistrationResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<RegistrationResult> {
        self.result
    }

    /// Perform one transition.
    ///
    /// In a terminal state this is a no-op that returns the state unchanged.
    pub fn step(&mut self) -> Result<&RegistrationState> {
        let Some(stage) = self.state.stage() else {
            return Ok(&self.state);
        };
        match self.advance() {
            Ok(next) => {
                self.state = next;
                Ok(&self.state)
            }
            Err(error) => {
                let error = error.in_stage(stage);
                tracing::error!("Registration failed during {}: {}", stage, error);
                if let Some(progress) = self.progress {
                    progress.on_error(&error);
                }
                self.state = RegistrationState::Failed(FailureReason::from_error(stage, &error));
                self.work = None;
                Err(error)
            }
        }
    }

    /// Step until done and hand back the result.
    pub fn run(mut self) -> Result<RegistrationResult> {
        if let Some(progress) = self.progress {
            progress.on_start();
        }
        loop {
            match self.step()? {
                RegistrationState::Done => break,
                RegistrationState::Failed(reason) => return Err(reason.to_error()),
                _ => {}
            }
        }
        self.result.ok_or_else(not_prepared)
    }

    fn advance(&mut self) -> Result<RegistrationState> {
        match self.state {
            RegistrationState::Resample => {
                self.prepare()?;
                Ok(RegistrationState::AffineIterate(0))
            }
            RegistrationState::AffineIterate(k) => {
                self.affine_iteration(k)?;
                if k + 1 < self.config.total_affine_iterations() {
                    Ok(RegistrationState::AffineIterate(k + 1))
                } else {
                    Ok(RegistrationState::NonlinearIterate(0))
                }
            }
            RegistrationState::NonlinearIterate(k) => {
                self.nonlinear_iteration(k)?;
                if k + 1 < self.config.iterations_nonlinear {
                    Ok(RegistrationState::NonlinearIterate(k + 1))
                } else {
                    self.finish()?;
                    Ok(RegistrationState::Done)
                }
            }
            RegistrationState::Done => Ok(RegistrationState::Done),
            RegistrationState::Failed(ref reason) => Err(reason.to_error()),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        let reference = &self.inputs.reference;
        let finest_kernel = self.affine.kernel_size().max(self.nonlinear.kernel_size());
        validate_volume_for_kernel(reference, finest_kernel, "reference")?;

        let resampled = normalize::<B>(&self.inputs.source, reference, self.config.z_crop_mm, &self.device)?;

        let coarsest = self.config.coarsest_scale;
        let source = ScalePyramid::new(&resampled.to_image::<B>(&self.device), coarsest);
        let reference = ScalePyramid::new(&reference.to_image::<B>(&self.device), coarsest);
        for level in 0..reference.levels() {
            validate_grid_for_kernel(
                reference.level(level).size(),
                self.affine.kernel_size(),
                &format!("scale level {} (factor {})", level, reference.factor(level)),
            )?;
        }
        let affine_responses = self.affine.reference_responses(reference.level(0))?;

        tracing::info!(
            "Resampled source onto reference grid {:?} with {} scale level(s)",
            resampled.dims(),
            reference.levels()
        );
        self.work = Some(Working {
            resampled,
            source,
            reference,
            level: 0,
            parameters: AffineParameters::identity(),
            affine_responses,
            nonlinear_responses: Vec::new(),
            displacement: None,
        });
        Ok(())
    }

    fn affine_iteration(&mut self, k: usize) -> Result<()> {
        let total = self.config.total_affine_iterations();
        let level = k / self.config.iterations_linear;
        let work = self.work.as_mut().ok_or_else(not_prepared)?;

        if level != work.level {
            let previous = work.reference.factor(work.level) as f64;
            let current = work.reference.factor(level) as f64;
            work.parameters = work.parameters.rescaled(previous / current);
            work.level = level;
            work.affine_responses = self.affine.reference_responses(work.reference.level(level))?;
            tracing::debug!("Affine stage moved to scale factor {}", current);
        }

        let reference = work.reference.level(level);
        let update = self.affine.iterate(
            work.source.level(level),
            reference,
            &work.affine_responses,
            &work.parameters,
        )?;
        work.parameters = update.parameters;
        self.affine_matrix = update.parameters.to_physical(reference.spacing());

        let norm = update.increment_norm();
        tracing::info!(
            "Affine iteration {}/{} (scale {}): |update| = {:.3e}",
            k + 1,
            total,
            work.reference.factor(level),
            norm
        );
        self.report(Stage::AffineSolve, k + 1, total, norm);
        Ok(())
    }

    fn nonlinear_iteration(&mut self, k: usize) -> Result<()> {
        let total = self.config.iterations_nonlinear;
        let work = self.work.as_mut().ok_or_else(not_prepared)?;
        let finest = work.finest();
        let reference = work.reference.level(finest);
        let source = work.source.level(finest);

        if work.nonlinear_responses.is_empty() {
            work.nonlinear_responses = self.nonlinear.reference_responses(reference)?;
        }
        let state = work
            .displacement
            .get_or_insert_with(|| DisplacementState::zeros(reference.shape(), &self.device));
        let norm = self.nonlinear.iterate(
            source,
            reference,
            &work.nonlinear_responses,
            &work.parameters,
            state,
        )?;

        tracing::info!("Non-linear iteration {}/{}: rms update = {:.3e} mm", k + 1, total, norm);
        self.report(Stage::NonlinearSolve, k + 1, total, norm);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut work = self.work.take().ok_or_else(not_prepared)?;
        let finest = work.finest();
        let level = self.output_level;
        let state = match work.displacement.take() {
            Some(state) => state,
            None => DisplacementState::zeros(work.reference.level(finest).shape(), &self.device),
        };
        let reference = work.reference.level(finest);
        let source = work.source.level(finest);

        let nonlinear_warped =
            Volume::from_image(&self.nonlinear.warp(source, reference, &work.parameters, &state))?;

        let affine_warped = if level.includes_affine() {
            Some(Volume::from_image(&self.affine.warp(source, reference, &work.parameters))?)
        } else {
            None
        };

        let displacement = if level.includes_full() {
            let dims = reference.size();
            let voxel = reference.spacing().to_array();
            let [x, y, z] = field_to_host(&state.to_field(reference))?;
            Some(DisplacementVolume {
                x: Volume::new(x, dims, voxel)?,
                y: Volume::new(y, dims, voxel)?,
                z: Volume::new(z, dims, voxel)?,
            })
        } else {
            None
        };

        let elapsed = self.started.elapsed();
        self.result = Some(RegistrationResult {
            nonlinear_warped,
            affine_warped,
            affine_matrix: level.includes_affine().then_some(self.affine_matrix),
            affine_parameters: level.includes_affine().then_some(work.parameters),
            resampled_source: level.includes_full().then_some(work.resampled),
            reference: level.includes_full().then(|| self.inputs.reference.clone()),
            displacement,
            elapsed,
        });

        tracing::info!("Registration finished in {:.2}s", elapsed.as_secs_f64());
        if let Some(progress) = self.progress {
            progress.on_complete(elapsed);
        }
        Ok(())
    }

    fn report(&self, stage: Stage, iteration: usize, total: usize, update_norm: f64) {
        if let Some(progress) = self.progress {
            progress.on_progress(&ProgressInfo {
                stage,
                iteration,
                total,
                update_norm,
                elapsed: self.started.elapsed(),
            });
        }
    }
}
