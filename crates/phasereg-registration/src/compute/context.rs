//! Scoped compute context: a validated device plus a dedicated worker pool.

use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use rayon::{ThreadPool, ThreadPoolBuilder};
use crate::error::{RegistrationError, Result};
use super::platform::{ComputeDevice, DeviceSelection};

/// Execution context for one registration run.
///
/// Owns a rayon pool with the requested number of lanes; every host kernel
/// run inside [`ComputeContext::install`] uses that pool. The pool is
/// released when the context is dropped.
pub struct ComputeContext {
    selection: DeviceSelection,
    device: ComputeDevice,
    pool: ThreadPool,
}

impl std::fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeContext")
            .field("selection", &self.selection)
            .field("device", &self.device)
            .field("lanes", &self.pool.current_num_threads())
            .finish()
    }
}

impl ComputeContext {
    /// Validate `selection`, probe the device and build the worker pool.
    ///
    /// `lanes: None` uses every available core.
    pub fn open(selection: DeviceSelection, lanes: Option<usize>) -> Result<Self> {
        if lanes == Some(0) {
            return Err(RegistrationError::configuration("lanes must be > 0"));
        }
        let device = ComputeDevice::resolve(selection)?;
        probe(&device)?;

        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("phasereg-lane-{i}"));
        if let Some(n) = lanes {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| RegistrationError::device(format!("failed to start worker pool: {e}")))?;

        tracing::debug!(
            "Opened compute context on platform {} device {} with {} lanes",
            selection.platform,
            selection.device,
            pool.current_num_threads()
        );
        Ok(Self { selection, device, pool })
    }

    pub fn selection(&self) -> DeviceSelection {
        self.selection
    }

    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    pub fn lanes(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` with this context's pool as the ambient rayon pool.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }
}

fn probe(device: &ComputeDevice) -> Result<()> {
    match device {
        ComputeDevice::Host(d) => {
            let sum: f32 = Tensor::<NdArray<f32>, 1>::ones([4], d).sum().into_scalar();
            if sum != 4.0 {
                return Err(RegistrationError::device("host backend self-test failed"));
            }
            Ok(())
        }
        #[cfg(feature = "wgpu")]
        ComputeDevice::Wgpu(d) => {
            use burn::backend::Wgpu;
            use burn::tensor::ElementConversion;

            let d = d.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                Tensor::<Wgpu, 1>::ones([4], &d).sum().into_scalar().elem::<f32>()
            }));
            match outcome {
                Ok(sum) if sum == 4.0 => Ok(()),
                Ok(_) => Err(RegistrationError::device("wgpu device self-test failed")),
                Err(_) => Err(RegistrationError::device("wgpu device could not be initialised")),
            }
        }
    }
}
