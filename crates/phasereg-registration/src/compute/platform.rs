//! Compiled-in compute platforms and their devices.

use burn_ndarray::NdArrayDevice;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};

#[cfg(feature = "wgpu")]
use burn::backend::wgpu::WgpuDevice;

/// Host backend (`burn-ndarray`), always available.
pub const HOST_PLATFORM: usize = 0;

/// Accelerator backend (`wgpu`).
#[cfg(feature = "wgpu")]
pub const WGPU_PLATFORM: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub index: usize,
    pub name: String,
    pub devices: Vec<DeviceInfo>,
}

/// A `(platform, device)` pair as chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSelection {
    pub platform: usize,
    pub device: usize,
}

impl DeviceSelection {
    pub fn new(platform: usize, device: usize) -> Self {
        Self { platform, device }
    }

    pub fn host() -> Self {
        Self::new(HOST_PLATFORM, 0)
    }
}

/// A resolved backend device.
#[derive(Debug, Clone)]
pub enum ComputeDevice {
    Host(NdArrayDevice),
    #[cfg(feature = "wgpu")]
    Wgpu(WgpuDevice),
}

impl ComputeDevice {
    /// Resolve a selection against the compiled-in platforms.
    pub fn resolve(selection: DeviceSelection) -> Result<Self> {
        match (selection.platform, selection.device) {
            (HOST_PLATFORM, 0) => Ok(Self::Host(NdArrayDevice::Cpu)),
            #[cfg(feature = "wgpu")]
            (WGPU_PLATFORM, device) => wgpu_device(device).map(Self::Wgpu).ok_or_else(|| {
                RegistrationError::device(format!("platform {WGPU_PLATFORM} has no device {device}"))
            }),
            (platform, device) if platform < available_platforms().len() => Err(RegistrationError::device(
                format!("platform {platform} has no device {device}"),
            )),
            (platform, _) => Err(RegistrationError::device(format!(
                "unknown platform {platform}; {} platform(s) available",
                available_platforms().len()
            ))),
        }
    }
}

#[cfg(feature = "wgpu")]
fn wgpu_device(index: usize) -> Option<WgpuDevice> {
    match index {
        0 => Some(WgpuDevice::DefaultDevice),
        1 => Some(WgpuDevice::DiscreteGpu(0)),
        2 => Some(WgpuDevice::IntegratedGpu(0)),
        3 => Some(WgpuDevice::Cpu),
        _ => None,
    }
}

/// Enumerate the platforms compiled into this build.
pub fn available_platforms() -> Vec<PlatformInfo> {
    #[allow(unused_mut)]
    let mut platforms = vec![PlatformInfo {
        index: HOST_PLATFORM,
        name: "host (ndarray)".to_string(),
        devices: vec![DeviceInfo { index: 0, name: "cpu".to_string() }],
    }];

    #[cfg(feature = "wgpu")]
    platforms.push(PlatformInfo {
        index: WGPU_PLATFORM,
        name: "wgpu".to_string(),
        devices: ["default adapter", "discrete gpu", "integrated gpu", "software cpu"]
            .iter()
            .enumerate()
            .map(|(index, name)| DeviceInfo { index, name: name.to_string() })
            .collect(),
    });

    platforms
}
