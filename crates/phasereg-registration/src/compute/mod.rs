//! Compute substrate: backend enumeration and scoped execution contexts.

pub mod platform;
pub mod context;

pub use platform::{available_platforms, ComputeDevice, DeviceInfo, DeviceSelection, PlatformInfo, HOST_PLATFORM};
#[cfg(feature = "wgpu")]
pub use platform::WGPU_PLATFORM;
pub use context::ComputeContext;
