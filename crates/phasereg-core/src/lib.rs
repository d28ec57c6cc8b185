//! Core volume, geometry and resampling primitives for phase-based registration.

pub mod error;
pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use error::VolumeError;
pub use image::{Image, Volume};
pub use spatial::{Point, Spacing, Vector};
