//! Volumes and their physical grid geometry.
//!
//! [`Volume`] is the host-side value exchanged with callers; [`Image`] is the
//! backend tensor view used by the filters and transforms.

pub mod image;
pub mod grid;
pub mod volume;

pub use image::Image;
pub use grid::generate_grid_3d;
pub use volume::{tensor_to_vec, Volume};
