//! Fundamental types: points, voxel volumes, and dotprops shape clouds.

pub mod dotprops;
pub mod point;
pub mod volume;

pub use dotprops::{largest_component, resample_grid, Dotprops};
pub use point::Point3;
pub use volume::VoxelVolume;
