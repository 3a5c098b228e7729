//! Binary voxel volume used by the overlap scorer.
//!
//! Volumes are dense 3D grids stored as a flat byte buffer; any nonzero
//! byte counts as a set voxel. Query volumes are produced by binarizing a
//! source image at an intensity threshold, candidate volumes come from the
//! catalog. The overlap scorer requires both grids to have identical
//! dimensions.

use crate::core::point::Point3;
use crate::error::{MatchError, Result};

/// A dense binary voxel grid.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelVolume {
    dims: [usize; 3],
    data: Vec<u8>,
}

impl VoxelVolume {
    /// Create an all-zero volume with the given dimensions.
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            data: vec![0; dims[0] * dims[1] * dims[2]],
        }
    }

    /// Wrap an existing buffer. The buffer length must match the dimensions.
    pub fn from_data(dims: [usize; 3], data: Vec<u8>) -> Result<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if data.len() != expected {
            return Err(MatchError::InputValidation(format!(
                "volume buffer length {} does not match dims {:?} ({} voxels)",
                data.len(),
                dims,
                expected
            )));
        }
        Ok(Self { dims, data })
    }

    /// Binarize a scalar field at an intensity threshold (`value > threshold`).
    pub fn binarize(dims: [usize; 3], field: &[f32], threshold: f32) -> Result<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if field.len() != expected {
            return Err(MatchError::InputValidation(format!(
                "scalar field length {} does not match dims {:?}",
                field.len(),
                dims
            )));
        }
        let data = field
            .iter()
            .map(|&v| if v > threshold { 1 } else { 0 })
            .collect();
        Ok(Self { dims, data })
    }

    /// Grid dimensions.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Whether another volume has the same dimensions.
    #[inline]
    pub fn same_shape(&self, other: &VoxelVolume) -> bool {
        self.dims == other.dims
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.dims[1] + y) * self.dims[2] + z
    }

    /// Whether the voxel at (x, y, z) is set.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        self.data[self.index(x, y, z)] != 0
    }

    /// Set or clear the voxel at (x, y, z).
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, on: bool) {
        let i = self.index(x, y, z);
        self.data[i] = on as u8;
    }

    /// Number of set voxels.
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Raw buffer access (used by the overlap scorer).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Coordinates of all set voxels, scaled by the voxel pitch.
    ///
    /// This is the first step of the dotprops derivation: the binary mask
    /// becomes a point cloud in template units.
    pub fn set_points(&self, pitch: f32) -> Vec<Point3> {
        let mut points = Vec::new();
        for x in 0..self.dims[0] {
            for y in 0..self.dims[1] {
                for z in 0..self.dims[2] {
                    if self.get(x, y, z) {
                        points.push(Point3::new(
                            x as f32 * pitch,
                            y as f32 * pitch,
                            z as f32 * pitch,
                        ));
                    }
                }
            }
        }
        points
    }
}
