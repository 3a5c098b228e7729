//! Point-tangent ("dotprops") shape representation.
//!
//! A structure's geometry is encoded as a point cloud with one unit tangent
//! per point, estimated from the dominant eigenvector of the local
//! neighborhood covariance. This is the input format of the pairwise shape
//! similarity scorer.
//!
//! The derivation pipeline for a query volume is:
//!
//! ```text
//! binary volume ──set_points──► point cloud
//!                               │ largest_component (fragment pruning)
//!                               ▼
//!                               dominant cloud
//!                               │ resample_grid (density normalization)
//!                               ▼
//!                               resampled cloud
//!                               │ Dotprops::from_points (k-NN tangents)
//!                               ▼
//!                               Dotprops
//! ```

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, SymmetricEigen};
use std::collections::BTreeMap;

use crate::core::point::Point3;
use crate::error::{MatchError, Result};

/// Point cloud with per-point unit tangents.
#[derive(Clone, Debug, PartialEq)]
pub struct Dotprops {
    /// Sample points in template space.
    pub points: Vec<Point3>,
    /// Unit tangent per point (local dominant direction).
    pub tangents: Vec<[f32; 3]>,
}

impl Dotprops {
    /// Build a dotprops cloud, estimating each point's tangent from its
    /// `k` nearest neighbors (clamped to the cloud size).
    ///
    /// An empty point set is rejected: there is nothing to score against.
    pub fn from_points(points: Vec<Point3>, k: usize) -> Result<Self> {
        if points.is_empty() {
            return Err(MatchError::InputValidation(
                "cannot build dotprops from an empty point set".to_string(),
            ));
        }

        let tree = build_tree(&points);
        let k = k.max(2).min(points.len());

        let mut tangents = Vec::with_capacity(points.len());
        for p in &points {
            let neighbors = tree.nearest_n::<SquaredEuclidean>(&p.as_array(), k);
            let neighbor_points: Vec<Point3> = neighbors
                .iter()
                .map(|n| points[n.item as usize])
                .collect();
            tangents.push(dominant_direction(&neighbor_points));
        }

        Ok(Self { points, tangents })
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Build a k-d tree over a point slice, indexed by position.
///
/// The bucket size must exceed the number of points sharing a coordinate on
/// any single axis; collinear clouds put every point in one bucket, so the
/// default of 32 is far too small.
pub(crate) fn build_tree(points: &[Point3]) -> KdTree<f32, u64, 3, 1024, u32> {
    let mut tree = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        tree.add(&p.as_array(), i as u64);
    }
    tree
}

/// Keep only the largest connected component of a point cloud.
///
/// Two points are connected when they lie within `link_distance` of each
/// other. Small disconnected fragments (imaging noise, severed fibers) are
/// discarded so they cannot dominate the similarity score.
pub fn largest_component(points: &[Point3], link_distance: f32) -> Vec<Point3> {
    if points.is_empty() {
        return Vec::new();
    }

    let tree = build_tree(points);
    let link_sq = link_distance * link_distance;

    let mut component = vec![usize::MAX; points.len()];
    let mut sizes: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..points.len() {
        if component[start] != usize::MAX {
            continue;
        }
        let label = sizes.len();
        sizes.push(0);
        stack.push(start);
        component[start] = label;

        while let Some(i) = stack.pop() {
            sizes[label] += 1;
            let near = tree.within_unsorted::<SquaredEuclidean>(&points[i].as_array(), link_sq);
            for n in near {
                let j = n.item as usize;
                if component[j] == usize::MAX {
                    component[j] = label;
                    stack.push(j);
                }
            }
        }
    }

    let best = sizes
        .iter()
        .enumerate()
        .max_by_key(|(_, &s)| s)
        .map(|(label, _)| label)
        .unwrap_or(0);

    points
        .iter()
        .zip(component.iter())
        .filter(|(_, &label)| label == best)
        .map(|(&p, _)| p)
        .collect()
}

/// Resample a point cloud to a comparable density.
///
/// Points are bucketed into a grid of `spacing`-sized cells and each
/// occupied cell is replaced by the mean of its points, so both sides of a
/// pairwise comparison end up at roughly one point per cell.
pub fn resample_grid(points: &[Point3], spacing: f32) -> Vec<Point3> {
    if spacing <= 0.0 || points.is_empty() {
        return points.to_vec();
    }

    // BTreeMap keeps cell iteration deterministic.
    let mut cells: BTreeMap<(i64, i64, i64), (Point3, usize)> = BTreeMap::new();
    for p in points {
        let key = (
            (p.x / spacing).floor() as i64,
            (p.y / spacing).floor() as i64,
            (p.z / spacing).floor() as i64,
        );
        let entry = cells.entry(key).or_insert((Point3::ZERO, 0));
        entry.0.x += p.x;
        entry.0.y += p.y;
        entry.0.z += p.z;
        entry.1 += 1;
    }

    cells
        .values()
        .map(|(sum, count)| {
            let n = *count as f32;
            Point3::new(sum.x / n, sum.y / n, sum.z / n)
        })
        .collect()
}

/// Dominant direction of a neighborhood: unit eigenvector of the covariance
/// matrix with the largest eigenvalue.
fn dominant_direction(points: &[Point3]) -> [f32; 3] {
    let n = points.len();
    if n < 2 {
        return [1.0, 0.0, 0.0];
    }

    let inv = 1.0 / n as f32;
    let mut mx = 0.0;
    let mut my = 0.0;
    let mut mz = 0.0;
    for p in points {
        mx += p.x;
        my += p.y;
        mz += p.z;
    }
    mx *= inv;
    my *= inv;
    mz *= inv;

    let (mut xx, mut xy, mut xz, mut yy, mut yz, mut zz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for p in points {
        let dx = p.x - mx;
        let dy = p.y - my;
        let dz = p.z - mz;
        xx += dx * dx;
        xy += dx * dy;
        xz += dx * dz;
        yy += dy * dy;
        yz += dy * dz;
        zz += dz * dz;
    }

    let cov = Matrix3::new(xx, xy, xz, xy, yy, yz, xz, yz, zz) * inv;
    let eigen = SymmetricEigen::new(cov);

    let mut best = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] > eigen.eigenvalues[best] {
            best = i;
        }
    }
    let v = eigen.eigenvectors.column(best);
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if norm <= f32::EPSILON {
        return [1.0, 0.0, 0.0];
    }
    [v[0] / norm, v[1] / norm, v[2] / norm]
}
