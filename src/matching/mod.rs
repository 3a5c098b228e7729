//! Scoring algorithms: centroid matching, voxel overlap, shape similarity.

pub mod centroid;
pub mod shape;
pub mod voxel;

pub use centroid::{match_centroids, mirror, CentroidMatch};
pub use shape::{
    prepare_dotprops, shape_similarity, shape_similarity_many, NearestTangentScorer, ShapeScorer,
};
pub use voxel::{voxel_overlap, voxel_overlap_many};
