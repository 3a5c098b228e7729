//! Voxel overlap scoring.
//!
//! The overlap score between a query volume and a candidate volume is the
//! fraction of the candidate's set voxels that the query also sets. Scores
//! are in [0, 1]; a candidate fully contained in the query scores 1.0.

use log::warn;
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::core::VoxelVolume;
use crate::error::{MatchError, Result};
use crate::progress::Progress;

/// Overlap of `query` against `target`, normalized by the target's set
/// voxel count.
///
/// Both volumes must have identical dimensions. A target with no set voxels
/// scores 0.0.
pub fn voxel_overlap(query: &VoxelVolume, target: &VoxelVolume) -> Result<f32> {
    if !query.same_shape(target) {
        return Err(MatchError::InputValidation(format!(
            "volume dimensions differ: query {:?} vs target {:?}",
            query.dims(),
            target.dims()
        )));
    }

    let target_count = target.count_set();
    if target_count == 0 {
        return Ok(0.0);
    }

    let overlap = query
        .data()
        .iter()
        .zip(target.data().iter())
        .filter(|(&q, &t)| q != 0 && t != 0)
        .count();

    Ok(overlap as f32 / target_count as f32)
}

/// Score a query volume against a batch of candidates.
///
/// Candidates whose volume cannot be fetched or scored are skipped with a
/// warning rather than failing the batch. Progress is reported once per
/// candidate.
pub fn voxel_overlap_many<C: Catalog, P: Progress>(
    query: &VoxelVolume,
    ids: &[String],
    catalog: &C,
    progress: &mut P,
) -> BTreeMap<String, f32> {
    let total = ids.len();
    let mut scores = BTreeMap::new();

    for (i, id) in ids.iter().enumerate() {
        match catalog
            .volume(id)
            .and_then(|target| voxel_overlap(query, &target))
        {
            Ok(score) => {
                scores.insert(id.clone(), score);
            }
            Err(e) => {
                warn!("[voxel] skipping candidate '{}': {}", id, e);
            }
        }
        progress.step(i + 1, total);
    }

    scores
}
