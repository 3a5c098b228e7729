//! Shape similarity scoring over dotprops clouds.
//!
//! The engine treats the pairwise scorer as a black box behind
//! [`ShapeScorer`], so the kernel can be swapped without touching the
//! orchestration (fragment pruning, resampling, symmetric variant
//! selection, batch iteration).

use kiddo::SquaredEuclidean;
use log::warn;
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::config::{DotpropsConfig, ScorerConfig};
use crate::core::dotprops::build_tree;
use crate::core::{largest_component, resample_grid, Dotprops, Point3};
use crate::error::Result;
use crate::progress::Progress;

/// Pairwise shape similarity kernel.
pub trait ShapeScorer {
    /// Similarity of `query` against `target`. Higher is more similar.
    fn score(&self, query: &Dotprops, target: &Dotprops) -> f32;
}

/// Built-in kernel: for each query point, find the nearest target point and
/// combine tangent alignment with a Gaussian distance falloff; the score is
/// the mean over query points.
#[derive(Clone, Copy, Debug)]
pub struct NearestTangentScorer {
    /// Distance falloff, in template units.
    pub sigma: f32,
}

impl NearestTangentScorer {
    /// Create a scorer from its configuration.
    pub fn new(config: &ScorerConfig) -> Self {
        Self {
            sigma: config.sigma,
        }
    }
}

impl Default for NearestTangentScorer {
    fn default() -> Self {
        Self::new(&ScorerConfig::default())
    }
}

impl ShapeScorer for NearestTangentScorer {
    fn score(&self, query: &Dotprops, target: &Dotprops) -> f32 {
        if query.is_empty() || target.is_empty() {
            return 0.0;
        }

        let tree = build_tree(&target.points);
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;

        let mut sum = 0.0;
        for (p, t) in query.points.iter().zip(query.tangents.iter()) {
            let nearest = tree.nearest_n::<SquaredEuclidean>(&p.as_array(), 1);
            let n = &nearest[0];
            let tt = target.tangents[n.item as usize];
            let alignment = (t[0] * tt[0] + t[1] * tt[1] + t[2] * tt[2]).abs();
            // n.distance is already squared.
            sum += alignment * (-n.distance / two_sigma_sq).exp();
        }

        sum / query.len() as f32
    }
}

/// Derive a scorable dotprops cloud from raw points: prune disconnected
/// fragments, normalize density, then estimate tangents.
pub fn prepare_dotprops(points: Vec<Point3>, config: &DotpropsConfig) -> Result<Dotprops> {
    let dominant = largest_component(&points, config.fragment_link_distance);
    let resampled = resample_grid(&dominant, config.resample_spacing);
    Dotprops::from_points(resampled, config.tangent_neighbors)
}

/// Score a prepared query cloud against one candidate.
///
/// The candidate's symmetrized shape variant is requested so scoring stays
/// side-agnostic; backends fall back to the raw shape when no symmetrized
/// variant exists. The candidate cloud goes through the same pruning,
/// resampling and tangent estimation as the query, so both sides of the
/// comparison are preprocessed identically regardless of how the backend
/// stores its shapes.
pub fn shape_similarity<C: Catalog, S: ShapeScorer>(
    query: &Dotprops,
    id: &str,
    catalog: &C,
    scorer: &S,
    config: &DotpropsConfig,
) -> Result<f32> {
    let raw = catalog.shape(id, true)?;
    let target = prepare_dotprops(raw.points, config)?;
    Ok(scorer.score(query, &target))
}

/// Score a prepared query cloud against a batch of candidates.
///
/// Candidates whose shape cannot be fetched are skipped with a warning.
/// Progress is reported once per candidate.
pub fn shape_similarity_many<C: Catalog, S: ShapeScorer, P: Progress>(
    query: &Dotprops,
    ids: &[String],
    catalog: &C,
    scorer: &S,
    config: &DotpropsConfig,
    progress: &mut P,
) -> BTreeMap<String, f32> {
    let total = ids.len();
    let mut scores = BTreeMap::new();

    for (i, id) in ids.iter().enumerate() {
        match shape_similarity(query, id, catalog, scorer, config) {
            Ok(score) => {
                scores.insert(id.clone(), score);
            }
            Err(e) => {
                warn!("[shape] skipping candidate '{}': {}", id, e);
            }
        }
        progress.step(i + 1, total);
    }

    scores
}
