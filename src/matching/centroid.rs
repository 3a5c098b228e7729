//! Symmetry-aware centroid matching.
//!
//! A query centroid matches a candidate when either the direct distance or
//! the distance after mirroring the query across the template midline falls
//! within the candidate's acceptance radius. Mirroring makes the match
//! side-agnostic: a structure on the left matches its right-hemisphere
//! catalog entry.

use crate::catalog::CentroidTable;
use crate::config::TemplateConfig;
use crate::core::Point3;

/// Reflect a point across the template midline plane (x only).
#[inline]
pub fn mirror(p: Point3, midline: f32) -> Point3 {
    Point3::new(midline - p.x, p.y, p.z)
}

/// One centroid match, with the winning (smaller) distance.
#[derive(Clone, Debug, PartialEq)]
pub struct CentroidMatch {
    /// Matched candidate identifier.
    pub id: String,
    /// min(direct, mirrored) distance to the candidate centroid.
    pub distance: f32,
}

/// Match a query centroid against the whole table.
///
/// Returns matches sorted by ascending distance; ties keep table order.
pub fn match_centroids(
    query: Point3,
    table: &CentroidTable,
    template: &TemplateConfig,
) -> Vec<CentroidMatch> {
    let mirrored = mirror(query, template.midline);

    let mut matches: Vec<CentroidMatch> = table
        .entries()
        .iter()
        .filter_map(|candidate| {
            let direct = query.distance(&candidate.centroid);
            let reflected = mirrored.distance(&candidate.centroid);
            let distance = direct.min(reflected);
            if distance <= candidate.match_radius {
                Some(CentroidMatch {
                    id: candidate.id.clone(),
                    distance,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    matches
}
