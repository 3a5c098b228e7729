//! Per-candidate score record and review status.

use serde::{Deserialize, Serialize};

use crate::core::Point3;
use crate::error::{MatchError, Result};

/// Sentinel marking a score that has never been computed.
pub const UNSET_SCORE: f32 = -1.0;

/// Human review verdict for one candidate match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Scores exist (or not) but nobody has looked yet.
    #[default]
    NotReviewed,
    /// Confirmed match.
    Accept,
    /// Confirmed non-match.
    Reject,
    /// Reviewer could not decide.
    Unsure,
}

/// Scores and review state for one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRecord {
    /// Voxel overlap score, or [`UNSET_SCORE`].
    pub voxel_score: f32,
    /// Shape similarity score, or [`UNSET_SCORE`].
    pub nblast_score: f32,
    /// Query centroid at scoring time, formatted "(x, y, z)". Empty until
    /// scored.
    pub query_centroid: String,
    /// Local wall-clock time of scoring, "%Y-%m-%d %H:%M:%S". Empty until
    /// scored.
    pub time_stamp: String,
    /// Review verdict.
    pub status: ReviewStatus,
    /// Binarization threshold the scores were computed at, or
    /// [`UNSET_SCORE`].
    pub threshold: f32,
}

impl Default for ScoreRecord {
    fn default() -> Self {
        Self {
            voxel_score: UNSET_SCORE,
            nblast_score: UNSET_SCORE,
            query_centroid: String::new(),
            time_stamp: String::new(),
            status: ReviewStatus::NotReviewed,
            threshold: UNSET_SCORE,
        }
    }
}

impl ScoreRecord {
    /// Whether at least one score has been computed.
    pub fn has_scores(&self) -> bool {
        self.voxel_score != UNSET_SCORE || self.nblast_score != UNSET_SCORE
    }

    /// Whether this record needs (re)scoring against the current
    /// binarization threshold.
    ///
    /// A record is stale when it has never been scored, or when it was
    /// scored at a different threshold than the current one.
    pub fn is_stale(&self, current_threshold: f32) -> bool {
        if !self.has_scores() {
            return true;
        }
        self.threshold != current_threshold
    }
}

/// Parse a centroid stored in "(x, y, z)" form back into a point.
pub fn parse_centroid_tuple(text: &str) -> Result<Point3> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| {
            MatchError::InputValidation(format!("centroid '{}' is not a (x, y, z) tuple", text))
        })?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(MatchError::InputValidation(format!(
            "centroid '{}' does not have three components",
            text
        )));
    }

    let parse = |s: &str| {
        s.parse::<f32>().map_err(|_| {
            MatchError::InputValidation(format!("centroid component '{}' is not a number", s))
        })
    };
    Ok(Point3::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
}
