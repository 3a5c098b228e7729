//! Match session: ties catalog, scorers, and ledger into one workflow.
//!
//! A session is opened against a catalog and a ledger file, then driven
//! through the three stages of the workflow:
//!
//! 1. [`MatchSession::match_centroid`] narrows the catalog to plausible
//!    candidates around a query centroid.
//! 2. [`MatchSession::run_matches`] computes voxel and shape scores for the
//!    candidates that are stale at the query's threshold, and persists the
//!    updated ledger.
//! 3. [`MatchSession::set_review_status`] records human verdicts, persisting
//!    after each change.

use chrono::Local;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::core::{Point3, VoxelVolume};
use crate::error::{MatchError, Result};
use crate::ledger::{Ledger, ReviewStatus};
use crate::matching::centroid::{match_centroids, CentroidMatch};
use crate::matching::shape::{prepare_dotprops, shape_similarity_many, ShapeScorer};
use crate::matching::voxel::voxel_overlap_many;
use crate::progress::Progress;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One query structure to be matched.
#[derive(Clone, Debug)]
pub struct Query {
    /// Cell body centroid in template space.
    pub centroid: Point3,
    /// Binarized query volume. Required for voxel and shape scoring.
    pub volume: Option<VoxelVolume>,
    /// Path of the source image the volume came from. Required for shape
    /// scoring (recorded provenance).
    pub source_path: Option<PathBuf>,
    /// Intensity threshold the volume was binarized at. Doubles as the
    /// staleness fingerprint in the ledger.
    pub threshold: f32,
}

impl Query {
    /// Create a query from its centroid and threshold.
    pub fn new(centroid: Point3, threshold: f32) -> Self {
        Self {
            centroid,
            volume: None,
            source_path: None,
            threshold,
        }
    }

    /// Builder-style setter for the query volume.
    pub fn with_volume(mut self, volume: VoxelVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Builder-style setter for the source image path.
    pub fn with_source_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_path = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Which scorers a matching run executes.
#[derive(Clone, Copy, Debug)]
pub struct MatchOptions {
    /// Run the voxel overlap scorer.
    pub voxel: bool,
    /// Run the shape similarity scorer.
    pub nblast: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            voxel: true,
            nblast: true,
        }
    }
}

/// Outcome of one matching run.
#[derive(Clone, Debug, Default)]
pub struct MatchReport {
    /// Candidates scored in this run.
    pub computed: Vec<String>,
    /// Candidates whose stored scores were already current.
    pub current: Vec<String>,
    /// Requested ids unknown to the catalog.
    pub skipped: Vec<String>,
}

/// An open matching session over a catalog and a ledger file.
pub struct MatchSession<C: Catalog, S: ShapeScorer> {
    catalog: C,
    scorer: S,
    config: EngineConfig,
    ledger: Ledger,
    ledger_path: PathBuf,
}

impl<C: Catalog, S: ShapeScorer> MatchSession<C, S> {
    /// Open a session. The ledger file is loaded and merged with the
    /// catalog; a missing or unreadable ledger starts fresh.
    pub fn open<P: AsRef<Path>>(
        catalog: C,
        scorer: S,
        config: EngineConfig,
        ledger_path: P,
    ) -> Result<Self> {
        config.validate()?;
        let ids = catalog.candidate_ids();
        let ledger = Ledger::load_or_empty(ledger_path.as_ref(), &ids);
        Ok(Self {
            catalog,
            scorer,
            config,
            ledger,
            ledger_path: ledger_path.as_ref().to_path_buf(),
        })
    }

    /// Candidates whose centroid (direct or mirrored) lies within the
    /// acceptance radius of the query centroid, closest first.
    pub fn match_centroid(&self, centroid: Point3) -> Result<Vec<CentroidMatch>> {
        let table = self.catalog.centroid_table()?;
        Ok(match_centroids(centroid, &table, &self.config.template))
    }

    /// Score a query against the given candidates and persist the ledger.
    ///
    /// Only candidates that are stale at the query's threshold are
    /// rescored; current ones are reported untouched. Unknown ids are
    /// skipped with a warning. Preconditions are checked up front: both
    /// scorers need the query volume, shape scoring also needs the source
    /// path.
    pub fn run_matches<P: Progress>(
        &mut self,
        query: &Query,
        ids: &[String],
        options: MatchOptions,
        progress: &mut P,
    ) -> Result<MatchReport> {
        if (options.voxel || options.nblast) && query.volume.is_none() {
            return Err(MatchError::InputValidation(
                "scoring requires a binarized query volume".to_string(),
            ));
        }
        if options.nblast && query.source_path.is_none() {
            return Err(MatchError::InputValidation(
                "shape scoring requires the query source path".to_string(),
            ));
        }

        let known = self.catalog.candidate_ids();
        let mut report = MatchReport::default();
        let mut stale: Vec<String> = Vec::new();

        for id in ids {
            if !known.contains(id) {
                warn!("[session] requested candidate '{}' is not in the catalog", id);
                report.skipped.push(id.clone());
            } else if self.ledger.is_stale(id, query.threshold) {
                stale.push(id.clone());
            } else {
                report.current.push(id.clone());
            }
        }

        if stale.is_empty() {
            debug!("[session] all requested candidates are current, nothing to score");
            return Ok(report);
        }

        let mut voxel_scores: BTreeMap<String, f32> = BTreeMap::new();
        let mut shape_scores: BTreeMap<String, f32> = BTreeMap::new();

        if let Some(volume) = &query.volume {
            if options.voxel {
                voxel_scores = voxel_overlap_many(volume, &stale, &self.catalog, progress);
            }
            if options.nblast {
                let points = volume.set_points(self.config.dotprops.voxel_pitch);
                let query_dps = prepare_dotprops(points, &self.config.dotprops)?;
                debug!(
                    "[session] query dotprops: {} points after pruning and resampling",
                    query_dps.len()
                );
                shape_scores = shape_similarity_many(
                    &query_dps,
                    &stale,
                    &self.catalog,
                    &self.scorer,
                    &self.config.dotprops,
                    progress,
                );
            }
        }

        let time_stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let centroid = format!(
            "({}, {}, {})",
            query.centroid.x, query.centroid.y, query.centroid.z
        );

        for id in &stale {
            let voxel = voxel_scores.get(id).copied();
            let nblast = shape_scores.get(id).copied();
            if voxel.is_none() && nblast.is_none() {
                // Both scorers skipped this candidate; leave its record as is.
                continue;
            }
            self.ledger
                .upsert_scores(id, voxel, nblast, query.threshold, &centroid, &time_stamp)?;
            report.computed.push(id.clone());
        }

        self.ledger.save(&self.ledger_path)?;
        Ok(report)
    }

    /// Record a review verdict and persist the ledger.
    pub fn set_review_status(&mut self, id: &str, status: ReviewStatus) -> Result<()> {
        self.ledger.set_review_status(id, status)?;
        self.ledger.save(&self.ledger_path)
    }

    /// The current ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::core::Dotprops;
    use crate::progress::NoProgress;

    struct ConstantScorer(f32);

    impl ShapeScorer for ConstantScorer {
        fn score(&self, _query: &Dotprops, _target: &Dotprops) -> f32 {
            self.0
        }
    }

    fn make_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.insert_candidate("a", Point3::new(10.0, 10.0, 10.0), 5.0);

        let mut volume = VoxelVolume::new([3, 3, 3]);
        volume.set(1, 1, 1, true);
        catalog.set_volume("a", volume);

        let shape = Dotprops {
            points: vec![Point3::new(1.0, 1.0, 1.0)],
            tangents: vec![[1.0, 0.0, 0.0]],
        };
        catalog.set_shape("a", shape, false);
        catalog
    }

    fn make_query() -> Query {
        let mut volume = VoxelVolume::new([3, 3, 3]);
        volume.set(1, 1, 1, true);
        volume.set(1, 1, 2, true);
        Query::new(Point3::new(10.0, 10.0, 10.0), 120.0)
            .with_volume(volume)
            .with_source_path("/data/query.tif")
    }

    #[test]
    fn test_run_matches_requires_volume() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            dir.path().join("scores.csv"),
        )
        .unwrap();

        let query = Query::new(Point3::ZERO, 120.0);
        let err = session.run_matches(
            &query,
            &["a".to_string()],
            MatchOptions::default(),
            &mut NoProgress,
        );
        assert!(matches!(err, Err(MatchError::InputValidation(_))));
    }

    #[test]
    fn test_run_matches_scores_and_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scores.csv");
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            &path,
        )
        .unwrap();

        let report = session
            .run_matches(
                &make_query(),
                &["a".to_string(), "unknown".to_string()],
                MatchOptions::default(),
                &mut NoProgress,
            )
            .unwrap();

        assert_eq!(report.computed, vec!["a"]);
        assert_eq!(report.skipped, vec!["unknown"]);

        let record = session.ledger().get("a").unwrap();
        assert_eq!(record.voxel_score, 1.0);
        assert_eq!(record.nblast_score, 0.5);
        assert_eq!(record.threshold, 120.0);
        assert_eq!(record.query_centroid, "(10, 10, 10)");
        assert!(path.exists());
    }

    #[test]
    fn test_second_run_at_same_threshold_is_current() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scores.csv");
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            &path,
        )
        .unwrap();

        let query = make_query();
        let ids = vec!["a".to_string()];
        session
            .run_matches(&query, &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();
        let report = session
            .run_matches(&query, &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();

        assert!(report.computed.is_empty());
        assert_eq!(report.current, vec!["a"]);
    }

    #[test]
    fn test_threshold_change_triggers_rescore() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            dir.path().join("scores.csv"),
        )
        .unwrap();

        let ids = vec!["a".to_string()];
        session
            .run_matches(&make_query(), &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();

        let mut requery = make_query();
        requery.threshold = 130.0;
        let report = session
            .run_matches(&requery, &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();

        assert_eq!(report.computed, vec!["a"]);
        assert_eq!(session.ledger().get("a").unwrap().threshold, 130.0);
    }

    #[test]
    fn test_voxel_only_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            dir.path().join("scores.csv"),
        )
        .unwrap();

        let query = make_query();
        let options = MatchOptions {
            voxel: true,
            nblast: false,
        };
        session
            .run_matches(&query, &["a".to_string()], options, &mut NoProgress)
            .unwrap();

        let record = session.ledger().get("a").unwrap();
        assert_eq!(record.voxel_score, 1.0);
        assert_eq!(record.nblast_score, crate::ledger::UNSET_SCORE);
    }

    #[test]
    fn test_match_centroid_uses_mirror() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut catalog = make_catalog();
        catalog.insert_candidate("mirrored", Point3::new(617.0, 10.0, 10.0), 5.0);
        let session = MatchSession::open(
            catalog,
            ConstantScorer(0.5),
            EngineConfig::default(),
            dir.path().join("scores.csv"),
        )
        .unwrap();

        let matches = session.match_centroid(Point3::new(10.0, 10.0, 10.0)).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"mirrored"));
    }

    #[test]
    fn test_review_status_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scores.csv");
        let mut session = MatchSession::open(
            make_catalog(),
            ConstantScorer(0.5),
            EngineConfig::default(),
            &path,
        )
        .unwrap();

        session.set_review_status("a", ReviewStatus::Unsure).unwrap();

        let ids = vec!["a".to_string()];
        let reloaded = Ledger::load(&path, &ids).unwrap();
        assert_eq!(reloaded.get("a").unwrap().status, ReviewStatus::Unsure);
    }
}
