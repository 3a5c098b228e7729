//! End-to-end engine tests: centroid shortlist, scoring runs, ledger
//! persistence across sessions, and the review workflow.

use hemimatch::{
    Catalog, Dotprops, EngineConfig, Ledger, MatchOptions, MatchSession, NearestTangentScorer,
    NoProgress, Point3, Query, ReviewStatus, VoxelVolume, UNSET_SCORE,
};
use tempfile::TempDir;

const DIMS: [usize; 3] = [8, 8, 8];

fn init_logging() {
    env_logger::try_init().ok();
}

/// A small L-shaped blob of set voxels starting at the given corner.
fn blob_volume(corner: [usize; 3], arm: usize) -> VoxelVolume {
    let mut v = VoxelVolume::new(DIMS);
    for i in 0..arm {
        v.set(corner[0] + i, corner[1], corner[2], true);
        v.set(corner[0], corner[1] + i, corner[2], true);
    }
    v
}

fn shape_from_volume(volume: &VoxelVolume, k: usize) -> Dotprops {
    Dotprops::from_points(volume.set_points(1.0), k).unwrap()
}

/// Catalog of three candidates:
/// - "overlap": same blob as the query, scores high on both metrics
/// - "shifted": nearby blob, partial overlap
/// - "distant": far corner, no overlap
fn make_catalog() -> hemimatch::MemoryCatalog {
    let mut catalog = hemimatch::MemoryCatalog::new();

    catalog.insert_candidate("overlap", Point3::new(1.0, 1.0, 1.0), 6.0);
    catalog.insert_candidate("shifted", Point3::new(3.0, 3.0, 1.0), 6.0);
    catalog.insert_candidate("distant", Point3::new(200.0, 200.0, 200.0), 6.0);

    let overlap = blob_volume([1, 1, 1], 4);
    let shifted = blob_volume([2, 2, 1], 4);
    let distant = blob_volume([4, 4, 4], 3);

    catalog.set_shape("overlap", shape_from_volume(&overlap, 4), false);
    catalog.set_shape("shifted", shape_from_volume(&shifted, 4), false);
    catalog.set_shape("distant", shape_from_volume(&distant, 4), false);

    catalog.set_volume("overlap", overlap);
    catalog.set_volume("shifted", shifted);
    catalog.set_volume("distant", distant);

    catalog
}

fn make_query(threshold: f32) -> Query {
    Query::new(Point3::new(1.0, 1.0, 1.0), threshold)
        .with_volume(blob_volume([1, 1, 1], 4))
        .with_source_path("/data/query.tif")
}

fn small_neighborhood_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    // Test volumes have only a handful of set voxels.
    config.dotprops.tangent_neighbors = 4;
    config.dotprops.fragment_link_distance = 2.0;
    config
}

fn open_session(
    catalog: hemimatch::MemoryCatalog,
    path: &std::path::Path,
) -> MatchSession<hemimatch::MemoryCatalog, NearestTangentScorer> {
    let config = small_neighborhood_config();
    let scorer = NearestTangentScorer::new(&config.scorer);
    MatchSession::open(catalog, scorer, config, path).unwrap()
}

#[test]
fn test_centroid_shortlist_excludes_distant_candidates() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let session = open_session(make_catalog(), &dir.path().join("scores.csv"));

    let matches = session.match_centroid(Point3::new(1.0, 1.0, 1.0)).unwrap();
    let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();

    assert_eq!(ids, vec!["overlap", "shifted"]);
    assert!(matches[0].distance < matches[1].distance);
}

#[test]
fn test_full_run_scores_ranked_by_similarity() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    let mut session = open_session(make_catalog(), &path);

    let ids: Vec<String> = session.catalog().candidate_ids();
    let report = session
        .run_matches(&make_query(120.0), &ids, MatchOptions::default(), &mut NoProgress)
        .unwrap();
    assert_eq!(report.computed.len(), 3);

    let overlap = session.ledger().get("overlap").unwrap();
    let shifted = session.ledger().get("shifted").unwrap();
    let distant = session.ledger().get("distant").unwrap();

    // Identical blob: full voxel containment, near-perfect shape score.
    assert!((overlap.voxel_score - 1.0).abs() < 1e-6);
    assert!(overlap.nblast_score > 0.9);

    // Partial overlap scores strictly between the two extremes.
    assert!(shifted.voxel_score > 0.0 && shifted.voxel_score < 1.0);
    assert!(shifted.nblast_score < overlap.nblast_score);

    assert_eq!(distant.voxel_score, 0.0);
    assert!(distant.nblast_score < shifted.nblast_score);

    // All records carry the run's metadata.
    for record in [overlap, shifted, distant] {
        assert_eq!(record.threshold, 120.0);
        assert_eq!(record.query_centroid, "(1, 1, 1)");
        assert!(!record.time_stamp.is_empty());
        assert_eq!(record.status, ReviewStatus::NotReviewed);
    }
}

#[test]
fn test_scores_survive_session_restart() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");

    let ids: Vec<String>;
    {
        let mut session = open_session(make_catalog(), &path);
        ids = session.catalog().candidate_ids();
        session
            .run_matches(&make_query(120.0), &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();
        session
            .set_review_status("overlap", ReviewStatus::Accept)
            .unwrap();
    }

    // A new session over the same file sees the stored scores and verdict,
    // and considers them current at the same threshold.
    let mut session = open_session(make_catalog(), &path);
    assert_eq!(
        session.ledger().get("overlap").unwrap().status,
        ReviewStatus::Accept
    );

    let report = session
        .run_matches(&make_query(120.0), &ids, MatchOptions::default(), &mut NoProgress)
        .unwrap();
    assert!(report.computed.is_empty());
    assert_eq!(report.current.len(), 3);
}

#[test]
fn test_threshold_change_invalidates_stored_scores() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    let mut session = open_session(make_catalog(), &path);

    let ids = vec!["overlap".to_string()];
    session
        .run_matches(&make_query(120.0), &ids, MatchOptions::default(), &mut NoProgress)
        .unwrap();
    session
        .set_review_status("overlap", ReviewStatus::Accept)
        .unwrap();

    let report = session
        .run_matches(&make_query(130.0), &ids, MatchOptions::default(), &mut NoProgress)
        .unwrap();
    assert_eq!(report.computed, vec!["overlap"]);

    let record = session.ledger().get("overlap").unwrap();
    assert_eq!(record.threshold, 130.0);
    // Rescoring refreshes scores and metadata but keeps the verdict.
    assert_eq!(record.status, ReviewStatus::Accept);
}

#[test]
fn test_voxel_only_leaves_shape_sentinel() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut session = open_session(make_catalog(), &dir.path().join("scores.csv"));

    let options = MatchOptions {
        voxel: true,
        nblast: false,
    };
    session
        .run_matches(
            &make_query(120.0),
            &["overlap".to_string()],
            options,
            &mut NoProgress,
        )
        .unwrap();

    let record = session.ledger().get("overlap").unwrap();
    assert!(record.voxel_score >= 0.0);
    assert_eq!(record.nblast_score, UNSET_SCORE);
}

#[test]
fn test_catalog_growth_merges_into_existing_ledger() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");

    {
        let mut session = open_session(make_catalog(), &path);
        session
            .run_matches(
                &make_query(120.0),
                &["overlap".to_string()],
                MatchOptions::default(),
                &mut NoProgress,
            )
            .unwrap();
    }

    // Reopen with an extra candidate in the catalog.
    let mut catalog = make_catalog();
    catalog.insert_candidate("newcomer", Point3::new(5.0, 5.0, 5.0), 6.0);
    let session = open_session(catalog, &path);

    assert_eq!(session.ledger().len(), 4);
    assert!(session.ledger().get("overlap").unwrap().has_scores());
    assert!(!session.ledger().get("newcomer").unwrap().has_scores());
}

#[test]
fn test_corrupt_ledger_falls_back_to_fresh() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    std::fs::write(&path, "not,a,ledger\n1,2,3\n").unwrap();

    let session = open_session(make_catalog(), &path);
    assert_eq!(session.ledger().len(), 3);
    assert!(session.ledger().iter().all(|(_, r)| !r.has_scores()));
}

#[test]
fn test_ledger_file_is_loadable_standalone() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    let ids: Vec<String>;

    {
        let mut session = open_session(make_catalog(), &path);
        ids = session.catalog().candidate_ids();
        session
            .run_matches(&make_query(115.0), &ids, MatchOptions::default(), &mut NoProgress)
            .unwrap();
    }

    let ledger = Ledger::load(&path, &ids).unwrap();
    assert_eq!(ledger.len(), 3);
    assert!(!ledger.is_stale("overlap", 115.0));
    assert!(ledger.is_stale("overlap", 120.0));
}

#[test]
fn test_progress_reports_cover_both_scorers() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut session = open_session(make_catalog(), &dir.path().join("scores.csv"));

    let ids: Vec<String> = session.catalog().candidate_ids();
    let mut steps = Vec::new();
    {
        let mut observer = |done: usize, total: usize| steps.push((done, total));
        session
            .run_matches(&make_query(120.0), &ids, MatchOptions::default(), &mut observer)
            .unwrap();
    }

    // Each scorer walks all three candidates.
    assert_eq!(steps, vec![(1, 3), (2, 3), (3, 3), (1, 3), (2, 3), (3, 3)]);
}
