//! # hemimatch
//!
//! Matching engine for identifying hemilineages in light-microscopy volumes
//! registered to a standard anatomical template.
//!
//! A query structure (a binarized volume plus its cell body centroid) is
//! matched against a catalog of candidate hemilineages in three stages:
//!
//! ```text
//! query centroid ──► centroid matching ──► candidate shortlist
//!                    (midline-mirrored)          │
//!                                                ▼
//! query volume ────► voxel overlap ──────► voxel_score ──┐
//!              └───► dotprops pipeline ──► nblast_score ─┤
//!                    (prune, resample,                   ▼
//!                     tangent kernel)              score ledger (CSV)
//!                                                        │
//!                                                        ▼
//!                                                 review verdicts
//! ```
//!
//! Scores are persisted per candidate in a CSV ledger together with the
//! binarization threshold they were computed at; rescoring only happens for
//! candidates whose stored scores are missing or were computed at a
//! different threshold.
//!
//! ## Modules
//!
//! - [`core`]: points, voxel volumes, dotprops clouds
//! - [`catalog`]: candidate centroid table, volumes and shapes
//! - [`matching`]: the three scoring algorithms
//! - [`ledger`]: the persistent CSV score ledger
//! - [`session`]: the end-to-end workflow
//! - [`config`]: tunable parameters with YAML loading
//!
//! ## Example
//!
//! ```rust,ignore
//! use hemimatch::{
//!     EngineConfig, MatchOptions, MatchSession, NearestTangentScorer, NoProgress, Point3, Query,
//! };
//!
//! let config = EngineConfig::default();
//! let scorer = NearestTangentScorer::new(&config.scorer);
//! let mut session = MatchSession::open(catalog, scorer, config, "scores.csv")?;
//!
//! let shortlist = session.match_centroid(Point3::new(312.0, 180.0, 95.0))?;
//! let ids: Vec<String> = shortlist.into_iter().map(|m| m.id).collect();
//!
//! let query = Query::new(Point3::new(312.0, 180.0, 95.0), 120.0)
//!     .with_volume(volume)
//!     .with_source_path("query.tif");
//! session.run_matches(&query, &ids, MatchOptions::default(), &mut NoProgress)?;
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod progress;
pub mod session;

pub use catalog::{CandidateCentroid, Catalog, CentroidTable, MemoryCatalog};
pub use config::{DotpropsConfig, EngineConfig, ScorerConfig, TemplateConfig};
pub use crate::core::{Dotprops, Point3, VoxelVolume};
pub use error::{MatchError, Result};
pub use ledger::{Ledger, ReviewStatus, ScoreRecord, UNSET_SCORE};
pub use matching::{CentroidMatch, NearestTangentScorer, ShapeScorer};
pub use progress::{NoProgress, Progress};
pub use session::{MatchOptions, MatchReport, MatchSession, Query};
